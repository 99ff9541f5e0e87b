// ============================================================================
// Built-in Workers
// ============================================================================
//
// segment-aggregate           span segments -> per-service counters
// service-metric-persistence  buffers and writes ServiceMetric batches
//
// The aggregate feeds the persistence role through the cluster context, so
// the two can run on the same node or on different ones.
//
// ============================================================================

mod metric_persistence;
mod segment_aggregate;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::discovery::ProviderCatalog;

pub use metric_persistence::{MetricPersistenceWorker, MAX_PERSISTENCE_BATCH};
pub use segment_aggregate::{SegmentAggregateWorker, SpanSegment};

pub const SEGMENT_AGGREGATE: &str = "segment-aggregate";
pub const SERVICE_METRIC_PERSISTENCE: &str = "service-metric-persistence";

/// Aggregated call statistics of one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetric {
    pub service: String,
    pub calls: u64,
    pub errors: u64,
    pub total_duration_ms: u64,
    pub max_duration_ms: u64,
}

impl ServiceMetric {
    pub fn empty(service: String) -> Self {
        Self {
            service,
            calls: 0,
            errors: 0,
            total_duration_ms: 0,
            max_duration_ms: 0,
        }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.total_duration_ms as f64 / self.calls as f64
    }
}

pub fn register_builtin(catalog: &mut ProviderCatalog) {
    catalog.register_local(SEGMENT_AGGREGATE, Arc::new(SegmentAggregateWorker::build));
    catalog.register_local(SERVICE_METRIC_PERSISTENCE, Arc::new(MetricPersistenceWorker::build));

    catalog.register_remote(SEGMENT_AGGREGATE);
    catalog.register_remote(SERVICE_METRIC_PERSISTENCE);
}
