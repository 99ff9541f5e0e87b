use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ServiceMetric, SERVICE_METRIC_PERSISTENCE};
use crate::worker::{ClusterWorkerContext, Role, WorkEnvelope, WorkerCreationError, WorkerHandler, WorkerSettings};

// ============================================================================
// Segment Aggregate Worker
// ============================================================================
//
// Folds span segments into per-service counters. Every `batch_size`
// segments (and on flush) the counters are emitted as ServiceMetric records
// to the persistence role, wherever that role lives.
//
// ============================================================================

/// One span segment as reported by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSegment {
    pub service: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub is_error: bool,
}

pub struct SegmentAggregateWorker {
    batch_size: usize,
    pending: usize,
    by_service: BTreeMap<String, ServiceMetric>,
}

impl SegmentAggregateWorker {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            pending: 0,
            by_service: BTreeMap::new(),
        }
    }

    pub fn build(_role: &Role, settings: &WorkerSettings) -> Result<Box<dyn WorkerHandler>, WorkerCreationError> {
        Ok(Box::new(Self::new(settings.batch_size)))
    }

    fn accumulate(&mut self, segment: SpanSegment) {
        let metric = self
            .by_service
            .entry(segment.service.clone())
            .or_insert_with(|| ServiceMetric::empty(segment.service));

        metric.calls += 1;
        if segment.is_error {
            metric.errors += 1;
        }
        metric.total_duration_ms += segment.duration_ms;
        metric.max_duration_ms = metric.max_duration_ms.max(segment.duration_ms);

        self.pending += 1;
    }

    async fn emit(&mut self, context: &ClusterWorkerContext) -> anyhow::Result<()> {
        if self.by_service.is_empty() {
            return Ok(());
        }

        let target = Role::new(SERVICE_METRIC_PERSISTENCE);
        let metrics = std::mem::take(&mut self.by_service);
        self.pending = 0;

        tracing::debug!(services = metrics.len(), "Emitting service metrics");

        for metric in metrics.into_values() {
            let payload = serde_json::to_value(&metric)?;
            context
                .dispatch(&target, payload)
                .await
                .with_context(|| format!("Failed to emit metric for service '{}'", metric.service))?;
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerHandler for SegmentAggregateWorker {
    async fn on_work(&mut self, envelope: WorkEnvelope, context: &ClusterWorkerContext) -> anyhow::Result<()> {
        let segment: SpanSegment = envelope.decode().context("Malformed span segment")?;
        self.accumulate(segment);

        if self.pending >= self.batch_size {
            self.emit(context).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, context: &ClusterWorkerContext) -> anyhow::Result<()> {
        self.emit(context).await
    }
}
