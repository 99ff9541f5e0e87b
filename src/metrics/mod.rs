// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

// Re-export for public API
pub use server::{start_metrics_server, SharedHealth};

// ============================================================================
// Metrics Module - Prometheus metrics for the stream module
// ============================================================================
//
// Covers:
// - Dispatch throughput per role and target kind (local / remote)
// - Dispatch failures by reason (role_not_found, queue_full, ...)
// - Worker handler outcomes and latency
// - Registry shape after bring-up, and degraded bring-ups
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Role label for dispatches to roles nobody registered, keeps label sets bounded
pub const UNKNOWN_ROLE_LABEL: &str = "<unknown>";

pub struct Metrics {
    registry: Registry,

    // Dispatch Metrics
    pub dispatch_total: IntCounterVec,
    pub dispatch_failed: IntCounterVec,

    // Worker Metrics
    pub worker_messages: IntCounterVec,
    pub worker_processing_duration: HistogramVec,

    // Registry Metrics
    pub registry_roles: IntGaugeVec,
    pub missing_providers: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let dispatch_total = IntCounterVec::new(
            Opts::new("stream_dispatch_total", "Messages accepted for dispatch"),
            &["role", "target"],
        )?;
        registry.register(Box::new(dispatch_total.clone()))?;

        let dispatch_failed = IntCounterVec::new(
            Opts::new("stream_dispatch_failed_total", "Dispatch attempts rejected"),
            &["role", "reason"],
        )?;
        registry.register(Box::new(dispatch_failed.clone()))?;

        let worker_messages = IntCounterVec::new(
            Opts::new("stream_worker_messages_total", "Messages handled by local workers"),
            &["role", "outcome"],
        )?;
        registry.register(Box::new(worker_messages.clone()))?;

        let worker_processing_duration = HistogramVec::new(
            HistogramOpts::new("stream_worker_processing_seconds", "Local worker handler duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["role"],
        )?;
        registry.register(Box::new(worker_processing_duration.clone()))?;

        let registry_roles = IntGaugeVec::new(
            Opts::new("stream_registry_roles", "Roles registered after bring-up"),
            &["kind"],
        )?;
        registry.register(Box::new(registry_roles.clone()))?;

        let missing_providers = IntCounter::new(
            "stream_bring_up_missing_providers_total",
            "Provider definitions skipped because no implementation matched",
        )?;
        registry.register(Box::new(missing_providers.clone()))?;

        Ok(Self {
            registry,
            dispatch_total,
            dispatch_failed,
            worker_messages,
            worker_processing_duration,
            registry_roles,
            missing_providers,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_dispatch(&self, role: &str, target: &str) {
        self.dispatch_total.with_label_values(&[role, target]).inc();
    }

    pub fn record_dispatch_failure(&self, role: &str, reason: &str) {
        self.dispatch_failed.with_label_values(&[role, reason]).inc();
    }

    /// Helper to record one worker handler invocation
    pub fn record_worker_message(&self, role: &str, duration_secs: f64, success: bool) {
        let outcome = if success { "processed" } else { "failed" };
        self.worker_messages.with_label_values(&[role, outcome]).inc();
        self.worker_processing_duration.with_label_values(&[role]).observe(duration_secs);
    }

    pub fn set_registry_roles(&self, local: usize, remote: usize) {
        self.registry_roles.with_label_values(&["local"]).set(local as i64);
        self.registry_roles.with_label_values(&["remote"]).set(remote as i64);
    }

    pub fn record_missing_provider(&self) {
        self.missing_providers.inc();
    }
}
