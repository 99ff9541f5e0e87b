use anyhow::Context as _;
use async_trait::async_trait;

use super::ServiceMetric;
use crate::worker::{ClusterWorkerContext, Role, WorkEnvelope, WorkerCreationError, WorkerHandler, WorkerSettings};

pub const MAX_PERSISTENCE_BATCH: usize = 10_000;

/// Buffers service metrics and writes them out a batch at a time
pub struct MetricPersistenceWorker {
    batch_size: usize,
    buffer: Vec<ServiceMetric>,
    persisted: u64,
}

impl MetricPersistenceWorker {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            persisted: 0,
        }
    }

    pub fn build(role: &Role, settings: &WorkerSettings) -> Result<Box<dyn WorkerHandler>, WorkerCreationError> {
        if settings.batch_size > MAX_PERSISTENCE_BATCH {
            return Err(WorkerCreationError::InvalidSetting {
                role: role.clone(),
                setting: "batch_size",
                reason: format!("must not exceed {}, got {}", MAX_PERSISTENCE_BATCH, settings.batch_size),
            });
        }
        Ok(Box::new(Self::new(settings.batch_size)))
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn persisted(&self) -> u64 {
        self.persisted
    }

    fn write_batch(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.buffer);
        let calls: u64 = batch.iter().map(|m| m.calls).sum();
        let errors: u64 = batch.iter().map(|m| m.errors).sum();

        tracing::info!(records = batch.len(), calls, errors, "💾 Persisted service metric batch");
        for metric in &batch {
            tracing::debug!(
                service = %metric.service,
                calls = metric.calls,
                errors = metric.errors,
                avg_ms = metric.avg_duration_ms(),
                "Service metric"
            );
        }

        self.persisted += batch.len() as u64;
    }
}

#[async_trait]
impl WorkerHandler for MetricPersistenceWorker {
    async fn on_work(&mut self, envelope: WorkEnvelope, _context: &ClusterWorkerContext) -> anyhow::Result<()> {
        let metric: ServiceMetric = envelope.decode().context("Malformed service metric")?;
        self.buffer.push(metric);

        if self.buffer.len() >= self.batch_size {
            self.write_batch();
        }
        Ok(())
    }

    async fn flush(&mut self, _context: &ClusterWorkerContext) -> anyhow::Result<()> {
        self.write_batch();
        Ok(())
    }
}
