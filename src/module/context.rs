use futures_util::future::join_all;
use std::sync::Arc;

use crate::health::{ComponentHealth, HealthCheckable, HealthStatus};
use crate::worker::{ClusterWorkerContext, ClusterWorkerRegistry, DispatchError, ProviderNotFoundError, Role};

/// What bring-up produced: the roles now served and the gaps it tolerated
#[derive(Debug, Clone, Default)]
pub struct BringUpReport {
    pub local_roles: Vec<Role>,
    pub remote_roles: Vec<Role>,
    pub missing: Vec<ProviderNotFoundError>,
}

impl BringUpReport {
    pub fn is_degraded(&self) -> bool {
        !self.missing.is_empty()
    }

    pub fn missing_roles(&self) -> impl Iterator<Item = &Role> {
        self.missing.iter().map(|e| &e.role)
    }
}

/// Running stream module, returned by a successful install
pub struct StreamModuleContext {
    cluster: ClusterWorkerContext,
    registry: Arc<ClusterWorkerRegistry>,
    report: BringUpReport,
}

impl StreamModuleContext {
    pub(crate) fn new(cluster: ClusterWorkerContext, registry: Arc<ClusterWorkerRegistry>, report: BringUpReport) -> Self {
        Self {
            cluster,
            registry,
            report,
        }
    }

    pub fn registry(&self) -> &Arc<ClusterWorkerRegistry> {
        &self.registry
    }

    pub fn cluster_context(&self) -> &ClusterWorkerContext {
        &self.cluster
    }

    pub fn report(&self) -> &BringUpReport {
        &self.report
    }

    pub async fn dispatch(&self, role: &Role, payload: serde_json::Value) -> Result<(), DispatchError> {
        self.registry.dispatch(role, payload).await
    }

    /// Flush and stop every local worker. Remote roles hold nothing to stop.
    pub async fn shutdown(&self) {
        tracing::info!("🛑 Shutting down stream module");

        // Flush everything before any stop is queued: output a flush sends to
        // another role then sits ahead of that role's stop signal. Each stop
        // drains the mailbox and flushes once more.
        let flushes = self.registry.local_workers().map(|worker| async move {
            if let Err(e) = worker.flush().await {
                tracing::warn!(role = %worker.role(), error = %e, "Flush before shutdown failed");
            }
        });
        join_all(flushes).await;

        let stops = self.registry.local_workers().map(|worker| async move {
            worker.stop().await;
            tracing::debug!(role = %worker.role(), "Worker stopped");
        });
        join_all(stops).await;

        tracing::info!("✅ Stream module stopped");
    }
}

impl HealthCheckable for StreamModuleContext {
    fn check_health(&self) -> ComponentHealth {
        let stopped: Vec<String> = self
            .registry
            .local_workers()
            .filter(|worker| !worker.is_alive())
            .map(|worker| worker.role().to_string())
            .collect();

        let details = format!(
            "{} local, {} remote roles",
            self.report.local_roles.len(),
            self.report.remote_roles.len()
        );

        let status = if !stopped.is_empty() {
            HealthStatus::Unhealthy(format!("workers stopped: {}", stopped.join(", ")))
        } else if self.report.is_degraded() {
            let missing: Vec<String> = self.report.missing_roles().map(Role::to_string).collect();
            HealthStatus::Degraded(format!("no provider for roles: {}", missing.join(", ")))
        } else {
            HealthStatus::Healthy
        };

        ComponentHealth::new(self.component_name(), status).with_details(details)
    }

    fn component_name(&self) -> &str {
        super::GROUP_NAME
    }
}
