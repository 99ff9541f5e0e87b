use std::sync::Arc;

use super::{BringUpReport, StreamModuleContext, GROUP_NAME, QUEUE_GROUP_NAME};
use crate::discovery::ProviderDiscovery;
use crate::messaging::Transport;
use crate::metrics::Metrics;
use crate::worker::{
    ClusterWorkerContext, ClusterWorkerRegistry, DefineError, ProviderNotFoundError, TargetKind, WorkerRef,
};

// ============================================================================
// Stream Module Installer
// ============================================================================
//
// Bring-up order:
// 1. check the queue module (transport) is ready
// 2. build the cluster context and an empty registry
// 3. local pass: assign context, create worker, register role
// 4. remote pass: assign context, register provider
// 5. freeze the registry and publish it into the context
//
// Providers missing from the catalog are logged and skipped. Anything else
// aborts bring-up: workers already created are killed and no registry is
// published.
//
// ============================================================================

pub struct StreamModuleInstaller {
    node_id: String,
    transport: Arc<dyn Transport>,
    metrics: Arc<Metrics>,
}

impl StreamModuleInstaller {
    pub fn new(node_id: impl Into<String>, transport: Arc<dyn Transport>, metrics: Arc<Metrics>) -> Self {
        Self {
            node_id: node_id.into(),
            transport,
            metrics,
        }
    }

    pub fn group_name(&self) -> &'static str {
        GROUP_NAME
    }

    pub fn dependence_modules(&self) -> &'static [&'static str] {
        &[QUEUE_GROUP_NAME]
    }

    pub fn install(&self, discovery: &dyn ProviderDiscovery) -> Result<StreamModuleContext, DefineError> {
        let span = tracing::info_span!("bring_up", module = GROUP_NAME, node = %self.node_id);
        let _enter = span.enter();

        tracing::info!("🚀 Installing stream module");

        if !self.transport.is_ready() {
            return Err(DefineError::DependencyNotReady {
                module: QUEUE_GROUP_NAME,
                transport: self.transport.name().to_string(),
            });
        }

        let context = ClusterWorkerContext::new(self.node_id.clone(), self.transport.clone(), self.metrics.clone());
        let mut registry = ClusterWorkerRegistry::new(self.metrics.clone());
        let mut report = BringUpReport::default();

        if let Err(e) = self.define(discovery, &context, &mut registry, &mut report) {
            tracing::error!(error = %e, "❌ Stream module bring-up failed");
            for worker in registry.local_workers() {
                worker.kill();
            }
            return Err(e);
        }

        let registry = Arc::new(registry);
        context.publish(registry.clone());

        self.metrics.set_registry_roles(
            registry.count(TargetKind::Local),
            registry.count(TargetKind::Remote),
        );

        tracing::info!(
            local = report.local_roles.len(),
            remote = report.remote_roles.len(),
            missing = report.missing.len(),
            "✅ Stream module installed"
        );

        Ok(StreamModuleContext::new(context, registry, report))
    }

    fn define(
        &self,
        discovery: &dyn ProviderDiscovery,
        context: &ClusterWorkerContext,
        registry: &mut ClusterWorkerRegistry,
        report: &mut BringUpReport,
    ) -> Result<(), DefineError> {
        let local_pass = tracing::info_span!("local_pass").entered();
        let local = discovery.load_local_providers()?;
        self.note_missing(local.missing, report);

        for mut provider in local.providers {
            provider.set_cluster_context(context.clone());

            let worker = provider.create().map_err(|source| DefineError::WorkerCreation {
                role: provider.role().clone(),
                source,
            })?;

            register_local(registry, worker)?;
            report.local_roles.push(provider.role().clone());
        }

        drop(local_pass);

        let _remote_pass = tracing::info_span!("remote_pass").entered();
        let remote = discovery.load_remote_providers()?;
        self.note_missing(remote.missing, report);

        for mut provider in remote.providers {
            provider.set_cluster_context(context.clone());
            let role = provider.role().clone();

            registry.put_provider(provider)?;
            report.remote_roles.push(role);
        }

        Ok(())
    }

    /// Reported as soon as a pass discovers them, even if a later step aborts
    fn note_missing(&self, missing: Vec<ProviderNotFoundError>, report: &mut BringUpReport) {
        for gap in &missing {
            tracing::warn!(
                role = %gap.role,
                implementation = %gap.implementation,
                kind = %gap.kind,
                "⚠️ No provider found, role will not be served"
            );
            self.metrics.record_missing_provider();
        }
        report.missing.extend(missing);
    }
}

/// A worker that could not be registered is not reachable through the
/// registry, so it is killed here rather than by the caller.
fn register_local(registry: &mut ClusterWorkerRegistry, worker: WorkerRef) -> Result<(), DefineError> {
    let role = worker.role().clone();
    registry.put_role(role, worker.clone()).map_err(|e| {
        worker.kill();
        DefineError::from(e)
    })
}
