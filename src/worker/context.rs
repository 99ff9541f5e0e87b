use std::fmt;
use std::sync::{Arc, OnceLock};

use super::{ClusterWorkerRegistry, DispatchError, Role, WorkEnvelope};
use crate::messaging::Transport;
use crate::metrics::Metrics;

// ============================================================================
// Cluster Worker Context
// ============================================================================
//
// Built once by the installer and handed to every provider. Gives workers
// what they need at runtime:
// - the transport, for remote providers
// - the registry, for workers that feed other roles
//
// The registry is published into the context only after bring-up succeeded,
// so a worker can never observe a half-populated registry.
//
// ============================================================================

#[derive(Clone)]
pub struct ClusterWorkerContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    node_id: String,
    transport: Arc<dyn Transport>,
    metrics: Arc<Metrics>,
    registry: OnceLock<Arc<ClusterWorkerRegistry>>,
}

impl ClusterWorkerContext {
    pub fn new(node_id: impl Into<String>, transport: Arc<dyn Transport>, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                node_id: node_id.into(),
                transport,
                metrics,
                registry: OnceLock::new(),
            }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.inner.node_id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Make the registry reachable from workers. Only the first call wins.
    pub(crate) fn publish(&self, registry: Arc<ClusterWorkerRegistry>) -> bool {
        self.inner.registry.set(registry).is_ok()
    }

    pub fn registry(&self) -> Option<&Arc<ClusterWorkerRegistry>> {
        self.inner.registry.get()
    }

    /// Dispatch to another role from inside a worker
    pub async fn dispatch(&self, role: &Role, payload: serde_json::Value) -> Result<(), DispatchError> {
        let registry = self.registry().ok_or(DispatchError::NotReady)?;
        registry.dispatch(role, payload).await
    }

    pub async fn dispatch_envelope(&self, envelope: WorkEnvelope) -> Result<(), DispatchError> {
        let registry = self.registry().ok_or(DispatchError::NotReady)?;
        registry.dispatch_envelope(envelope).await
    }
}

impl fmt::Debug for ClusterWorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterWorkerContext")
            .field("node_id", &self.inner.node_id)
            .field("transport", &self.inner.transport.name())
            .field("published", &self.inner.registry.get().is_some())
            .finish()
    }
}
