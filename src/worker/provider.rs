use std::sync::Arc;
use std::time::Duration;

use super::{
    ClusterWorkerContext, ForwardError, LocalWorker, Role, TargetKind, WorkEnvelope, WorkerCreationError,
    WorkerFactory, WorkerRef,
};
use crate::messaging::Destination;

// ============================================================================
// Worker Providers
// ============================================================================
//
// One provider per role, in one of two shapes:
// - Local: owns a factory and, after create(), the live worker it built
// - Remote: never builds anything; it IS the dispatch target and forwards
//   each message through the transport when dispatched
//
// Both need the cluster context assigned before they are used.
//
// ============================================================================

pub const MAX_QUEUE_SIZE: usize = 1 << 20;

/// Queueing and batching knobs of a local worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub queue_size: usize,
    pub batch_size: usize,
    pub flush_interval: Option<Duration>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            batch_size: 1,
            flush_interval: None,
        }
    }
}

impl WorkerSettings {
    pub fn validate(&self, role: &Role) -> Result<(), WorkerCreationError> {
        let invalid = |setting: &'static str, reason: String| WorkerCreationError::InvalidSetting {
            role: role.clone(),
            setting,
            reason,
        };

        if self.queue_size == 0 || self.queue_size > MAX_QUEUE_SIZE {
            return Err(invalid(
                "queue_size",
                format!("must be between 1 and {}, got {}", MAX_QUEUE_SIZE, self.queue_size),
            ));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1".to_string()));
        }
        if self.flush_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(invalid("flush_interval_ms", "must be greater than 0".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Local Provider
// ============================================================================

pub struct LocalWorkerProvider {
    role: Role,
    settings: WorkerSettings,
    factory: Arc<dyn WorkerFactory>,
    context: Option<ClusterWorkerContext>,
    worker: Option<WorkerRef>,
}

impl LocalWorkerProvider {
    pub fn new(role: Role, settings: WorkerSettings, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            role,
            settings,
            factory,
            context: None,
            worker: None,
        }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn set_cluster_context(&mut self, context: ClusterWorkerContext) {
        self.context = Some(context);
    }

    /// Build and start the worker. Succeeds at most once per provider.
    pub fn create(&mut self) -> Result<WorkerRef, WorkerCreationError> {
        if self.worker.is_some() {
            return Err(WorkerCreationError::AlreadyCreated {
                role: self.role.clone(),
            });
        }

        let context = self
            .context
            .clone()
            .ok_or_else(|| WorkerCreationError::ContextNotAssigned {
                role: self.role.clone(),
            })?;

        self.settings.validate(&self.role)?;
        let handler = self.factory.build(&self.role, &self.settings)?;

        let worker = LocalWorker::new(self.role.clone(), handler, context)
            .with_flush_interval(self.settings.flush_interval)
            .start(self.settings.queue_size);

        tracing::debug!(
            role = %self.role,
            queue_size = self.settings.queue_size,
            batch_size = self.settings.batch_size,
            "Created local worker"
        );

        self.worker = Some(worker.clone());
        Ok(worker)
    }

    pub fn worker(&self) -> Option<&WorkerRef> {
        self.worker.as_ref()
    }
}

// ============================================================================
// Remote Provider
// ============================================================================

#[derive(Clone)]
pub struct RemoteWorkerProvider {
    role: Role,
    node: Option<String>,
    context: Option<ClusterWorkerContext>,
}

impl RemoteWorkerProvider {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            node: None,
            context: None,
        }
    }

    /// Pin forwarding to the peer node owning this role
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn destination(&self) -> Destination {
        Destination::new(self.role.clone(), self.node.clone())
    }

    pub fn set_cluster_context(&mut self, context: ClusterWorkerContext) {
        self.context = Some(context);
    }

    /// Hand the envelope to the transport. Returns once it is queued, not
    /// once the peer processed it.
    pub async fn forward(&self, envelope: WorkEnvelope) -> Result<(), ForwardError> {
        let context = self.context.as_ref().ok_or_else(|| ForwardError::ContextNotAssigned {
            role: self.role.clone(),
        })?;

        let destination = self.destination();
        let envelope = envelope.with_origin(context.node_id());

        context
            .transport()
            .enqueue(&destination, envelope)
            .await
            .map_err(|source| {
                tracing::warn!(
                    role = %self.role,
                    destination = %destination,
                    error = %source,
                    "Forward rejected by transport"
                );
                ForwardError::Rejected {
                    role: self.role.clone(),
                    source,
                }
            })
    }
}

impl std::fmt::Debug for RemoteWorkerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWorkerProvider")
            .field("role", &self.role)
            .field("node", &self.node)
            .field("context_assigned", &self.context.is_some())
            .finish()
    }
}

// ============================================================================
// Provider Sum Type
// ============================================================================

pub enum WorkerProvider {
    Local(LocalWorkerProvider),
    Remote(RemoteWorkerProvider),
}

impl WorkerProvider {
    pub fn role(&self) -> &Role {
        match self {
            WorkerProvider::Local(provider) => provider.role(),
            WorkerProvider::Remote(provider) => provider.role(),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            WorkerProvider::Local(_) => TargetKind::Local,
            WorkerProvider::Remote(_) => TargetKind::Remote,
        }
    }

    pub fn set_cluster_context(&mut self, context: ClusterWorkerContext) {
        match self {
            WorkerProvider::Local(provider) => provider.set_cluster_context(context),
            WorkerProvider::Remote(provider) => provider.set_cluster_context(context),
        }
    }
}

impl From<LocalWorkerProvider> for WorkerProvider {
    fn from(provider: LocalWorkerProvider) -> Self {
        WorkerProvider::Local(provider)
    }
}

impl From<RemoteWorkerProvider> for WorkerProvider {
    fn from(provider: RemoteWorkerProvider) -> Self {
        WorkerProvider::Remote(provider)
    }
}
