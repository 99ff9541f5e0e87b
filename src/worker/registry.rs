use std::collections::HashMap;
use std::sync::Arc;

use super::{
    DispatchError, DuplicateRoleError, RemoteWorkerProvider, Role, RoleNotFoundError, TargetKind, WorkEnvelope,
    WorkerRef,
};
use crate::metrics::{Metrics, UNKNOWN_ROLE_LABEL};

// ============================================================================
// Cluster Worker Registry
// ============================================================================
//
// Role -> dispatch target. Written only during bring-up (&mut self), then
// frozen behind an Arc and shared read-only, so dispatch takes no lock of
// its own; the only synchronisation is inside each worker's mailbox.
//
// ============================================================================

/// What a role resolves to
#[derive(Debug, Clone)]
pub enum DispatchTarget {
    Local(WorkerRef),
    Remote(RemoteWorkerProvider),
}

impl DispatchTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            DispatchTarget::Local(_) => TargetKind::Local,
            DispatchTarget::Remote(_) => TargetKind::Remote,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, DispatchTarget::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, DispatchTarget::Remote(_))
    }
}

pub struct ClusterWorkerRegistry {
    targets: HashMap<Role, DispatchTarget>,
    metrics: Arc<Metrics>,
}

impl ClusterWorkerRegistry {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            targets: HashMap::new(),
            metrics,
        }
    }

    /// Register the live worker of a local role
    pub fn put_role(&mut self, role: Role, worker: WorkerRef) -> Result<(), DuplicateRoleError> {
        self.insert(role, DispatchTarget::Local(worker))
    }

    /// Register a remote provider as the dispatch target of its role
    pub fn put_provider(&mut self, provider: RemoteWorkerProvider) -> Result<(), DuplicateRoleError> {
        self.insert(provider.role().clone(), DispatchTarget::Remote(provider))
    }

    fn insert(&mut self, role: Role, target: DispatchTarget) -> Result<(), DuplicateRoleError> {
        if let Some(existing) = self.targets.get(&role) {
            return Err(DuplicateRoleError {
                role,
                existing: existing.kind(),
            });
        }

        tracing::debug!(role = %role, target = %target.kind(), "Registered role");
        self.targets.insert(role, target);
        Ok(())
    }

    pub fn resolve(&self, role: &Role) -> Result<&DispatchTarget, RoleNotFoundError> {
        self.targets
            .get(role)
            .ok_or_else(|| RoleNotFoundError { role: role.clone() })
    }

    /// Route a payload to whatever serves `role`. Returns once the message is
    /// queued locally or handed to the transport.
    pub async fn dispatch(&self, role: &Role, payload: serde_json::Value) -> Result<(), DispatchError> {
        self.dispatch_envelope(WorkEnvelope::new(role.clone(), payload)).await
    }

    pub async fn dispatch_envelope(&self, envelope: WorkEnvelope) -> Result<(), DispatchError> {
        let role = envelope.role.clone();

        let result = match self.resolve(&role) {
            Ok(DispatchTarget::Local(worker)) => worker.enqueue(envelope).map(|_| TargetKind::Local),
            Ok(DispatchTarget::Remote(provider)) => provider
                .forward(envelope)
                .await
                .map(|_| TargetKind::Remote)
                .map_err(DispatchError::from),
            Err(e) => Err(DispatchError::from(e)),
        };

        match result {
            Ok(kind) => {
                self.metrics.record_dispatch(role.name(), kind.as_str());
                Ok(())
            }
            Err(e) => {
                tracing::debug!(role = %role, reason = e.reason(), "Dispatch rejected");
                let label = match &e {
                    DispatchError::RoleNotFound(_) => UNKNOWN_ROLE_LABEL,
                    _ => role.name(),
                };
                self.metrics.record_dispatch_failure(label, e.reason());
                Err(e)
            }
        }
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.targets.contains_key(role)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.targets.keys()
    }

    pub fn local_workers(&self) -> impl Iterator<Item = &WorkerRef> {
        self.targets.values().filter_map(|target| match target {
            DispatchTarget::Local(worker) => Some(worker),
            DispatchTarget::Remote(_) => None,
        })
    }

    pub fn count(&self, kind: TargetKind) -> usize {
        self.targets.values().filter(|target| target.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::InMemoryTransport;
    use crate::worker::testing::{RecordingHandler, Recorded};
    use crate::worker::{ClusterWorkerContext, ForwardError, LocalWorker};

    struct Fixture {
        context: ClusterWorkerContext,
        transport: Arc<InMemoryTransport>,
        registry: ClusterWorkerRegistry,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(InMemoryTransport::new(16));
        let metrics = Arc::new(Metrics::new().unwrap());
        Fixture {
            context: ClusterWorkerContext::new("collector-1", transport.clone(), metrics.clone()),
            transport,
            registry: ClusterWorkerRegistry::new(metrics),
        }
    }

    fn local(context: &ClusterWorkerContext, role: &str, recorded: &Recorded) -> WorkerRef {
        LocalWorker::new(
            Role::new(role),
            Box::new(RecordingHandler::new(recorded.clone())),
            context.clone(),
        )
        .start(1024)
    }

    fn remote(context: &ClusterWorkerContext, role: &str) -> RemoteWorkerProvider {
        let mut provider = RemoteWorkerProvider::new(Role::new(role));
        provider.set_cluster_context(context.clone());
        provider
    }

    #[tokio::test]
    async fn test_resolve_local_and_remote() {
        let mut f = fixture();
        let recorded = Recorded::default();
        f.registry.put_role(Role::new("a"), local(&f.context, "a", &recorded)).unwrap();
        f.registry.put_provider(remote(&f.context, "c")).unwrap();

        assert!(f.registry.resolve(&Role::new("a")).unwrap().is_local());
        assert!(f.registry.resolve(&Role::new("c")).unwrap().is_remote());
        assert_eq!(f.registry.count(TargetKind::Local), 1);
        assert_eq!(f.registry.count(TargetKind::Remote), 1);
    }

    #[tokio::test]
    async fn test_duplicate_role_rejected_and_first_kept() {
        let mut f = fixture();
        let recorded = Recorded::default();
        f.registry.put_role(Role::new("a"), local(&f.context, "a", &recorded)).unwrap();

        let err = f.registry.put_provider(remote(&f.context, "a")).unwrap_err();
        assert_eq!(err.role, Role::new("a"));
        assert_eq!(err.existing, TargetKind::Local);

        // first registration survives
        assert!(f.registry.resolve(&Role::new("a")).unwrap().is_local());
        assert_eq!(f.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_local_role_rejected() {
        let mut f = fixture();
        let recorded = Recorded::default();
        f.registry.put_role(Role::new("a"), local(&f.context, "a", &recorded)).unwrap();

        let second = local(&f.context, "a", &recorded);
        assert!(f.registry.put_role(Role::new("a"), second.clone()).is_err());
        second.kill();
    }

    #[tokio::test]
    async fn test_dispatch_unknown_role_leaves_registry_unchanged() {
        let mut f = fixture();
        f.registry.put_provider(remote(&f.context, "c")).unwrap();
        let before: Vec<Role> = f.registry.roles().cloned().collect();

        let err = f
            .registry
            .dispatch(&Role::new("e"), serde_json::json!({ "seq": 1 }))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::RoleNotFound(ref e) if e.role == Role::new("e")));
        let after: Vec<Role> = f.registry.roles().cloned().collect();
        assert_eq!(before, after);
        assert!(!f.registry.contains(&Role::new("e")));
    }

    #[tokio::test]
    async fn test_unknown_roles_share_one_failure_label() {
        let f = fixture();
        let metrics = f.context.metrics().clone();

        for role in ["e", "f", "g"] {
            f.registry.dispatch(&Role::new(role), serde_json::Value::Null).await.unwrap_err();
        }

        assert_eq!(
            metrics
                .dispatch_failed
                .with_label_values(&[UNKNOWN_ROLE_LABEL, "role_not_found"])
                .get(),
            3
        );
        assert_eq!(metrics.dispatch_failed.with_label_values(&["e", "role_not_found"]).get(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_local_delivers_fifo() {
        let mut f = fixture();
        let recorded = Recorded::default();
        let worker = local(&f.context, "a", &recorded);
        f.registry.put_role(Role::new("a"), worker.clone()).unwrap();

        for seq in 0..50u64 {
            f.registry
                .dispatch(&Role::new("a"), serde_json::json!({ "seq": seq }))
                .await
                .unwrap();
        }

        assert_eq!(worker.stats().await.unwrap().processed, 50);
        assert_eq!(recorded.sequence(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_dispatch_remote_forwards_through_transport() {
        let mut f = fixture();
        let mut rx = f.transport.subscribe(&Role::new("c")).await;
        f.registry.put_provider(remote(&f.context, "c")).unwrap();

        f.registry
            .dispatch(&Role::new("c"), serde_json::json!({ "seq": 7 }))
            .await
            .unwrap();

        let forwarded = rx.recv().await.unwrap();
        assert_eq!(forwarded.role, Role::new("c"));
        assert_eq!(forwarded.payload["seq"], 7);
        assert_eq!(
            f.context.metrics().dispatch_total.with_label_values(&["c", "remote"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn test_forward_error_surfaces_to_caller() {
        let mut f = fixture();
        // no subscriber for "d": the transport cannot reach its owner
        f.registry.put_provider(remote(&f.context, "d")).unwrap();

        let err = f
            .registry
            .dispatch(&Role::new("d"), serde_json::Value::Null)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Forward(ForwardError::Rejected { .. })));
        assert_eq!(
            f.context
                .metrics()
                .dispatch_failed
                .with_label_values(&["d", "forward_rejected"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_remote_dispatch_creates_no_local_worker() {
        let mut f = fixture();
        let _rx = f.transport.subscribe(&Role::new("c")).await;
        f.registry.put_provider(remote(&f.context, "c")).unwrap();

        for _ in 0..10 {
            f.registry.dispatch(&Role::new("c"), serde_json::Value::Null).await.unwrap();
        }

        assert_eq!(f.registry.local_workers().count(), 0);
        assert_eq!(f.registry.count(TargetKind::Local), 0);
    }
}
