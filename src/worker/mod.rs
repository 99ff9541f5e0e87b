// ============================================================================
// Worker Module
// ============================================================================
//
// Role-addressed dispatch:
// - role / envelope  - what is addressed and what travels
// - local            - kameo actor serving a role on this node
// - provider         - Local / Remote providers bound to one role each
// - registry         - role -> dispatch target, frozen after bring-up
// - context          - shared handle injected into every provider
//
// ============================================================================

mod context;
mod envelope;
mod errors;
mod local;
mod provider;
mod registry;
mod role;

#[cfg(test)]
pub(crate) mod testing;

pub use context::ClusterWorkerContext;
pub use envelope::WorkEnvelope;
pub use errors::{
    DefineError, DispatchError, DuplicateRoleError, ForwardError, ProviderDiscoveryError, ProviderNotFoundError,
    RoleNotFoundError, TargetKind, WorkerCreationError,
};
pub use local::{LocalWorker, WorkerFactory, WorkerHandler, WorkerRef, WorkerStats};
pub use provider::{LocalWorkerProvider, RemoteWorkerProvider, WorkerProvider, WorkerSettings, MAX_QUEUE_SIZE};
pub use registry::{ClusterWorkerRegistry, DispatchTarget};
pub use role::Role;
