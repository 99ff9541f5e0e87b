use std::fmt;

use super::Role;
use crate::messaging::TransportError;

// ============================================================================
// Worker Dispatch Errors
// ============================================================================
//
// Bring-up errors either abort the module (DefineError) or degrade it
// (ProviderNotFoundError, logged and reported). Runtime errors always reach
// the dispatch caller (DispatchError).
//
// ============================================================================

/// Which kind of dispatch target a role resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Local,
    Remote,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Local => "local",
            TargetKind::Remote => "remote",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("No worker registered for role '{role}'")]
pub struct RoleNotFoundError {
    pub role: Role,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Role '{role}' is already registered as a {existing} target")]
pub struct DuplicateRoleError {
    pub role: Role,
    pub existing: TargetKind,
}

/// A manifest entry names an implementation the catalog does not know
#[derive(Debug, Clone, thiserror::Error)]
#[error("No {kind} provider implementation '{implementation}' for role '{role}'")]
pub struct ProviderNotFoundError {
    pub role: Role,
    pub implementation: String,
    pub kind: TargetKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderDiscoveryError {
    #[error("Failed to read provider manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed provider manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid provider definition: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerCreationError {
    #[error("Cluster context was not assigned before creating worker for role '{role}'")]
    ContextNotAssigned { role: Role },

    #[error("Worker for role '{role}' was already created")]
    AlreadyCreated { role: Role },

    #[error("Invalid setting '{setting}' for role '{role}': {reason}")]
    InvalidSetting {
        role: Role,
        setting: &'static str,
        reason: String,
    },

    #[error("Worker factory for role '{role}' failed: {reason}")]
    Factory { role: Role, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Cluster context was not assigned to remote provider for role '{role}'")]
    ContextNotAssigned { role: Role },

    #[error("Transport rejected message for role '{role}': {source}")]
    Rejected {
        role: Role,
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    RoleNotFound(#[from] RoleNotFoundError),

    #[error("Queue for role '{role}' is full")]
    QueueFull { role: Role },

    #[error("Worker for role '{role}' is no longer running")]
    WorkerStopped { role: Role },

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("Worker registry has not been published yet")]
    NotReady,
}

impl DispatchError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            DispatchError::RoleNotFound(_) => "role_not_found",
            DispatchError::QueueFull { .. } => "queue_full",
            DispatchError::WorkerStopped { .. } => "worker_stopped",
            DispatchError::Forward(_) => "forward_rejected",
            DispatchError::NotReady => "not_ready",
        }
    }
}

/// Fatal bring-up failure of the stream module
#[derive(Debug, thiserror::Error)]
pub enum DefineError {
    #[error("Dependency module '{module}' is not ready (transport '{transport}')")]
    DependencyNotReady { module: &'static str, transport: String },

    #[error(transparent)]
    Discovery(#[from] ProviderDiscoveryError),

    #[error("Failed to create worker for role '{role}': {source}")]
    WorkerCreation {
        role: Role,
        #[source]
        source: WorkerCreationError,
    },

    #[error(transparent)]
    DuplicateRole(#[from] DuplicateRoleError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_found_names_role() {
        let err = ProviderNotFoundError {
            role: Role::new("segment-aggregate"),
            implementation: "segment-aggregate-v2".to_string(),
            kind: TargetKind::Local,
        };
        let message = err.to_string();
        assert!(message.contains("segment-aggregate-v2"));
        assert!(message.contains("'segment-aggregate'"));
        assert!(message.contains("local"));
    }

    #[test]
    fn test_dispatch_error_reasons() {
        let err: DispatchError = RoleNotFoundError { role: Role::new("e") }.into();
        assert_eq!(err.reason(), "role_not_found");
        assert_eq!(err.to_string(), "No worker registered for role 'e'");

        let err = DispatchError::QueueFull { role: Role::new("a") };
        assert_eq!(err.reason(), "queue_full");
    }

    #[test]
    fn test_define_error_wraps_duplicate() {
        let err: DefineError = DuplicateRoleError {
            role: Role::new("a"),
            existing: TargetKind::Remote,
        }
        .into();
        assert_eq!(err.to_string(), "Role 'a' is already registered as a remote target");
    }
}
