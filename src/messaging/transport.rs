use async_trait::async_trait;
use std::fmt;

use crate::worker::{Role, WorkEnvelope};

// ============================================================================
// Transport - outbound queue towards peer nodes
// ============================================================================
//
// The stream module only needs three things from its queue dependency:
// - messages are addressed by role (plus an optional owning node)
// - enqueue is fire-and-forward: it returns once the message is handed off
// - a rejected enqueue is reported distinctly from success
//
// ============================================================================

/// Where a forwarded message should go
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub role: Role,
    /// Peer node owning the role, used as partition key when present
    pub node: Option<String>,
}

impl Destination {
    pub fn new(role: Role, node: Option<String>) -> Self {
        Self { role, node }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{}@{}", self.role, node),
            None => write!(f, "{}", self.role),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Outbound queue for {destination} is full")]
    QueueFull { destination: String },

    #[error("Destination {destination} is unreachable: {reason}")]
    Unreachable { destination: String, reason: String },

    #[error("Circuit breaker open for {destination}")]
    CircuitOpen { destination: String },

    #[error("Failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Outbound queue for {destination} is closed")]
    Closed { destination: String },
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Name used in logs and dependency errors
    fn name(&self) -> &str;

    /// Whether the queue module finished its own bring-up
    fn is_ready(&self) -> bool;

    /// Hand the envelope to the outbound queue. Never waits for the peer.
    async fn enqueue(&self, destination: &Destination, envelope: WorkEnvelope) -> Result<(), TransportError>;
}
