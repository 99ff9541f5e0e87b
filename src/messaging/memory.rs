use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, RwLock};

use super::{Destination, Transport, TransportError};
use crate::worker::{Role, WorkEnvelope};

// ============================================================================
// In-Memory Transport
// ============================================================================
//
// Bounded outbound queue per role, consumed by whoever subscribed to it.
// Used when the node runs without a broker, and as the queue dependency in
// tests (a peer node subscribes and re-dispatches into its own registry).
//
// ============================================================================

pub struct InMemoryTransport {
    capacity: usize,
    ready: AtomicBool,
    queues: RwLock<HashMap<Role, mpsc::Sender<WorkEnvelope>>>,
    unreachable: RwLock<HashSet<Role>>,
}

impl InMemoryTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ready: AtomicBool::new(true),
            queues: RwLock::new(HashMap::new()),
            unreachable: RwLock::new(HashSet::new()),
        }
    }

    /// Open the outbound queue for a role. Replaces any earlier subscriber.
    pub async fn subscribe(&self, role: &Role) -> mpsc::Receiver<WorkEnvelope> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.queues.write().await.insert(role.clone(), tx);
        tracing::debug!(role = %role, capacity = self.capacity, "Subscribed to in-memory queue");
        rx
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Simulate a partitioned peer: enqueues for this role are rejected
    pub async fn mark_unreachable(&self, role: &Role) {
        self.unreachable.write().await.insert(role.clone());
    }

    pub async fn mark_reachable(&self, role: &Role) {
        self.unreachable.write().await.remove(role);
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn enqueue(&self, destination: &Destination, envelope: WorkEnvelope) -> Result<(), TransportError> {
        if self.unreachable.read().await.contains(&destination.role) {
            return Err(TransportError::Unreachable {
                destination: destination.to_string(),
                reason: "peer marked unreachable".to_string(),
            });
        }

        let queues = self.queues.read().await;
        let Some(sender) = queues.get(&destination.role) else {
            return Err(TransportError::Unreachable {
                destination: destination.to_string(),
                reason: "no consumer subscribed".to_string(),
            });
        };

        sender.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull {
                destination: destination.to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed {
                destination: destination.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(role: &Role, n: u64) -> WorkEnvelope {
        WorkEnvelope::new(role.clone(), serde_json::json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_enqueue_reaches_subscriber() {
        let transport = InMemoryTransport::new(8);
        let role = Role::new("c");
        let mut rx = transport.subscribe(&role).await;

        transport
            .enqueue(&Destination::new(role.clone(), None), envelope(&role, 1))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload["n"], 1);
    }

    #[tokio::test]
    async fn test_enqueue_without_subscriber_is_unreachable() {
        let transport = InMemoryTransport::new(8);
        let role = Role::new("c");

        let err = transport
            .enqueue(&Destination::new(role.clone(), None), envelope(&role, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let transport = InMemoryTransport::new(2);
        let role = Role::new("c");
        let _rx = transport.subscribe(&role).await;
        let dest = Destination::new(role.clone(), None);

        transport.enqueue(&dest, envelope(&role, 1)).await.unwrap();
        transport.enqueue(&dest, envelope(&role, 2)).await.unwrap();
        let err = transport.enqueue(&dest, envelope(&role, 3)).await.unwrap_err();
        assert!(matches!(err, TransportError::QueueFull { .. }));
    }

    #[tokio::test]
    async fn test_dropped_consumer_reports_closed() {
        let transport = InMemoryTransport::new(2);
        let role = Role::new("c");
        drop(transport.subscribe(&role).await);

        let err = transport
            .enqueue(&Destination::new(role.clone(), None), envelope(&role, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_toggle() {
        let transport = InMemoryTransport::new(4);
        let role = Role::new("d");
        let _rx = transport.subscribe(&role).await;
        let dest = Destination::new(role.clone(), Some("collector-2".into()));

        transport.mark_unreachable(&role).await;
        assert!(transport.enqueue(&dest, envelope(&role, 1)).await.is_err());

        transport.mark_reachable(&role).await;
        assert!(transport.enqueue(&dest, envelope(&role, 2)).await.is_ok());
    }
}
