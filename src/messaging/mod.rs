// ============================================================================
// Messaging - the queue dependency of the stream module
// ============================================================================

mod kafka;
mod memory;
mod transport;

pub use kafka::KafkaTransport;
pub use memory::InMemoryTransport;
pub use transport::{Destination, Transport, TransportError};
