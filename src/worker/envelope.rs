use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

// ============================================================================
// Work Envelope
// ============================================================================
//
// The unit handed to a worker queue or to the transport. The payload stays
// opaque JSON; only the worker bound to the role knows its concrete type.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WorkEnvelope {
    pub id: Uuid,
    pub role: Role,
    /// Node that first forwarded this envelope, if it crossed the transport
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl WorkEnvelope {
    pub fn new(role: Role, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            origin: None,
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn encode<T: Serialize>(role: Role, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(role, serde_json::to_value(payload)?))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Stamp the forwarding node; an envelope keeps its first origin.
    pub fn with_origin(mut self, node_id: &str) -> Self {
        if self.origin.is_none() {
            self.origin = Some(node_id.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Segment {
        service: String,
        duration_ms: u64,
    }

    #[test]
    fn test_encode_then_decode_payload() {
        let segment = Segment {
            service: "checkout".to_string(),
            duration_ms: 42,
        };

        let envelope = WorkEnvelope::encode(Role::new("segment-aggregate"), &segment).unwrap();
        assert_eq!(envelope.role.name(), "segment-aggregate");
        assert_eq!(envelope.decode::<Segment>().unwrap(), segment);
    }

    #[test]
    fn test_decode_wrong_shape_fails() {
        let envelope = WorkEnvelope::new(Role::new("a"), serde_json::json!({"unexpected": true}));
        assert!(envelope.decode::<Segment>().is_err());
    }

    #[test]
    fn test_origin_is_sticky() {
        let envelope = WorkEnvelope::new(Role::new("a"), serde_json::Value::Null)
            .with_origin("node-1")
            .with_origin("node-2");
        assert_eq!(envelope.origin.as_deref(), Some("node-1"));
    }

    #[test]
    fn test_envelope_ids_are_unique() {
        let a = WorkEnvelope::new(Role::new("a"), serde_json::Value::Null);
        let b = WorkEnvelope::new(Role::new("a"), serde_json::Value::Null);
        assert_ne!(a.id, b.id);
    }
}
