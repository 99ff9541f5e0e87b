use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    error::KafkaError,
    producer::{FutureProducer, FutureRecord, Producer},
    types::RDKafkaErrorCode,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Destination, Transport, TransportError};
use crate::config::TransportSettings;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig};
use crate::worker::WorkEnvelope;

// ============================================================================
// Kafka Transport - forwards work to the peer owning a role
// ============================================================================
//
// enqueue() hands the record to librdkafka's local producer queue with
// send_result() and returns. Delivery is observed in a background task that
// feeds the circuit breaker, so a broker outage turns into fast ForwardErrors
// instead of a growing backlog.
//
// Topic: <topic_prefix><role>. Key: owning node, or the envelope id.
//
// ============================================================================

pub struct KafkaTransport {
    producer: FutureProducer,
    topic_prefix: String,
    circuit_breaker: CircuitBreaker,
    ready: AtomicBool,
}

impl KafkaTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("message.timeout.ms", settings.message_timeout_ms.to_string())
            .create()?;

        Ok(Self {
            producer,
            topic_prefix: settings.topic_prefix.clone(),
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::from(&settings.circuit_breaker)),
            ready: AtomicBool::new(false),
        })
    }

    /// Fetch cluster metadata once; the transport reports ready only after
    /// a broker answered.
    pub async fn probe(&self, timeout: Duration) -> Result<usize, TransportError> {
        let producer = self.producer.clone();
        let result = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await;

        match result {
            Ok(Ok(brokers)) => {
                self.ready.store(true, Ordering::SeqCst);
                tracing::info!(brokers = brokers, "✅ Kafka transport ready");
                Ok(brokers)
            }
            Ok(Err(e)) => Err(TransportError::Unreachable {
                destination: "kafka".to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(TransportError::Unreachable {
                destination: "kafka".to_string(),
                reason: format!("metadata probe aborted: {}", e),
            }),
        }
    }

    pub fn topic_for(&self, destination: &Destination) -> String {
        format!("{}{}", self.topic_prefix, destination.role)
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    fn name(&self) -> &str {
        "kafka"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn enqueue(&self, destination: &Destination, envelope: WorkEnvelope) -> Result<(), TransportError> {
        if self.circuit_breaker.admit().await.is_err() {
            return Err(TransportError::CircuitOpen {
                destination: destination.to_string(),
            });
        }

        let topic = self.topic_for(destination);
        let key = destination.node.clone().unwrap_or_else(|| envelope.id.to_string());
        let payload = serde_json::to_vec(&envelope)?;
        let record = FutureRecord::to(&topic).key(&key).payload(&payload);

        let handoff = self.producer.send_result(record).map_err(|(e, _record)| e);

        match handoff {
            Ok(delivery) => {
                tracing::debug!(
                    topic = %topic,
                    envelope_id = %envelope.id,
                    "Handed envelope to Kafka producer"
                );

                let breaker = self.circuit_breaker.clone();
                let report_topic = topic.clone();
                tokio::spawn(async move {
                    match delivery.await {
                        Ok(Ok(_)) => breaker.on_success().await,
                        Ok(Err((e, _message))) => {
                            tracing::warn!(topic = %report_topic, error = %e, "Kafka delivery failed");
                            breaker.on_failure().await;
                        }
                        Err(_) => {
                            tracing::warn!(topic = %report_topic, "Kafka delivery report dropped");
                        }
                    }
                });
                Ok(())
            }
            Err(e) => Err(self.reject(destination, &topic, e).await),
        }
    }
}

impl KafkaTransport {
    // A full local queue is backpressure, not a broker failure: it leaves the breaker alone
    async fn reject(&self, destination: &Destination, topic: &str, e: KafkaError) -> TransportError {
        tracing::error!(topic = %topic, error = %e, "Kafka producer rejected envelope");

        match e {
            KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => TransportError::QueueFull {
                destination: destination.to_string(),
            },
            other => {
                self.circuit_breaker.on_failure().await;
                TransportError::Unreachable {
                    destination: destination.to_string(),
                    reason: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerSettings;
    use crate::utils::CircuitState;
    use crate::worker::Role;

    // Producer creation does not contact the brokers
    fn transport() -> KafkaTransport {
        let settings = TransportSettings {
            brokers: "127.0.0.1:1".to_string(),
            circuit_breaker: BreakerSettings {
                failure_threshold: 2,
                open_timeout_secs: 60,
                success_threshold: 1,
            },
            ..TransportSettings::default()
        };
        KafkaTransport::new(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_topic_per_role() {
        let kafka = transport();
        let destination = Destination::new(Role::new("segment-aggregate"), Some("collector-2".to_string()));
        assert_eq!(kafka.topic_for(&destination), "collector.stream.segment-aggregate");
    }

    #[tokio::test]
    async fn test_not_ready_until_probed() {
        let kafka = transport();
        assert!(!kafka.is_ready());
        assert_eq!(kafka.name(), "kafka");
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let kafka = transport();
        kafka.circuit_breaker().on_failure().await;
        kafka.circuit_breaker().on_failure().await;

        let destination = Destination::new(Role::new("c"), None);
        let err = kafka
            .enqueue(&destination, WorkEnvelope::new(Role::new("c"), serde_json::Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::CircuitOpen { .. }));
    }

    #[tokio::test]
    async fn test_full_producer_queue_does_not_open_circuit() {
        let kafka = transport();
        let destination = Destination::new(Role::new("c"), None);

        for _ in 0..3 {
            let err = kafka
                .reject(
                    &destination,
                    "collector.stream.c",
                    KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull),
                )
                .await;
            assert!(matches!(err, TransportError::QueueFull { .. }));
        }
        assert_eq!(kafka.circuit_breaker().state().await, CircuitState::Closed);

        for _ in 0..2 {
            let err = kafka
                .reject(
                    &destination,
                    "collector.stream.c",
                    KafkaError::MessageProduction(RDKafkaErrorCode::BrokerTransportFailure),
                )
                .await;
            assert!(matches!(err, TransportError::Unreachable { .. }));
        }
        assert_eq!(kafka.circuit_breaker().state().await, CircuitState::Open);
    }
}
