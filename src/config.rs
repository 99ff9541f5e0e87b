use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::CircuitBreakerConfig;

// ============================================================================
// Collector Configuration
// ============================================================================
//
// Node-level settings loaded from TOML. The worker manifest (which roles run
// locally, which are forwarded) lives in its own file, referenced from
// [stream].manifest_path, and is read by provider discovery.
//
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub node: NodeSettings,
    pub transport: TransportSettings,
    pub metrics: MetricsSettings,
    pub stream: StreamSettings,
}

impl CollectorConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read collector config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid collector config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub id: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            id: "collector-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Memory,
    Kafka,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub kind: TransportKind,
    pub brokers: String,
    /// Forwarded messages for role R go to topic `<topic_prefix>R`
    pub topic_prefix: String,
    pub message_timeout_ms: u64,
    /// Per-role outbound capacity of the in-memory transport
    pub queue_capacity: usize,
    pub circuit_breaker: BreakerSettings,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::Memory,
            brokers: "127.0.0.1:9092".to_string(),
            topic_prefix: "collector.stream.".to_string(),
            message_timeout_ms: 5000,
            queue_capacity: 4096,
            circuit_breaker: BreakerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout_secs: u64,
    pub success_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_secs: 30,
            success_threshold: 3,
        }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            open_timeout: Duration::from_secs(settings.open_timeout_secs),
            success_threshold: settings.success_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub manifest_path: PathBuf,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("config/workers.toml"),
        }
    }
}
