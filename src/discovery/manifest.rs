use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::worker::{ProviderDiscoveryError, Role, WorkerSettings};

// ============================================================================
// Worker Manifest
// ============================================================================
//
// Plain list of provider definitions, e.g.:
//
//   [[local]]
//   role = "segment-aggregate"
//   queue_size = 4096
//   batch_size = 100
//
//   [[remote]]
//   role = "service-metric-persistence"
//   node = "collector-2"
//
// `implementation` defaults to the role name. Which implementations exist is
// decided by the ProviderCatalog, not by the manifest.
//
// ============================================================================

fn default_queue_size() -> usize {
    WorkerSettings::default().queue_size
}

fn default_batch_size() -> usize {
    WorkerSettings::default().batch_size
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerManifest {
    #[serde(default)]
    pub local: Vec<LocalDefinition>,
    #[serde(default)]
    pub remote: Vec<RemoteDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalDefinition {
    pub role: String,
    #[serde(default)]
    pub implementation: Option<String>,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub flush_interval_ms: Option<u64>,
}

impl LocalDefinition {
    pub fn role(&self) -> Role {
        Role::new(self.role.clone())
    }

    pub fn implementation(&self) -> &str {
        self.implementation.as_deref().unwrap_or(&self.role)
    }

    pub fn settings(&self) -> WorkerSettings {
        WorkerSettings {
            queue_size: self.queue_size,
            batch_size: self.batch_size,
            flush_interval: self.flush_interval_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteDefinition {
    pub role: String,
    #[serde(default)]
    pub implementation: Option<String>,
    /// Peer node owning the role
    #[serde(default)]
    pub node: Option<String>,
}

impl RemoteDefinition {
    pub fn role(&self) -> Role {
        Role::new(self.role.clone())
    }

    pub fn implementation(&self) -> &str {
        self.implementation.as_deref().unwrap_or(&self.role)
    }
}

impl WorkerManifest {
    pub fn from_toml_str(raw: &str) -> Result<Self, ProviderDiscoveryError> {
        let manifest: WorkerManifest = toml::from_str(raw)?;
        manifest.check()?;
        Ok(manifest)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderDiscoveryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ProviderDiscoveryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    fn check(&self) -> Result<(), ProviderDiscoveryError> {
        let roles = self.local.iter().map(|d| &d.role).chain(self.remote.iter().map(|d| &d.role));
        for role in roles {
            if role.trim().is_empty() {
                return Err(ProviderDiscoveryError::Invalid("role name must not be empty".to_string()));
            }
        }
        Ok(())
    }
}
