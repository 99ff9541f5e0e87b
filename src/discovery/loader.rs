use std::path::PathBuf;

use super::{ProviderCatalog, WorkerManifest};
use crate::worker::{
    LocalWorkerProvider, ProviderDiscoveryError, ProviderNotFoundError, RemoteWorkerProvider, TargetKind,
};

// ============================================================================
// Provider Discovery
// ============================================================================
//
// Two independent passes, one per provider kind. A pass fails as a whole only
// when the manifest cannot be read or parsed. A definition naming an unknown
// implementation does not fail the pass: it is returned in `missing` with its
// role, and the remaining definitions are still instantiated.
//
// ============================================================================

/// Result of one discovery pass
pub struct Discovered<P> {
    pub providers: Vec<P>,
    pub missing: Vec<ProviderNotFoundError>,
}

impl<P> Default for Discovered<P> {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            missing: Vec::new(),
        }
    }
}

pub trait ProviderDiscovery: Send + Sync {
    fn load_local_providers(&self) -> Result<Discovered<LocalWorkerProvider>, ProviderDiscoveryError>;

    fn load_remote_providers(&self) -> Result<Discovered<RemoteWorkerProvider>, ProviderDiscoveryError>;
}

enum ManifestSource {
    Path(PathBuf),
    Inline(WorkerManifest),
}

/// Discovery backed by a TOML manifest and the compiled-in catalog
pub struct ManifestDiscovery {
    source: ManifestSource,
    catalog: ProviderCatalog,
}

impl ManifestDiscovery {
    /// The manifest is read on every pass, not at construction
    pub fn from_path(path: impl Into<PathBuf>, catalog: ProviderCatalog) -> Self {
        Self {
            source: ManifestSource::Path(path.into()),
            catalog,
        }
    }

    pub fn from_manifest(manifest: WorkerManifest, catalog: ProviderCatalog) -> Self {
        Self {
            source: ManifestSource::Inline(manifest),
            catalog,
        }
    }

    fn manifest(&self) -> Result<WorkerManifest, ProviderDiscoveryError> {
        match &self.source {
            ManifestSource::Path(path) => WorkerManifest::from_path(path),
            ManifestSource::Inline(manifest) => Ok(manifest.clone()),
        }
    }
}

impl ProviderDiscovery for ManifestDiscovery {
    fn load_local_providers(&self) -> Result<Discovered<LocalWorkerProvider>, ProviderDiscoveryError> {
        let manifest = self.manifest()?;
        let mut discovered = Discovered::default();

        for definition in &manifest.local {
            match self.catalog.local_factory(definition.implementation()) {
                Some(factory) => discovered.providers.push(LocalWorkerProvider::new(
                    definition.role(),
                    definition.settings(),
                    factory,
                )),
                None => discovered.missing.push(ProviderNotFoundError {
                    role: definition.role(),
                    implementation: definition.implementation().to_string(),
                    kind: TargetKind::Local,
                }),
            }
        }

        tracing::debug!(
            found = discovered.providers.len(),
            missing = discovered.missing.len(),
            "Local provider discovery finished"
        );
        Ok(discovered)
    }

    fn load_remote_providers(&self) -> Result<Discovered<RemoteWorkerProvider>, ProviderDiscoveryError> {
        let manifest = self.manifest()?;
        let mut discovered = Discovered::default();

        for definition in &manifest.remote {
            if !self.catalog.has_remote(definition.implementation()) {
                discovered.missing.push(ProviderNotFoundError {
                    role: definition.role(),
                    implementation: definition.implementation().to_string(),
                    kind: TargetKind::Remote,
                });
                continue;
            }

            let provider = RemoteWorkerProvider::new(definition.role());
            let provider = match &definition.node {
                Some(node) => provider.with_node(node.clone()),
                None => provider,
            };
            discovered.providers.push(provider);
        }

        tracing::debug!(
            found = discovered.providers.len(),
            missing = discovered.missing.len(),
            "Remote provider discovery finished"
        );
        Ok(discovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Role;

    fn manifest() -> WorkerManifest {
        WorkerManifest::from_toml_str(
            r#"
            [[local]]
            role = "segment-aggregate"

            [[local]]
            role = "alarm"

            [[local]]
            role = "service-metric-persistence"
            batch_size = 50

            [[remote]]
            role = "topology"

            [[remote]]
            role = "segment-aggregate-peer"
            implementation = "segment-aggregate"
            node = "collector-2"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_local_does_not_stop_pass() {
        let discovery = ManifestDiscovery::from_manifest(manifest(), ProviderCatalog::builtin());
        let local = discovery.load_local_providers().unwrap();

        let roles: Vec<&Role> = local.providers.iter().map(|p| p.role()).collect();
        assert_eq!(roles, vec![&Role::new("segment-aggregate"), &Role::new("service-metric-persistence")]);
        assert_eq!(local.providers[1].settings().batch_size, 50);

        assert_eq!(local.missing.len(), 1);
        assert_eq!(local.missing[0].role, Role::new("alarm"));
        assert_eq!(local.missing[0].kind, TargetKind::Local);
    }

    #[test]
    fn test_remote_pass_reports_missing_with_role() {
        let discovery = ManifestDiscovery::from_manifest(manifest(), ProviderCatalog::builtin());
        let remote = discovery.load_remote_providers().unwrap();

        assert_eq!(remote.providers.len(), 1);
        assert_eq!(remote.providers[0].role(), &Role::new("segment-aggregate-peer"));
        assert_eq!(remote.providers[0].node(), Some("collector-2"));

        assert_eq!(remote.missing.len(), 1);
        assert_eq!(remote.missing[0].role, Role::new("topology"));
        assert_eq!(remote.missing[0].implementation, "topology");
    }

    #[test]
    fn test_unreadable_manifest_fails_pass() {
        let discovery = ManifestDiscovery::from_path("/nonexistent/workers.toml", ProviderCatalog::builtin());
        assert!(matches!(
            discovery.load_local_providers(),
            Err(ProviderDiscoveryError::Read { .. })
        ));
        assert!(discovery.load_remote_providers().is_err());
    }

    #[test]
    fn test_empty_manifest_yields_nothing() {
        let discovery = ManifestDiscovery::from_manifest(WorkerManifest::default(), ProviderCatalog::builtin());
        let local = discovery.load_local_providers().unwrap();
        let remote = discovery.load_remote_providers().unwrap();

        assert!(local.providers.is_empty() && local.missing.is_empty());
        assert!(remote.providers.is_empty() && remote.missing.is_empty());
    }
}
