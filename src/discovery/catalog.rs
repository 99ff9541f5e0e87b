use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::worker::WorkerFactory;

// ============================================================================
// Provider Catalog
// ============================================================================
//
// Compile-time table of the provider implementations this binary ships.
// Local implementations map to the factory that builds their handler;
// remote implementations only need to be known, since forwarding is the
// same for every role.
//
// ============================================================================

#[derive(Default, Clone)]
pub struct ProviderCatalog {
    local: HashMap<String, Arc<dyn WorkerFactory>>,
    remote: BTreeSet<String>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the workers bundled in this crate
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        crate::workers::register_builtin(&mut catalog);
        catalog
    }

    pub fn with_local(mut self, implementation: impl Into<String>, factory: Arc<dyn WorkerFactory>) -> Self {
        self.register_local(implementation, factory);
        self
    }

    pub fn with_remote(mut self, implementation: impl Into<String>) -> Self {
        self.register_remote(implementation);
        self
    }

    pub fn register_local(&mut self, implementation: impl Into<String>, factory: Arc<dyn WorkerFactory>) {
        self.local.insert(implementation.into(), factory);
    }

    pub fn register_remote(&mut self, implementation: impl Into<String>) {
        self.remote.insert(implementation.into());
    }

    pub fn local_factory(&self, implementation: &str) -> Option<Arc<dyn WorkerFactory>> {
        self.local.get(implementation).cloned()
    }

    pub fn has_remote(&self, implementation: &str) -> bool {
        self.remote.contains(implementation)
    }

    pub fn local_implementations(&self) -> impl Iterator<Item = &str> {
        self.local.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{Role, WorkerCreationError, WorkerHandler, WorkerSettings};

    fn refusing_factory() -> Arc<dyn WorkerFactory> {
        Arc::new(
            |role: &Role, _settings: &WorkerSettings| -> Result<Box<dyn WorkerHandler>, WorkerCreationError> {
                Err(WorkerCreationError::Factory {
                    role: role.clone(),
                    reason: "test".to_string(),
                })
            },
        )
    }

    #[test]
    fn test_lookup_by_implementation_name() {
        let catalog = ProviderCatalog::new()
            .with_local("segment-aggregate", refusing_factory())
            .with_remote("segment-aggregate");

        assert!(catalog.local_factory("segment-aggregate").is_some());
        assert!(catalog.local_factory("alarm").is_none());
        assert!(catalog.has_remote("segment-aggregate"));
        assert!(!catalog.has_remote("alarm"));
    }

    #[test]
    fn test_builtin_catalog_ships_sample_workers() {
        let catalog = ProviderCatalog::builtin();
        let mut names: Vec<&str> = catalog.local_implementations().collect();
        names.sort();

        assert_eq!(names, vec!["segment-aggregate", "service-metric-persistence"]);
        assert!(catalog.has_remote("segment-aggregate"));
        assert!(catalog.has_remote("service-metric-persistence"));
    }
}
