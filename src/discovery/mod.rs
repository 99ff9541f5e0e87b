// ============================================================================
// Provider Discovery
// ============================================================================
//
// manifest - which roles run here and which are forwarded (TOML)
// catalog  - which implementations this binary ships (compiled in)
// loader   - the two discovery passes joining the two
//
// ============================================================================

mod catalog;
mod loader;
mod manifest;

pub use catalog::ProviderCatalog;
pub use loader::{Discovered, ManifestDiscovery, ProviderDiscovery};
pub use manifest::{LocalDefinition, RemoteDefinition, WorkerManifest};
