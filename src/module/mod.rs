// ============================================================================
// Stream Module
// ============================================================================
//
// Installs the worker dispatch core on top of the queue module and hands
// back a running StreamModuleContext.
//
// ============================================================================

mod context;
mod installer;

pub use context::{BringUpReport, StreamModuleContext};
pub use installer::StreamModuleInstaller;

pub const GROUP_NAME: &str = "collector_stream";

/// Group name of the queue module this one depends on
pub const QUEUE_GROUP_NAME: &str = "collector_queue";
