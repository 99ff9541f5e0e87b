//! Role-addressed worker dispatch for a telemetry collector node.
//!
//! A node brings up its stream module from a worker manifest: roles listed as
//! local get a kameo actor with its own bounded queue, roles listed as remote
//! are forwarded through the transport to the node that owns them. Callers
//! dispatch by role and never see which of the two they hit.

pub mod config;
pub mod discovery;
pub mod health;
pub mod messaging;
pub mod metrics;
pub mod module;
pub mod utils;
pub mod worker;
pub mod workers;
