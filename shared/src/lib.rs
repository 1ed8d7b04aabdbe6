//! Shared utilities for the VM cloaking workspace

// Re-export common dependencies
pub use anyhow;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;

pub mod observability;

pub use observability::{init_logging, LogConfig, LogFormat, LogLevel};
