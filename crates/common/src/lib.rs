//! Beacon Common Library
//!
//! Shared wire model, error taxonomy and configuration for the Beacon
//! reporting client.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{ReportingConfig, TruncationConfig};
pub use error::{Error, RejectionKind, Result};
pub use types::*;

/// Beacon client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
