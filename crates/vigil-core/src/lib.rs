//! Vigil Core - Foundation crate for the Vigil compliance audit engine.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other Vigil crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes and enums (`AuditRequest`, `Dimension`, `Priority`, `Severity`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{AppConfig, AuditRequest, Dimension};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.audit.max_retries, 2);
//!
//! let request = AuditRequest::new("https://example.com")?;
//! assert_eq!(request.as_str(), "https://example.com/");
//! assert_eq!(Dimension::ALL.len(), 6);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, AuditConfig, BrowserConfig, DimensionWeights, ScoringConfig, MAX_CONCURRENT_AUDITS,
};
pub use error::{ConfigError, ConfigResult, Result, VigilError};
pub use types::{AuditRequest, Dimension, Priority, Severity, Timestamp};
