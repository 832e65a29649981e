//! Vigil Rules - Detector rule tables and tracking signature registry.
//!
//! Detection heuristics are data, not code. This crate owns the versioned TOML
//! rule set the detectors read from, its loader and validation, and the
//! compiled tracker registry used to classify network requests.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Strongly-typed rule sections
//! - **Loader** ([`loader`]): Built-in rule set or a replacement TOML file
//! - **Registry** ([`registry`]): Tracker lookup by URL substring
//! - **Errors** ([`error`]): Rule-specific error types
//!
//! # Example
//!
//! ```rust
//! use vigil_rules::{RuleLoader, TrackerRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rules = RuleLoader::builtin()?;
//! let registry = TrackerRegistry::from_rules(&rules);
//!
//! let services = registry.match_url("https://www.google-analytics.com/collect");
//! assert_eq!(services[0].name, "Google Analytics");
//! assert!(rules.essential_cookies.is_essential("session_id"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use definition::{
    BannerRules, ContactRules, EssentialCookieRules, LinkRules, RuleSet, TrackerSignature,
};
pub use error::{Result, RulesError};
pub use loader::RuleLoader;
pub use registry::{TrackerRegistry, TrackingService};
