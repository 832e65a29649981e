//! Vigil Audit - Single-page GDPR compliance auditing.
//!
//! This crate turns one page load into a scored compliance report. It runs
//! content detectors over the rendered DOM, cross-references captured cookies
//! and requests against known trackers, inspects the TLS certificate, and
//! retries the whole audit with exponential backoff when navigation fails.
//!
//! # Features
//!
//! - Consent banner, privacy policy, cookie policy and contact detection
//! - Pre-consent cookie and tracking request violations
//! - Weighted 0-100 score with priority-ranked recommendations
//! - Per-dimension failure isolation
//! - Retry logic with exponential backoff and a concurrency ceiling
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vigil_audit::Auditor;
//! use vigil_browser::BrowserEngine;
//! use vigil_core::AppConfig;
//!
//! let config = AppConfig::load()?;
//! let engine = Arc::new(BrowserEngine::new(config.browser.clone()));
//! let auditor = Auditor::from_config(engine, &config)?;
//!
//! let report = auditor.audit("https://example.com").await;
//! println!("score: {}", report.score);
//!
//! auditor.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod check;
#[allow(missing_docs)]
pub mod content;
#[allow(missing_docs)]
pub mod cookies;
#[allow(missing_docs)]
pub mod error;
pub mod orchestrator;
pub mod recommendations;
#[allow(missing_docs)]
pub mod report;
pub mod scoring;
#[allow(missing_docs)]
pub mod ssl;
#[allow(missing_docs)]
pub mod violations;

// Re-export commonly used types
pub use check::isolate;
pub use content::ContentAnalyzer;
pub use error::{AuditError, DimensionError, Result};
pub use orchestrator::{AuditState, Auditor};
pub use report::{
    AuditReport, CheckResult, DebugInfo, Evidence, Recommendation, Violation, ViolationType,
};
pub use ssl::{SslInspector, SslReport};
pub use violations::ViolationAnalyzer;
