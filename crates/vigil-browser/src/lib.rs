//! Headless browser control and page-load telemetry for audits.
//!
//! Provides one lazily-launched browser process shared between audits, an
//! isolated page per audit presenting a fixed desktop fingerprint, and passive
//! capture of requests and `Set-Cookie` headers emitted while the page loads.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod telemetry;

pub use actions::{LoadedPage, PageLoader};
pub use engine::{BrowserEngine, IsolatedPage};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use telemetry::{
    BrowserCookie, CookieCapture, DocumentResponse, NetworkEvent, TelemetrySnapshot,
};
