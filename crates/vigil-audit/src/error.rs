use thiserror::Error;

/// Failure of one audit attempt.
///
/// Every variant except [`AuditError::Validation`] is retried by the
/// orchestrator; none of them ever reaches the caller of
/// [`crate::Auditor::audit`].
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Invalid audit request: {0}")]
    Validation(#[from] vigil_core::VigilError),

    #[error("Browser error: {0}")]
    Browser(#[from] vigil_browser::BrowserError),

    #[error("Navigation returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Navigation to {url} returned no response")]
    NoResponse { url: String },
}

impl AuditError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}

/// Failure confined to a single compliance dimension.
#[derive(Debug, Error)]
pub enum DimensionError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Analysis panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;
