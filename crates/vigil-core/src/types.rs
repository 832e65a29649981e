//! Shared types used across the Vigil engine.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::VigilError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A validated audit target.
///
/// Audit requests must be absolute URLs with an `http` or `https` scheme and
/// a host. Anything else is rejected before any browser work happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AuditRequest(Url);

impl AuditRequest {
    /// Create a new `AuditRequest` from a string.
    ///
    /// # Errors
    /// Returns error if the input is not an absolute `http`/`https` URL with a host.
    pub fn new(url: impl AsRef<str>) -> Result<Self, VigilError> {
        let raw = url.as_ref().trim();
        if raw.is_empty() {
            return Err(VigilError::Validation("URL is required".to_string()));
        }

        let parsed = Url::parse(raw)
            .map_err(|e| VigilError::Validation(format!("invalid URL '{raw}': {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(VigilError::Validation(format!(
                    "unsupported URL scheme '{other}': only http and https are allowed"
                )))
            }
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(VigilError::Validation(format!("URL '{raw}' has no host")));
        }

        Ok(Self(parsed))
    }

    /// Get the parsed URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Get the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AuditRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An independently scored compliance aspect of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    /// Consent banner presence
    CookieBanner,
    /// Privacy policy link presence
    PrivacyPolicy,
    /// Cookie policy link presence
    CookiePolicy,
    /// Reachable contact details
    ContactInfo,
    /// Cookie inventory
    Cookies,
    /// Cookies and tracking requests observed before consent
    PreConsentViolations,
}

impl Dimension {
    /// Every dimension, in report order.
    pub const ALL: [Dimension; 6] = [
        Self::CookieBanner,
        Self::PrivacyPolicy,
        Self::CookiePolicy,
        Self::ContactInfo,
        Self::Cookies,
        Self::PreConsentViolations,
    ];

    /// The camelCase key used in reports.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::CookieBanner => "cookieBanner",
            Self::PrivacyPolicy => "privacyPolicy",
            Self::CookiePolicy => "cookiePolicy",
            Self::ContactInfo => "contactInfo",
            Self::Cookies => "cookies",
            Self::PreConsentViolations => "preConsentViolations",
        }
    }

    /// Get a human-readable display name for the dimension.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CookieBanner => "Cookie banner",
            Self::PrivacyPolicy => "Privacy policy",
            Self::CookiePolicy => "Cookie policy",
            Self::ContactInfo => "Contact information",
            Self::Cookies => "Cookies",
            Self::PreConsentViolations => "Pre-consent tracking",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Recommendation priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// The audit itself could not complete
    Error,
    /// Active legal exposure (data collected before consent)
    Critical,
    /// Missing mandatory element
    High,
    /// Missing secondary element or questionable practice
    Medium,
    /// Informational follow-up
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        f.write_str(label)
    }
}

/// Severity of a detected violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Low impact
    Low,
    /// Moderate impact
    Medium,
    /// Data collected without a lawful basis
    High,
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
///
/// Serializes as an RFC 3339 (ISO 8601) string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_request_valid() {
        let valid = vec![
            "https://example.com",
            "http://example.com/path?q=1",
            "  https://sub.example.co.uk:8443/  ",
        ];

        for url in valid {
            assert!(AuditRequest::new(url).is_ok(), "Failed for: {url}");
        }
    }

    #[test]
    fn test_audit_request_invalid() {
        let invalid = vec![
            "",
            "not a url",
            "example.com",
            "ftp://example.com",
            "file:///etc/passwd",
            "javascript:alert(1)",
            "data:text/html,hi",
        ];

        for url in invalid {
            let err = AuditRequest::new(url).expect_err(url);
            assert!(matches!(err, VigilError::Validation(_)), "wrong error for {url}");
        }
    }

    #[test]
    fn test_audit_request_accessors() {
        let request = AuditRequest::new("https://Example.com/a").expect("valid URL");
        assert_eq!(request.as_str(), "https://example.com/a");
        assert_eq!(request.url().scheme(), "https");
    }

    #[test]
    fn test_dimension_keys() {
        let keys: Vec<_> = Dimension::ALL.iter().map(Dimension::key).collect();
        assert_eq!(
            keys,
            vec![
                "cookieBanner",
                "privacyPolicy",
                "cookiePolicy",
                "contactInfo",
                "cookies",
                "preConsentViolations"
            ]
        );
    }

    #[test]
    fn test_dimension_serialization_matches_key() {
        for dimension in Dimension::ALL {
            let json = serde_json::to_string(&dimension).expect("serialize dimension");
            assert_eq!(json, format!("\"{}\"", dimension.key()));
        }
    }

    #[test]
    fn test_priority_ordering() {
        let mut priorities = vec![
            Priority::Low,
            Priority::Critical,
            Priority::Medium,
            Priority::Error,
            Priority::High,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![
                Priority::Error,
                Priority::Critical,
                Priority::High,
                Priority::Medium,
                Priority::Low
            ]
        );
        assert_eq!(
            serde_json::to_string(&Priority::Critical).expect("serialize priority"),
            "\"CRITICAL\""
        );
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).expect("serialize timestamp");
        assert!(json.contains('T'));
    }
}
