//! Audit report types.
//!
//! [`AuditReport`] is the only artifact an audit produces. It is serialized
//! with camelCase keys so it can be handed straight to a JSON consumer.

use crate::ssl::SslReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use vigil_core::{Dimension, Priority, Severity, Timestamp};
use vigil_rules::TrackingService;

/// Complete result of auditing one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Unique audit id, also attached to every log line of the audit
    pub id: Uuid,
    /// URL as requested
    pub url: String,
    /// When the report was produced
    pub timestamp: Timestamp,
    /// One result per compliance dimension; empty when the audit failed
    pub checks: BTreeMap<Dimension, CheckResult>,
    /// Weighted overall score, 0-100
    pub score: u8,
    /// Remediation advice, most urgent first
    pub recommendations: Vec<Recommendation>,
    /// Tracking services contacted or embedded by the page
    pub third_party_services: Vec<TrackingService>,
    /// Certificate inspection result, when enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslReport>,
    /// Diagnostics about how the audit ran
    pub debug: DebugInfo,
    /// Failure message when no analysis pass completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditReport {
    /// Degraded report returned when every attempt failed.
    #[must_use]
    pub fn failed(
        id: Uuid,
        url: impl Into<String>,
        message: impl Into<String>,
        retry_count: u32,
    ) -> Self {
        let message = message.into();
        Self {
            id,
            url: url.into(),
            timestamp: Timestamp::now(),
            checks: BTreeMap::new(),
            score: 0,
            recommendations: vec![Recommendation {
                priority: Priority::Error,
                dimension: None,
                title: "Audit could not be completed".to_string(),
                message: message.clone(),
            }],
            third_party_services: Vec::new(),
            ssl: None,
            debug: DebugInfo {
                retry_count,
                ..DebugInfo::default()
            },
            error: Some(message),
        }
    }

    /// Whether an analysis pass produced this report.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Result for one dimension.
    #[must_use]
    pub fn check(&self, dimension: Dimension) -> Option<&CheckResult> {
        self.checks.get(&dimension)
    }
}

/// Diagnostics about an audit run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    /// Navigation time until the load event
    pub load_time_millis: u64,
    /// Requests captured before settle
    pub network_request_count: usize,
    /// Attempts beyond the first
    pub retry_count: u32,
}

/// Outcome of one compliance dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub found: bool,
    pub score: u8,
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Only set on the pre-consent dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
    /// Only set on the pre-consent dimension
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracking_services: Vec<TrackingService>,
}

impl CheckResult {
    /// Dimension satisfied with `score`.
    #[must_use]
    pub fn found(score: u8, evidence: Vec<Evidence>) -> Self {
        Self {
            found: true,
            score,
            evidence,
            ..Self::default()
        }
    }

    /// Dimension not satisfied.
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// Dimension whose analysis failed.
    #[must_use]
    pub fn failed(score: u8, error: impl Into<String>) -> Self {
        Self {
            score,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Whether the analysis for this dimension failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A piece of evidence supporting a check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Evidence {
    /// A rule selector matched an element with enough text
    Selector { selector: String, text: String },
    /// A keyword appeared in visible page text
    Keyword { keyword: String },
    /// An anchor matched a link keyword
    Link {
        href: String,
        text: String,
        keyword: String,
    },
    /// `mailto:` address
    Email { address: String },
    /// `tel:` number
    Phone { number: String },
    /// A cookie observed on the page
    Cookie {
        name: String,
        domain: String,
        essential: bool,
    },
    /// A request to a known tracking service
    TrackingRequest { url: String, service: String },
}

/// Kind of pre-consent violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationType {
    PreConsentCookies,
    TrackingRequests,
}

/// A GDPR-relevant action taken before any consent interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationType,
    pub severity: Severity,
    pub message: String,
    /// Offending cookie or service names
    pub details: Vec<String>,
}

/// One remediation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    /// Dimension the advice addresses; `None` for audit-level failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    pub title: String,
    pub message: String,
}
