//! Pre-consent violation analysis.
//!
//! Everything observed before the settle boundary happened without any
//! consent interaction, since audits never click anything. Non-essential
//! cookies and requests to known trackers in that window are violations.

use crate::cookies::ObservedCookie;
use crate::error::DimensionError;
use crate::report::{CheckResult, Evidence, Violation, ViolationType};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use vigil_browser::{NetworkEvent, TelemetrySnapshot};
use vigil_core::{ScoringConfig, Severity};
use vigil_rules::{TrackerRegistry, TrackingService};

/// Cross-references cookies and requests against the tracker registry.
#[derive(Debug, Clone)]
pub struct ViolationAnalyzer {
    registry: Arc<TrackerRegistry>,
    cookie_penalty: u32,
    tracking_request_penalty: u32,
}

impl ViolationAnalyzer {
    #[must_use]
    pub fn new(registry: Arc<TrackerRegistry>, scoring: &ScoringConfig) -> Self {
        Self {
            registry,
            cookie_penalty: scoring.cookie_penalty,
            tracking_request_penalty: scoring.tracking_request_penalty,
        }
    }

    /// Analyze a finished capture window, using its end as the settle
    /// boundary.
    pub fn analyze_snapshot(
        &self,
        cookies: &[ObservedCookie],
        telemetry: &TelemetrySnapshot,
    ) -> Result<CheckResult, DimensionError> {
        if telemetry.window_end_millis < telemetry.window_start_millis {
            return Err(DimensionError::Analysis(format!(
                "capture window ends at {} before it starts at {}",
                telemetry.window_end_millis, telemetry.window_start_millis
            )));
        }
        self.analyze(cookies, &telemetry.requests, telemetry.window_end_millis)
    }

    /// Analyze everything captured at or before `settle_boundary_millis`.
    pub fn analyze(
        &self,
        cookies: &[ObservedCookie],
        requests: &[NetworkEvent],
        settle_boundary_millis: i64,
    ) -> Result<CheckResult, DimensionError> {
        if self.registry.count() == 0 {
            warn!("tracker registry is empty; only cookies will be checked");
        }

        let offending_cookies: Vec<&ObservedCookie> = cookies
            .iter()
            .filter(|c| !c.essential && c.captured_at_millis <= settle_boundary_millis)
            .collect();

        let mut evidence = Vec::new();
        let mut services: Vec<TrackingService> = Vec::new();
        let mut service_names = HashSet::new();
        let mut tracking_requests = 0u32;

        for request in requests
            .iter()
            .filter(|r| r.captured_at_millis <= settle_boundary_millis)
        {
            let matches = self.registry.match_url(&request.url);
            if matches.is_empty() {
                continue;
            }
            tracking_requests = tracking_requests.saturating_add(1);
            for service in matches {
                evidence.push(Evidence::TrackingRequest {
                    url: request.url.clone(),
                    service: service.name.clone(),
                });
                if service_names.insert(service.name.clone()) {
                    services.push(service.clone());
                }
            }
        }

        for cookie in &offending_cookies {
            evidence.push(Evidence::Cookie {
                name: cookie.name.clone(),
                domain: cookie.domain.clone(),
                essential: false,
            });
        }

        let mut violations = Vec::new();
        if !offending_cookies.is_empty() {
            violations.push(Violation {
                kind: ViolationType::PreConsentCookies,
                severity: Severity::High,
                message: format!(
                    "{} non-essential cookie(s) set before consent",
                    offending_cookies.len()
                ),
                details: offending_cookies.iter().map(|c| c.name.clone()).collect(),
            });
        }
        if tracking_requests > 0 {
            violations.push(Violation {
                kind: ViolationType::TrackingRequests,
                severity: Severity::High,
                message: format!(
                    "{tracking_requests} request(s) to {} tracking service(s) sent before consent",
                    services.len()
                ),
                details: services.iter().map(|s| s.name.clone()).collect(),
            });
        }

        let cookie_count = u32::try_from(offending_cookies.len()).unwrap_or(u32::MAX);
        let deduction = cookie_count
            .saturating_mul(self.cookie_penalty)
            .saturating_add(tracking_requests.saturating_mul(self.tracking_request_penalty));
        let score = u8::try_from(100u32.saturating_sub(deduction)).unwrap_or(0);

        debug!(
            cookies = offending_cookies.len(),
            tracking_requests,
            score,
            "pre-consent analysis"
        );

        Ok(CheckResult {
            found: !violations.is_empty(),
            score,
            evidence,
            error: None,
            violations: Some(violations),
            tracking_services: services,
        })
    }
}

/// Tracking services loaded through `<script src>` in the final DOM.
#[must_use]
pub fn embedded_trackers(document: &Html, registry: &TrackerRegistry) -> Vec<TrackingService> {
    let Ok(scripts) = Selector::parse("script[src]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&scripts)
        .filter_map(|script| script.value().attr("src"))
        .flat_map(|src| registry.match_url(src))
        .filter(|service| seen.insert(service.name.clone()))
        .cloned()
        .collect()
}
