//! Priority-ranked remediation advice derived from check results.

use crate::cookies::cookie_count;
use crate::report::{CheckResult, Recommendation, ViolationType};
use std::collections::BTreeMap;
use vigil_core::{Dimension, Priority, ScoringConfig};

/// Build recommendations, most urgent first.
///
/// Order: one CRITICAL entry per violation type found, HIGH entries for a
/// missing banner or privacy policy, MEDIUM entries for secondary gaps, then
/// LOW entries for dimensions that could not be analyzed. A detector that
/// failed found nothing, so its "add" entry is emitted as well.
#[must_use]
pub fn recommend(
    checks: &BTreeMap<Dimension, CheckResult>,
    scoring: &ScoringConfig,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some(check) = checks.get(&Dimension::PreConsentViolations) {
        let violations = check.violations.as_deref().unwrap_or_default();
        for kind in [ViolationType::PreConsentCookies, ViolationType::TrackingRequests] {
            if let Some(violation) = violations.iter().find(|v| v.kind == kind) {
                recommendations.push(critical(kind, &violation.details));
            }
        }
    }

    if is_missing(checks, Dimension::CookieBanner) {
        recommendations.push(Recommendation {
            priority: Priority::High,
            dimension: Some(Dimension::CookieBanner),
            title: "Add a cookie consent banner".to_string(),
            message: "No consent banner was detected. Visitors must be able to accept or \
                      refuse non-essential cookies before any are set."
                .to_string(),
        });
    }

    if is_missing(checks, Dimension::PrivacyPolicy) {
        recommendations.push(Recommendation {
            priority: Priority::High,
            dimension: Some(Dimension::PrivacyPolicy),
            title: "Add a privacy policy".to_string(),
            message: "No link to a privacy policy was found. Publish one and link it from \
                      every page, typically in the footer."
                .to_string(),
        });
    }

    if is_missing(checks, Dimension::CookiePolicy) {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            dimension: Some(Dimension::CookiePolicy),
            title: "Add a cookie policy".to_string(),
            message: "No cookie policy link was found. Describe which cookies the site uses \
                      and why."
                .to_string(),
        });
    }

    if is_missing(checks, Dimension::ContactInfo) {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            dimension: Some(Dimension::ContactInfo),
            title: "Provide contact information".to_string(),
            message: "No email address, phone number or contact page was found. Visitors need \
                      a way to exercise their data protection rights."
                .to_string(),
        });
    }

    if let Some(check) = checks.get(&Dimension::Cookies) {
        let count = cookie_count(check);
        if count > scoring.excessive_cookie_threshold {
            recommendations.push(Recommendation {
                priority: Priority::Medium,
                dimension: Some(Dimension::Cookies),
                title: "Reduce the number of cookies".to_string(),
                message: format!(
                    "The page set {count} cookies. Review whether each one is necessary."
                ),
            });
        }
    }

    for (dimension, check) in checks {
        if let Some(error) = &check.error {
            recommendations.push(Recommendation {
                priority: Priority::Low,
                dimension: Some(*dimension),
                title: format!("Review {} manually", dimension.display_name().to_lowercase()),
                message: format!("Automatic analysis failed: {error}"),
            });
        }
    }

    recommendations.sort_by_key(|r| r.priority);
    recommendations
}

fn is_missing(checks: &BTreeMap<Dimension, CheckResult>, dimension: Dimension) -> bool {
    checks
        .get(&dimension)
        .is_some_and(|check| !check.found)
}

fn critical(kind: ViolationType, details: &[String]) -> Recommendation {
    let listed = details.join(", ");
    match kind {
        ViolationType::PreConsentCookies => Recommendation {
            priority: Priority::Critical,
            dimension: Some(Dimension::PreConsentViolations),
            title: "Stop setting non-essential cookies before consent".to_string(),
            message: format!(
                "These cookies were set before any consent was given: {listed}. \
                 Defer them until the visitor opts in."
            ),
        },
        ViolationType::TrackingRequests => Recommendation {
            priority: Priority::Critical,
            dimension: Some(Dimension::PreConsentViolations),
            title: "Block tracking until consent is given".to_string(),
            message: format!(
                "Requests were sent to tracking services before consent: {listed}. \
                 Load these scripts only after the visitor opts in."
            ),
        },
    }
}
