//! Cookie inventory: every cookie a page set, from headers and the jar.

use crate::report::{CheckResult, Evidence};
use std::collections::HashSet;
use url::Url;
use vigil_browser::{BrowserCookie, TelemetrySnapshot};
use vigil_core::ScoringConfig;
use vigil_rules::EssentialCookieRules;

/// A cookie seen during the audit, classified against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedCookie {
    pub name: String,
    pub domain: String,
    pub captured_at_millis: i64,
    pub essential: bool,
}

/// Merge `Set-Cookie` captures and the cookie jar into one list, keyed by
/// name. Header captures come first since they carry the earliest timestamp.
#[must_use]
pub fn collect_cookies(
    telemetry: &TelemetrySnapshot,
    jar: &[BrowserCookie],
    essential: &EssentialCookieRules,
) -> Vec<ObservedCookie> {
    let mut seen = HashSet::new();
    let mut cookies = Vec::new();

    for capture in &telemetry.cookies {
        let domain = host_of(&capture.source_url);
        for name in capture.cookie_names() {
            if seen.insert(name.clone()) {
                cookies.push(ObservedCookie {
                    essential: essential.is_essential(&name),
                    name,
                    domain: domain.clone(),
                    captured_at_millis: capture.captured_at_millis,
                });
            }
        }
    }

    for cookie in jar {
        if seen.insert(cookie.name.clone()) {
            cookies.push(ObservedCookie {
                name: cookie.name.clone(),
                domain: cookie.domain.trim_start_matches('.').to_string(),
                captured_at_millis: cookie.captured_at_millis,
                essential: essential.is_essential(&cookie.name),
            });
        }
    }

    cookies
}

/// Inventory check: full marks up to the excessive-cookie threshold, then a
/// fixed deduction per extra cookie.
#[must_use]
pub fn inventory_check(cookies: &[ObservedCookie], scoring: &ScoringConfig) -> CheckResult {
    if cookies.is_empty() {
        return CheckResult {
            score: 100,
            ..CheckResult::missing()
        };
    }

    let excess = cookies.len().saturating_sub(scoring.excessive_cookie_threshold);
    let deduction = u32::try_from(excess)
        .unwrap_or(u32::MAX)
        .saturating_mul(scoring.excess_cookie_penalty);
    let score = u8::try_from(100u32.saturating_sub(deduction)).unwrap_or(0);

    let evidence = cookies
        .iter()
        .map(|cookie| Evidence::Cookie {
            name: cookie.name.clone(),
            domain: cookie.domain.clone(),
            essential: cookie.essential,
        })
        .collect();

    CheckResult::found(score, evidence)
}

/// Number of cookies listed in an inventory result.
#[must_use]
pub fn cookie_count(check: &CheckResult) -> usize {
    check
        .evidence
        .iter()
        .filter(|e| matches!(e, Evidence::Cookie { .. }))
        .count()
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_browser::CookieCapture;
    use vigil_rules::RuleLoader;

    fn essential() -> EssentialCookieRules {
        RuleLoader::builtin().unwrap().essential_cookies
    }

    fn capture(header: &str, at: i64) -> CookieCapture {
        CookieCapture {
            source_url: "https://www.example.com/".to_string(),
            raw_set_cookie_header: header.to_string(),
            captured_at_millis: at,
        }
    }

    fn observed(n: usize) -> Vec<ObservedCookie> {
        (0..n)
            .map(|i| ObservedCookie {
                name: format!("c{i}"),
                domain: "example.com".to_string(),
                captured_at_millis: 0,
                essential: false,
            })
            .collect()
    }

    #[test]
    fn test_headers_and_jar_merged_by_name() {
        let telemetry = TelemetrySnapshot {
            cookies: vec![capture("session_id=1; HttpOnly\n_ga=GA1", 10)],
            ..TelemetrySnapshot::default()
        };
        let jar = vec![
            BrowserCookie {
                name: "_ga".to_string(),
                domain: ".example.com".to_string(),
                captured_at_millis: 50,
            },
            BrowserCookie {
                name: "_fbp".to_string(),
                domain: ".example.com".to_string(),
                captured_at_millis: 50,
            },
        ];

        let cookies = collect_cookies(&telemetry, &jar, &essential());
        let names: Vec<_> = cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["session_id", "_ga", "_fbp"]);

        assert!(cookies[0].essential);
        assert!(!cookies[1].essential);
        assert_eq!(cookies[1].captured_at_millis, 10);
        assert_eq!(cookies[1].domain, "www.example.com");
        assert_eq!(cookies[2].domain, "example.com");
    }

    #[test]
    fn test_inventory_under_threshold() {
        let check = inventory_check(&observed(10), &ScoringConfig::default());
        assert!(check.found);
        assert_eq!(check.score, 100);
        assert_eq!(cookie_count(&check), 10);
    }

    #[test]
    fn test_inventory_penalises_excess() {
        let check = inventory_check(&observed(13), &ScoringConfig::default());
        assert_eq!(check.score, 85);

        let check = inventory_check(&observed(40), &ScoringConfig::default());
        assert_eq!(check.score, 0);
    }

    #[test]
    fn test_no_cookies_is_clean() {
        let check = inventory_check(&[], &ScoringConfig::default());
        assert!(!check.found);
        assert_eq!(check.score, 100);
    }
}
