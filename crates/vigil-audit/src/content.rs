//! DOM detectors for the consent banner, policy links and contact details.

use crate::check::isolate;
use crate::error::DimensionError;
use crate::report::{CheckResult, Evidence};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use vigil_core::Dimension;
use vigil_rules::{LinkRules, RuleSet};

const BANNER_SCORE: u8 = 100;
const PRIVACY_POLICY_SCORE: u8 = 100;
const COOKIE_POLICY_SCORE: u8 = 80;
const CONTACT_SCORE: u8 = 80;

/// Longest excerpt of matched element text kept as evidence.
const MAX_EXCERPT_CHARS: usize = 160;

/// Elements whose text never renders.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Runs the content detectors of a [`RuleSet`] against a parsed page.
#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    rules: Arc<RuleSet>,
}

impl ContentAnalyzer {
    #[must_use]
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Run all four detectors. Each is isolated: one failing never affects
    /// the others.
    #[must_use]
    pub fn analyze(&self, document: &Html) -> BTreeMap<Dimension, CheckResult> {
        let mut checks = BTreeMap::new();
        checks.insert(
            Dimension::CookieBanner,
            isolate(Dimension::CookieBanner, 0, || self.detect_cookie_banner(document)),
        );
        checks.insert(
            Dimension::PrivacyPolicy,
            isolate(Dimension::PrivacyPolicy, 0, || {
                detect_policy_link(document, &self.rules.privacy_policy, PRIVACY_POLICY_SCORE)
            }),
        );
        checks.insert(
            Dimension::CookiePolicy,
            isolate(Dimension::CookiePolicy, 0, || {
                detect_policy_link(document, &self.rules.cookie_policy, COOKIE_POLICY_SCORE)
            }),
        );
        checks.insert(
            Dimension::ContactInfo,
            isolate(Dimension::ContactInfo, 0, || self.detect_contact_info(document)),
        );
        checks
    }

    /// Banner is present when a known container holds real text, or when
    /// consent wording appears anywhere in the visible text.
    pub fn detect_cookie_banner(&self, document: &Html) -> Result<CheckResult, DimensionError> {
        let rules = &self.rules.cookie_banner;
        let mut evidence = Vec::new();

        for raw in &rules.selectors {
            let selector = parse_selector(raw)?;
            let matched = document.select(&selector).find_map(|element| {
                let text = element_text(element);
                (text.chars().count() > rules.min_text_length).then_some(text)
            });
            if let Some(text) = matched {
                evidence.push(Evidence::Selector {
                    selector: raw.clone(),
                    text: excerpt(&text),
                });
            }
        }

        let body = visible_text(document).to_lowercase();
        for keyword in &rules.keywords {
            if body.contains(&keyword.to_lowercase()) {
                evidence.push(Evidence::Keyword {
                    keyword: keyword.clone(),
                });
            }
        }

        debug!(matches = evidence.len(), "cookie banner detection");

        Ok(if evidence.is_empty() {
            CheckResult::missing()
        } else {
            CheckResult::found(BANNER_SCORE, evidence)
        })
    }

    /// Contact details are present when any `mailto:`/`tel:` link exists or
    /// any contact selector matches.
    pub fn detect_contact_info(&self, document: &Html) -> Result<CheckResult, DimensionError> {
        let anchors = parse_selector("a[href]")?;
        let mut evidence = Vec::new();

        for anchor in document.select(&anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if let Some(address) = strip_scheme(href, "mailto:") {
                evidence.push(Evidence::Email { address });
            } else if let Some(number) = strip_scheme(href, "tel:") {
                evidence.push(Evidence::Phone { number });
            }
        }

        for raw in &self.rules.contact.selectors {
            let selector = parse_selector(raw)?;
            if let Some(element) = document.select(&selector).next() {
                evidence.push(Evidence::Selector {
                    selector: raw.clone(),
                    text: excerpt(&element_text(element)),
                });
            }
        }

        Ok(if evidence.is_empty() {
            CheckResult::missing()
        } else {
            CheckResult::found(CONTACT_SCORE, evidence)
        })
    }
}

/// Record every anchor whose `href` or text contains a keyword. The first
/// keyword in rule order decides which one is reported for a link.
pub fn detect_policy_link(
    document: &Html,
    rules: &LinkRules,
    score: u8,
) -> Result<CheckResult, DimensionError> {
    let anchors = parse_selector("a")?;
    let keywords: Vec<(String, &String)> = rules
        .keywords
        .iter()
        .map(|k| (k.to_lowercase(), k))
        .collect();

    let mut evidence = Vec::new();
    for anchor in document.select(&anchors) {
        let href = anchor.value().attr("href").unwrap_or_default();
        let text = element_text(anchor);
        let haystack_href = href.to_lowercase();
        let haystack_text = text.to_lowercase();

        let matched = keywords.iter().find(|(needle, _)| {
            haystack_href.contains(needle.as_str()) || haystack_text.contains(needle.as_str())
        });
        if let Some((_, keyword)) = matched {
            evidence.push(Evidence::Link {
                href: href.to_string(),
                text,
                keyword: (*keyword).clone(),
            });
        }
    }

    Ok(if evidence.is_empty() {
        CheckResult::missing()
    } else {
        CheckResult::found(score, evidence)
    })
}

/// Text a visitor can read: everything outside script, style and similar
/// non-rendering elements.
#[must_use]
pub fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    text
}

fn parse_selector(raw: &str) -> Result<Selector, DimensionError> {
    Selector::parse(raw).map_err(|e| DimensionError::InvalidSelector {
        selector: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Element text with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn excerpt(text: &str) -> String {
    text.chars().take(MAX_EXCERPT_CHARS).collect()
}

/// Everything after a URL scheme (case-insensitive), kept verbatim.
fn strip_scheme(href: &str, scheme: &str) -> Option<String> {
    let prefix = href.get(..scheme.len())?;
    if !prefix.eq_ignore_ascii_case(scheme) {
        return None;
    }
    let value = &href[scheme.len()..];
    (!value.is_empty()).then(|| value.to_string())
}
