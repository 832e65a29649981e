//! Rule set types and structures.
//!
//! This module defines the data structures for detector rules loaded from TOML.
//! Rules are pure data: extending detection means editing a rule file, never
//! the detectors themselves.

use crate::error::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Highest rule schema version this build understands.
pub const SUPPORTED_VERSION: u32 = 1;

/// Complete detector rule set loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule schema version
    pub version: u32,

    /// Consent banner detection
    pub cookie_banner: BannerRules,

    /// Privacy policy link detection
    pub privacy_policy: LinkRules,

    /// Cookie policy link detection
    pub cookie_policy: LinkRules,

    /// Contact detail detection
    pub contact: ContactRules,

    /// Cookies exempt from consent
    pub essential_cookies: EssentialCookieRules,

    /// Known third-party tracking services
    #[serde(default)]
    pub trackers: Vec<TrackerSignature>,
}

impl RuleSet {
    /// Validate the rule set for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > SUPPORTED_VERSION {
            return Err(RulesError::UnsupportedVersion {
                found: self.version,
                supported: SUPPORTED_VERSION,
            });
        }

        self.cookie_banner.validate()?;
        self.privacy_policy.validate("privacy_policy")?;
        self.cookie_policy.validate("cookie_policy")?;
        self.contact.validate()?;
        self.essential_cookies.validate()?;

        let mut names = HashSet::new();
        for tracker in &self.trackers {
            tracker.validate()?;
            if !names.insert(tracker.name.to_lowercase()) {
                return Err(RulesError::ValidationError {
                    section: "trackers".to_string(),
                    reason: format!("duplicate tracker name '{}'", tracker.name),
                });
            }
        }

        Ok(())
    }
}

/// Consent banner detection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannerRules {
    /// CSS selectors for known banner containers
    pub selectors: Vec<String>,

    /// Phrases whose presence in body text indicates a banner
    pub keywords: Vec<String>,

    /// Text a selector match must exceed to count
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
}

fn default_min_text_length() -> usize {
    10
}

impl BannerRules {
    fn validate(&self) -> Result<()> {
        if self.selectors.is_empty() && self.keywords.is_empty() {
            return Err(RulesError::ValidationError {
                section: "cookie_banner".to_string(),
                reason: "at least one selector or keyword is required".to_string(),
            });
        }
        reject_blank("cookie_banner.selectors", &self.selectors)?;
        reject_blank("cookie_banner.keywords", &self.keywords)
    }
}

/// Link keyword rules used by the policy detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRules {
    /// Substrings matched against anchor `href` and text, in priority order
    pub keywords: Vec<String>,
}

impl LinkRules {
    fn validate(&self, section: &str) -> Result<()> {
        if self.keywords.is_empty() {
            return Err(RulesError::ValidationError {
                section: section.to_string(),
                reason: "at least one keyword is required".to_string(),
            });
        }
        reject_blank(&format!("{section}.keywords"), &self.keywords)
    }
}

/// Contact detail detection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRules {
    /// CSS selectors for contact pages, sections or addresses
    pub selectors: Vec<String>,
}

impl ContactRules {
    fn validate(&self) -> Result<()> {
        reject_blank("contact.selectors", &self.selectors)
    }
}

/// Essential cookie allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssentialCookieRules {
    /// Name substrings marking a cookie as essential
    pub patterns: Vec<String>,
}

impl EssentialCookieRules {
    /// Whether a cookie name matches the allow-list (case-insensitive).
    #[must_use]
    pub fn is_essential(&self, cookie_name: &str) -> bool {
        let name = cookie_name.to_lowercase();
        self.patterns
            .iter()
            .any(|pattern| name.contains(&pattern.to_lowercase()))
    }

    fn validate(&self) -> Result<()> {
        reject_blank("essential_cookies.patterns", &self.patterns)
    }
}

/// A known third-party tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSignature {
    /// Human-readable service name (e.g., "Google Analytics")
    pub name: String,

    /// Category label (e.g., "analytics", "advertising")
    pub category: String,

    /// URL substrings identifying requests to the service
    pub patterns: Vec<String>,
}

impl TrackerSignature {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RulesError::ValidationError {
                section: "trackers".to_string(),
                reason: "tracker name cannot be empty".to_string(),
            });
        }
        if self.category.trim().is_empty() {
            return Err(RulesError::ValidationError {
                section: "trackers".to_string(),
                reason: format!("tracker '{}' has no category", self.name),
            });
        }
        if self.patterns.is_empty() {
            return Err(RulesError::ValidationError {
                section: "trackers".to_string(),
                reason: format!("tracker '{}' has no patterns", self.name),
            });
        }
        reject_blank(&format!("trackers.{}", self.name), &self.patterns)
    }
}

fn reject_blank(section: &str, values: &[String]) -> Result<()> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(RulesError::ValidationError {
            section: section.to_string(),
            reason: "entries cannot be blank".to_string(),
        });
    }
    Ok(())
}
