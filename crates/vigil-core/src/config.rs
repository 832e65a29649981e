//! Configuration management for Vigil.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Dimension;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Desktop Chrome user agent presented to audited sites.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Upper bound for `audit.max_concurrent_audits`; each audit holds a page open
/// in the shared browser.
pub const MAX_CONCURRENT_AUDITS: usize = 256;

/// Main engine configuration.
///
/// This is loaded from `~/.config/vigil/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser session settings
    pub browser: BrowserConfig,
    /// Audit orchestration settings
    pub audit: AuditConfig,
    /// Scoring policy
    pub scoring: ScoringConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML or fail validation
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `VIGIL_HEADLESS`: Override browser headless mode (true/false)
    /// - `VIGIL_SETTLE_DELAY_MS`: Override the post-load settle window
    /// - `VIGIL_MAX_RETRIES`: Override the audit retry ceiling
    /// - `VIGIL_MAX_CONCURRENT_AUDITS`: Override the concurrent audit limit
    /// - `VIGIL_RULES_PATH`: Load detector rules from this TOML file
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("VIGIL_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Some(val) = lookup("VIGIL_SETTLE_DELAY_MS") {
            if let Ok(delay) = val.parse() {
                self.browser.settle_delay_ms = delay;
                tracing::debug!("Override browser.settle_delay_ms from env: {}", delay);
            }
        }

        if let Some(val) = lookup("VIGIL_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.audit.max_retries = retries;
                tracing::debug!("Override audit.max_retries from env: {}", retries);
            }
        }

        if let Some(val) = lookup("VIGIL_MAX_CONCURRENT_AUDITS") {
            if let Ok(limit) = val.parse() {
                self.audit.max_concurrent_audits = limit;
                tracing::debug!("Override audit.max_concurrent_audits from env: {}", limit);
            }
        }

        if let Some(val) = lookup("VIGIL_RULES_PATH") {
            if !val.is_empty() {
                tracing::debug!("Override audit.rules_path from env: {}", val);
                self.audit.rules_path = Some(PathBuf::from(val));
            }
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_CONCURRENT_AUDITS).contains(&self.audit.max_concurrent_audits) {
            return Err(ConfigError::InvalidValue {
                field: "audit.max_concurrent_audits".to_string(),
                reason: format!("must be between 1 and {MAX_CONCURRENT_AUDITS}"),
            });
        }

        let timeouts = [
            ("browser.launch_timeout_secs", self.browser.launch_timeout_secs),
            ("browser.navigation_timeout_secs", self.browser.navigation_timeout_secs),
            ("browser.operation_timeout_secs", self.browser.operation_timeout_secs),
            ("audit.ssl_timeout_secs", self.audit.ssl_timeout_secs),
        ];
        for (field, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        self.scoring.weights.validate()
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/vigil/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "vigil", "vigil").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Explicit Chrome/Chromium executable (auto-detected when unset)
    pub executable: Option<PathBuf>,
    /// Browser launch timeout in seconds
    pub launch_timeout_secs: u64,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Timeout for any other single page operation in seconds
    pub operation_timeout_secs: u64,
    /// Delay after load during which late trackers may fire, in milliseconds
    pub settle_delay_ms: u64,
    /// User agent presented to audited sites
    pub user_agent: String,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            launch_timeout_secs: 30,
            navigation_timeout_secs: 30,
            operation_timeout_secs: 10,
            settle_delay_ms: 3000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

/// Audit orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base delay before the first retry; doubles on each further retry
    pub retry_base_delay_ms: u64,
    /// Simultaneous audits sharing the browser process
    pub max_concurrent_audits: usize,
    /// Inspect the TLS certificate of HTTPS targets
    pub check_ssl: bool,
    /// TLS connect and handshake timeout in seconds
    pub ssl_timeout_secs: u64,
    /// Detector rule file replacing the built-in rule set
    pub rules_path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay_ms: 1000,
            max_concurrent_audits: 4,
            check_ssl: true,
            ssl_timeout_secs: 10,
            rules_path: None,
        }
    }
}

/// Scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-dimension weights for the overall score
    pub weights: DimensionWeights,
    /// Points deducted per non-essential cookie set before consent
    pub cookie_penalty: u32,
    /// Points deducted per tracking request sent before consent
    pub tracking_request_penalty: u32,
    /// Score given to the pre-consent dimension when its analysis fails
    pub violation_fallback_score: u8,
    /// Cookie count above which the inventory is considered excessive
    pub excessive_cookie_threshold: usize,
    /// Points deducted per cookie beyond the threshold
    pub excess_cookie_penalty: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: DimensionWeights::default(),
            cookie_penalty: 15,
            tracking_request_penalty: 10,
            violation_fallback_score: 50,
            excessive_cookie_threshold: 10,
            excess_cookie_penalty: 5,
        }
    }
}

/// Weight of each dimension in the overall score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionWeights {
    /// Consent banner weight
    pub cookie_banner: f64,
    /// Privacy policy weight
    pub privacy_policy: f64,
    /// Cookie policy weight
    pub cookie_policy: f64,
    /// Contact information weight
    pub contact_info: f64,
    /// Cookie inventory weight
    pub cookies: f64,
    /// Pre-consent violations weight
    pub pre_consent_violations: f64,
}

impl DimensionWeights {
    /// Weight for one dimension.
    #[must_use]
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::CookieBanner => self.cookie_banner,
            Dimension::PrivacyPolicy => self.privacy_policy,
            Dimension::CookiePolicy => self.cookie_policy,
            Dimension::ContactInfo => self.contact_info,
            Dimension::Cookies => self.cookies,
            Dimension::PreConsentViolations => self.pre_consent_violations,
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        let mut total = 0.0;
        for dimension in Dimension::ALL {
            let weight = self.weight(dimension);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("scoring.weights.{dimension}"),
                    reason: format!("must be a non-negative number, got {weight}"),
                });
            }
            total += weight;
        }

        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidValue {
                field: "scoring.weights".to_string(),
                reason: format!("must sum to 1.0, got {total}"),
            });
        }

        Ok(())
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            cookie_banner: 0.20,
            privacy_policy: 0.20,
            cookie_policy: 0.15,
            contact_info: 0.10,
            cookies: 0.10,
            pre_consent_violations: 0.25,
        }
    }
}
