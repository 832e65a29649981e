//! Rule set loading from TOML.
//!
//! The built-in rule set is compiled into the binary. A rule file on disk can
//! replace it wholesale; partial overlays are not supported.

use crate::{
    definition::RuleSet,
    error::{Result, RulesError},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BUILTIN_RULES: &str = include_str!("../rules/default.toml");
const BUILTIN_LABEL: &str = "<built-in>";

/// Loader for detector rule sets.
#[derive(Debug, Clone, Default)]
pub struct RuleLoader {
    /// Rule file replacing the built-in set
    path: Option<PathBuf>,
}

impl RuleLoader {
    /// Create a loader reading from `path`, or the built-in set when `None`.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Load and validate the configured rule set.
    ///
    /// # Errors
    /// Returns error if the file can't be read, isn't valid TOML, or fails validation.
    pub fn load(&self) -> Result<RuleSet> {
        match &self.path {
            Some(path) => Self::load_from_path(path),
            None => Self::builtin(),
        }
    }

    /// Load the built-in rule set.
    pub fn builtin() -> Result<RuleSet> {
        let rules = Self::parse(BUILTIN_RULES, BUILTIN_LABEL)?;
        debug!(
            version = rules.version,
            trackers = rules.trackers.len(),
            "loaded built-in rules"
        );
        Ok(rules)
    }

    /// Load a rule set from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<RuleSet> {
        let contents = std::fs::read_to_string(path).map_err(|e| RulesError::LoadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let rules = Self::parse(&contents, &path.display().to_string())?;

        info!(
            path = %path.display(),
            version = rules.version,
            trackers = rules.trackers.len(),
            "loaded rules from file"
        );

        Ok(rules)
    }

    fn parse(contents: &str, label: &str) -> Result<RuleSet> {
        let rules: RuleSet = toml::from_str(contents).map_err(|e| RulesError::ParseError {
            path: label.to_string(),
            source: e,
        })?;
        rules.validate()?;
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL_RULES: &str = r##"
version = 1

[cookie_banner]
selectors = ["#consent"]
keywords = ["we use cookies"]

[privacy_policy]
keywords = ["privacy"]

[cookie_policy]
keywords = ["cookie policy"]

[contact]
selectors = []

[essential_cookies]
patterns = ["session"]

[[trackers]]
name = "Example Analytics"
category = "analytics"
patterns = ["stats.example.net"]
"##;

    fn write_rules(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("rules.toml");
        std::fs::write(&path, contents).expect("write rules file");
        path
    }

    #[test]
    fn test_default_loader_uses_builtin() {
        let rules = RuleLoader::default().load().expect("load built-in rules");
        assert!(rules
            .trackers
            .iter()
            .any(|t| t.name == "Google Analytics"));
    }

    #[test]
    fn test_load_from_path() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = write_rules(tmp.path(), MINIMAL_RULES);

        let rules = RuleLoader::new(Some(path)).load().expect("load rules file");
        assert_eq!(rules.trackers.len(), 1);
        assert_eq!(rules.trackers[0].name, "Example Analytics");
        assert_eq!(rules.cookie_banner.selectors, vec!["#consent".to_string()]);
        // Omitted field falls back to its default
        assert_eq!(rules.cookie_banner.min_text_length, 10);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = RuleLoader::new(Some(tmp.path().join("missing.toml"))).load();
        assert!(matches!(result, Err(RulesError::LoadError { .. })));
    }

    #[test]
    fn test_load_malformed_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = write_rules(tmp.path(), "version = [");
        let result = RuleLoader::load_from_path(&path);
        assert!(matches!(result, Err(RulesError::ParseError { .. })));
    }

    #[test]
    fn test_load_invalid_rules() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = write_rules(
            tmp.path(),
            &MINIMAL_RULES.replace("patterns = [\"stats.example.net\"]", "patterns = []"),
        );
        let result = RuleLoader::load_from_path(&path);
        assert!(matches!(result, Err(RulesError::ValidationError { .. })));
    }
}
