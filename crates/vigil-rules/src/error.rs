//! Error types for the rules subsystem.

use thiserror::Error;

/// Errors that can occur while loading or validating detector rules.
#[derive(Error, Debug)]
pub enum RulesError {
    /// Failed to read a rule file
    #[error("failed to load rules from {path}: {source}")]
    LoadError {
        /// Path to the rule file
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse rule TOML
    #[error("failed to parse rules TOML in {path}: {source}")]
    ParseError {
        /// Path to the rule file (`<built-in>` for the embedded set)
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// Rule set schema is newer (or older) than this build understands
    #[error("unsupported rule set version {found} (supported: 1..={supported})")]
    UnsupportedVersion {
        /// Version declared by the rule file
        found: u32,
        /// Highest supported version
        supported: u32,
    },

    /// Invalid rule set (validation failed)
    #[error("invalid rules in [{section}]: {reason}")]
    ValidationError {
        /// Section being validated
        section: String,
        /// Reason for validation failure
        reason: String,
    },
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RulesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = RulesError::ValidationError {
            section: "trackers".to_string(),
            reason: "tracker 'X' has no patterns".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid rules in [trackers]: tracker 'X' has no patterns"
        );
    }

    #[test]
    fn test_version_error_display() {
        let err = RulesError::UnsupportedVersion {
            found: 7,
            supported: 1,
        };
        assert!(err.to_string().contains("version 7"));
    }
}
