//! Tracking signature registry with URL matching.

use crate::definition::{RuleSet, TrackerSignature};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A tracking service identified in page telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingService {
    /// Service name (e.g., "Google Analytics")
    pub name: String,
    /// Category label (e.g., "analytics")
    pub category: String,
}

/// Signature with patterns folded to lowercase once at build time.
#[derive(Debug, Clone)]
struct CompiledSignature {
    service: TrackingService,
    patterns: Vec<String>,
}

/// Immutable lookup of tracking services by URL substring.
///
/// Built once from a [`RuleSet`] and shared read-only between audits.
#[derive(Debug, Clone, Default)]
pub struct TrackerRegistry {
    signatures: Vec<CompiledSignature>,
}

impl TrackerRegistry {
    /// Build a registry from the trackers in a rule set.
    #[must_use]
    pub fn from_rules(rules: &RuleSet) -> Self {
        Self::from_signatures(&rules.trackers)
    }

    /// Build a registry from explicit signatures.
    #[must_use]
    pub fn from_signatures(signatures: &[TrackerSignature]) -> Self {
        let mut registry = Self::default();

        for signature in signatures {
            registry.signatures.push(CompiledSignature {
                service: TrackingService {
                    name: signature.name.clone(),
                    category: signature.category.clone(),
                },
                patterns: signature
                    .patterns
                    .iter()
                    .map(|p| p.to_lowercase())
                    .collect(),
            });
        }

        debug!(count = registry.signatures.len(), "built tracker registry");

        registry
    }

    /// Find every service whose patterns occur in `url` (case-insensitive).
    #[must_use]
    pub fn match_url(&self, url: &str) -> Vec<&TrackingService> {
        let url = url.to_lowercase();
        self.signatures
            .iter()
            .filter(|sig| sig.patterns.iter().any(|p| url.contains(p.as_str())))
            .map(|sig| &sig.service)
            .collect()
    }

    /// Get the number of services in the registry.
    #[must_use]
    pub fn count(&self) -> usize {
        self.signatures.len()
    }
}
