//! Weighted overall score.

use crate::report::CheckResult;
use std::collections::BTreeMap;
use vigil_core::{Dimension, DimensionWeights};

/// Combine per-dimension scores into one 0-100 score.
///
/// A dimension that is missing, or whose score is out of range, contributes
/// nothing.
#[must_use]
pub fn overall_score(checks: &BTreeMap<Dimension, CheckResult>, weights: &DimensionWeights) -> u8 {
    let total: f64 = Dimension::ALL
        .iter()
        .map(|&dimension| {
            let score = checks
                .get(&dimension)
                .map(|check| check.score)
                .filter(|&score| score <= 100)
                .unwrap_or(0);
            f64::from(score) * weights.weight(dimension)
        })
        .sum();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = total.round().clamp(0.0, 100.0) as u8;
    rounded
}
