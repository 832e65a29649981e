//! Per-dimension failure isolation.

use crate::error::DimensionError;
use crate::report::CheckResult;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;
use vigil_core::Dimension;

/// Run one dimension's analysis so that neither an error nor a panic can
/// escape it.
///
/// A failed analysis becomes a non-found result carrying `fallback_score` and
/// the failure message.
pub fn isolate<F>(dimension: Dimension, fallback_score: u8, check: F) -> CheckResult
where
    F: FnOnce() -> Result<CheckResult, DimensionError>,
{
    let error = match panic::catch_unwind(AssertUnwindSafe(check)) {
        Ok(Ok(result)) => return result,
        Ok(Err(e)) => e,
        Err(payload) => DimensionError::Panicked(panic_message(payload.as_ref())),
    };

    warn!(%dimension, error = %error, "check degraded");
    CheckResult::failed(fallback_score, error.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
