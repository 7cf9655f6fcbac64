//! Metrics definitions for ID token verification.
//!
//! All metrics follow Prometheus naming conventions:
//! - `idtoken_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: 2 values (success, error)
//! - `error_type`: bounded by `VerifyError` variants plus "none"
//! - `stage`: 4 values (parsing, key_resolution, signature_check, claims_check) plus "none"

use crate::errors::VerifyError;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the outcome of one verification call.
///
/// Metric: `idtoken_verifications_total`, `idtoken_verification_duration_seconds`
/// Labels: `status`, `error_type`, `stage`
pub fn record_verification(result: Result<(), &VerifyError>, duration: Duration) {
    let (status, error_type, stage) = match result {
        Ok(()) => ("success", "none", "none"),
        Err(e) => ("error", e.error_type(), e.stage().as_str()),
    };

    histogram!("idtoken_verification_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("idtoken_verifications_total",
        "status" => status,
        "error_type" => error_type,
        "stage" => stage
    )
    .increment(1);
}

/// Record a certificate fetch.
///
/// Metric: `idtoken_cert_fetches_total`, `idtoken_cert_fetch_duration_seconds`
/// Labels: `status`
pub fn record_cert_fetch(success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("idtoken_cert_fetch_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("idtoken_cert_fetches_total",
        "status" => status
    )
    .increment(1);
}

/// Set the number of signing keys in the installed key set.
///
/// Metric: `idtoken_signing_keys`
pub fn set_signing_key_count(count: usize) {
    #[allow(clippy::cast_precision_loss)] // key sets hold a handful of keys
    gauge!("idtoken_signing_keys").set(count as f64);
}
