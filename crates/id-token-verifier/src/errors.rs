//! Verification error types.
//!
//! Every rejection is a distinct, named kind so operators can tell an expired
//! token from a misconfigured project. The `Display` output carries that detail
//! and is meant for server-side logs only. Anything returned to a client should
//! go through [`VerifyError::public_message`], which never varies by kind.

use std::fmt;
use thiserror::Error;

/// Generic message for the network-facing boundary.
pub const PUBLIC_ERROR_MESSAGE: &str = "The ID token is invalid or expired";

/// Stage of the verification pipeline that rejected a token.
///
/// A token moves `Parsing -> KeyResolution -> SignatureCheck -> ClaimsCheck`
/// and is either verified at the end or rejected at the first failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Parsing,
    KeyResolution,
    SignatureCheck,
    ClaimsCheck,
}

impl VerificationStage {
    /// Bounded label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStage::Parsing => "parsing",
            VerificationStage::KeyResolution => "key_resolution",
            VerificationStage::SignatureCheck => "signature_check",
            VerificationStage::ClaimsCheck => "claims_check",
        }
    }
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by ID token verification.
///
/// All variants are terminal: a rejected token is never retried internally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Token is not a three-segment signed token, or a segment does not decode.
    #[error("Malformed token: {reason}")]
    MalformedToken { reason: String },

    /// Token header has no (or an empty) `kid`.
    #[error("Token header has no key identifier")]
    MissingKeyId,

    /// Certificate endpoint was unreachable or returned unusable data.
    #[error("Failed to fetch signing certificates: {reason}")]
    KeyFetch { reason: String },

    /// `kid` not present even after refreshing the key set.
    #[error("No signing key found for kid '{kid}'")]
    UnknownKey { kid: String },

    /// Signature did not verify. Deliberately carries no detail.
    #[error("Token signature does not match")]
    SignatureMismatch,

    /// `exp` (plus clock skew) is in the past, or `exp` is absent.
    #[error("Token expired at {expired_at:?} (now {now})")]
    ExpiredToken { expired_at: Option<i64>, now: i64 },

    /// `nbf` is later than `now`.
    #[error("Token not valid before {not_before} (now {now})")]
    NotYetValid { not_before: i64, now: i64 },

    /// `aud` is absent or not the expected project.
    #[error("Token audience {actual:?} does not match expected '{expected}'")]
    AudienceMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// `iss` is absent or not the expected issuer.
    #[error("Token issuer {actual:?} does not match expected '{expected}'")]
    IssuerMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// `sub` is absent, empty, or longer than 128 bytes.
    ///
    /// Only the length is carried; subject values stay out of logs.
    #[error("Token subject is invalid (length {length:?})")]
    InvalidSubject { length: Option<usize> },

    /// `iat` is absent or too far in the future.
    #[error("Token issued-at {issued_at:?} is invalid (now {now})")]
    InvalidIssuedAt { issued_at: Option<i64>, now: i64 },
}

impl VerifyError {
    /// Message safe to return to clients.
    pub fn public_message(&self) -> &'static str {
        PUBLIC_ERROR_MESSAGE
    }

    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            VerifyError::MalformedToken { .. } => "malformed_token",
            VerifyError::MissingKeyId => "missing_key_id",
            VerifyError::KeyFetch { .. } => "key_fetch",
            VerifyError::UnknownKey { .. } => "unknown_key",
            VerifyError::SignatureMismatch => "signature_mismatch",
            VerifyError::ExpiredToken { .. } => "expired_token",
            VerifyError::NotYetValid { .. } => "not_yet_valid",
            VerifyError::AudienceMismatch { .. } => "audience_mismatch",
            VerifyError::IssuerMismatch { .. } => "issuer_mismatch",
            VerifyError::InvalidSubject { .. } => "invalid_subject",
            VerifyError::InvalidIssuedAt { .. } => "invalid_issued_at",
        }
    }

    /// Pipeline stage that produces this kind of error.
    pub fn stage(&self) -> VerificationStage {
        match self {
            VerifyError::MalformedToken { .. } => VerificationStage::Parsing,
            VerifyError::MissingKeyId
            | VerifyError::KeyFetch { .. }
            | VerifyError::UnknownKey { .. } => VerificationStage::KeyResolution,
            VerifyError::SignatureMismatch => VerificationStage::SignatureCheck,
            VerifyError::ExpiredToken { .. }
            | VerifyError::NotYetValid { .. }
            | VerifyError::AudienceMismatch { .. }
            | VerifyError::IssuerMismatch { .. }
            | VerifyError::InvalidSubject { .. }
            | VerifyError::InvalidIssuedAt { .. } => VerificationStage::ClaimsCheck,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        VerifyError::MalformedToken {
            reason: reason.into(),
        }
    }

    pub(crate) fn key_fetch(reason: impl Into<String>) -> Self {
        VerifyError::KeyFetch {
            reason: reason.into(),
        }
    }
}
