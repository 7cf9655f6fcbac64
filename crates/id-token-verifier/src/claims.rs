//! Claim validation for provider ID tokens.
//!
//! Checks run in a fixed order and the first failure is returned:
//!
//! 1. `exp` + skew must not be before `now`
//! 2. `nbf`, when present, must not be after `now` (no leeway)
//! 3. `aud` must equal the project ID
//! 4. `iss` must equal the issuer base followed by the project ID
//! 5. `sub` must be non-empty and at most 128 bytes of UTF-8
//! 6. `iat` must be present and not later than `now` + skew
//!
//! All checks are pure functions of the claims and `now`.

use crate::errors::VerifyError;
use crate::token::IdTokenClaims;
use std::time::Duration;

/// Default expiry leeway (5 minutes).
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(300);

/// Longest accepted subject, in UTF-8 bytes.
pub const MAX_SUBJECT_LENGTH: usize = 128;

/// Validates claims against one project's expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsValidator {
    expected_audience: String,
    expected_issuer: String,
    expiry_skew_secs: i64,
}

impl ClaimsValidator {
    /// Create a validator for `project_id` tokens issued under `issuer_base`.
    ///
    /// `issuer_base` is normalised to end with `/`, so both
    /// `https://securetoken.google.com` and `https://securetoken.google.com/`
    /// produce `https://securetoken.google.com/<project_id>`.
    pub fn new(project_id: &str, issuer_base: &str, expiry_skew: Duration) -> Self {
        Self {
            expected_audience: project_id.to_string(),
            expected_issuer: expected_issuer(issuer_base, project_id),
            expiry_skew_secs: i64::try_from(expiry_skew.as_secs()).unwrap_or(i64::MAX),
        }
    }

    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Run every check against `claims` at time `now` (Unix epoch seconds).
    ///
    /// # Errors
    ///
    /// Returns the error for the first check that fails.
    pub fn validate(&self, claims: &IdTokenClaims, now: i64) -> Result<(), VerifyError> {
        validate_expiry(claims.exp, now, self.expiry_skew_secs)?;
        validate_not_before(claims.nbf, now)?;
        validate_audience(claims.aud.as_deref(), &self.expected_audience)?;
        validate_issuer(claims.iss.as_deref(), &self.expected_issuer)?;
        validate_subject(claims.sub.as_deref())?;
        validate_issued_at(claims.iat, now, self.expiry_skew_secs)?;
        Ok(())
    }
}

/// Build the issuer string tokens for `project_id` must carry.
pub fn expected_issuer(issuer_base: &str, project_id: &str) -> String {
    if issuer_base.ends_with('/') {
        format!("{issuer_base}{project_id}")
    } else {
        format!("{issuer_base}/{project_id}")
    }
}

fn validate_expiry(exp: Option<i64>, now: i64, skew_secs: i64) -> Result<(), VerifyError> {
    match exp {
        Some(exp) if exp.saturating_add(skew_secs) >= now => Ok(()),
        _ => {
            tracing::debug!(
                target: "idtoken.claims",
                exp = ?exp,
                now = now,
                skew_secs = skew_secs,
                "Token rejected: expired"
            );
            Err(VerifyError::ExpiredToken {
                expired_at: exp,
                now,
            })
        }
    }
}

fn validate_not_before(nbf: Option<i64>, now: i64) -> Result<(), VerifyError> {
    match nbf {
        Some(not_before) if not_before > now => {
            tracing::debug!(
                target: "idtoken.claims",
                nbf = not_before,
                now = now,
                "Token rejected: not yet valid"
            );
            Err(VerifyError::NotYetValid { not_before, now })
        }
        _ => Ok(()),
    }
}

fn validate_audience(aud: Option<&str>, expected: &str) -> Result<(), VerifyError> {
    if aud == Some(expected) {
        return Ok(());
    }
    tracing::debug!(target: "idtoken.claims", aud = ?aud, expected = %expected, "Token rejected: audience mismatch");
    Err(VerifyError::AudienceMismatch {
        expected: expected.to_string(),
        actual: aud.map(ToString::to_string),
    })
}

fn validate_issuer(iss: Option<&str>, expected: &str) -> Result<(), VerifyError> {
    if iss == Some(expected) {
        return Ok(());
    }
    tracing::debug!(target: "idtoken.claims", iss = ?iss, expected = %expected, "Token rejected: issuer mismatch");
    Err(VerifyError::IssuerMismatch {
        expected: expected.to_string(),
        actual: iss.map(ToString::to_string),
    })
}

fn validate_subject(sub: Option<&str>) -> Result<(), VerifyError> {
    let length = sub.map(str::len);
    match length {
        Some(len) if len > 0 && len <= MAX_SUBJECT_LENGTH => Ok(()),
        _ => {
            tracing::debug!(target: "idtoken.claims", length = ?length, "Token rejected: invalid subject");
            Err(VerifyError::InvalidSubject { length })
        }
    }
}

fn validate_issued_at(iat: Option<i64>, now: i64, skew_secs: i64) -> Result<(), VerifyError> {
    match iat {
        Some(iat) if iat <= now.saturating_add(skew_secs) => Ok(()),
        _ => {
            tracing::debug!(
                target: "idtoken.claims",
                iat = ?iat,
                now = now,
                skew_secs = skew_secs,
                "Token rejected: issued-at missing or in the future"
            );
            Err(VerifyError::InvalidIssuedAt { issued_at: iat, now })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn validator() -> ClaimsValidator {
        ClaimsValidator::new("proj-x", "https://issuer/", DEFAULT_EXPIRY_SKEW)
    }

    fn valid_claims() -> IdTokenClaims {
        IdTokenClaims {
            iss: Some("https://issuer/proj-x".to_string()),
            aud: Some("proj-x".to_string()),
            sub: Some("user-42".to_string()),
            exp: Some(NOW + 3600),
            iat: Some(NOW - 10),
            ..IdTokenClaims::default()
        }
    }

    #[test]
    fn test_valid_claims_pass() {
        assert_eq!(validator().validate(&valid_claims(), NOW), Ok(()));
    }

    #[test]
    fn test_expected_issuer_normalises_trailing_slash() {
        assert_eq!(expected_issuer("https://issuer", "p"), "https://issuer/p");
        assert_eq!(expected_issuer("https://issuer/", "p"), "https://issuer/p");
        assert_eq!(validator().expected_issuer(), "https://issuer/proj-x");
        assert_eq!(validator().expected_audience(), "proj-x");
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    #[test]
    fn test_expiry_within_skew_passes() {
        let claims = IdTokenClaims {
            exp: Some(NOW - 299),
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));
    }

    #[test]
    fn test_expiry_exactly_at_skew_boundary_passes() {
        let claims = IdTokenClaims {
            exp: Some(NOW - 300),
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));
    }

    #[test]
    fn test_expiry_past_skew_fails() {
        let claims = IdTokenClaims {
            exp: Some(NOW - 301),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::ExpiredToken {
                expired_at: Some(NOW - 301),
                now: NOW
            })
        );
    }

    #[test]
    fn test_missing_expiry_fails_as_expired() {
        let claims = IdTokenClaims {
            exp: None,
            ..valid_claims()
        };
        assert!(matches!(
            validator().validate(&claims, NOW),
            Err(VerifyError::ExpiredToken {
                expired_at: None,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_skew_is_strict() {
        let strict = ClaimsValidator::new("proj-x", "https://issuer/", Duration::ZERO);
        let claims = IdTokenClaims {
            exp: Some(NOW - 1),
            ..valid_claims()
        };
        assert!(matches!(
            strict.validate(&claims, NOW),
            Err(VerifyError::ExpiredToken { .. })
        ));
    }

    #[test]
    fn test_extreme_expiry_does_not_overflow() {
        let claims = IdTokenClaims {
            exp: Some(i64::MAX),
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));
    }

    // =========================================================================
    // Not-before
    // =========================================================================

    #[test]
    fn test_not_before_in_future_fails_without_leeway() {
        let claims = IdTokenClaims {
            nbf: Some(NOW + 1),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::NotYetValid {
                not_before: NOW + 1,
                now: NOW
            })
        );
    }

    #[test]
    fn test_not_before_now_or_past_passes() {
        for nbf in [NOW, NOW - 1, NOW - 86_400] {
            let claims = IdTokenClaims {
                nbf: Some(nbf),
                ..valid_claims()
            };
            assert_eq!(validator().validate(&claims, NOW), Ok(()), "nbf {nbf}");
        }
    }

    #[test]
    fn test_not_before_is_optional() {
        let claims = IdTokenClaims {
            nbf: None,
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));
    }

    // =========================================================================
    // Audience and issuer
    // =========================================================================

    #[test]
    fn test_audience_mismatch() {
        let claims = IdTokenClaims {
            aud: Some("proj-y".to_string()),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::AudienceMismatch {
                expected: "proj-x".to_string(),
                actual: Some("proj-y".to_string()),
            })
        );
    }

    #[test]
    fn test_missing_audience() {
        let claims = IdTokenClaims {
            aud: None,
            ..valid_claims()
        };
        assert!(matches!(
            validator().validate(&claims, NOW),
            Err(VerifyError::AudienceMismatch { actual: None, .. })
        ));
    }

    #[test]
    fn test_issuer_mismatch() {
        let claims = IdTokenClaims {
            iss: Some("https://issuer/proj-y".to_string()),
            ..valid_claims()
        };
        assert!(matches!(
            validator().validate(&claims, NOW),
            Err(VerifyError::IssuerMismatch { .. })
        ));
    }

    #[test]
    fn test_issuer_must_match_exactly() {
        for iss in [
            "https://issuer/proj-x/",
            "http://issuer/proj-x",
            "https://issuer/PROJ-X",
            "",
        ] {
            let claims = IdTokenClaims {
                iss: Some(iss.to_string()),
                ..valid_claims()
            };
            assert!(
                matches!(
                    validator().validate(&claims, NOW),
                    Err(VerifyError::IssuerMismatch { .. })
                ),
                "issuer {iss:?} must be rejected"
            );
        }
    }

    // =========================================================================
    // Subject
    // =========================================================================

    #[test]
    fn test_empty_subject() {
        let claims = IdTokenClaims {
            sub: Some(String::new()),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::InvalidSubject { length: Some(0) })
        );
    }

    #[test]
    fn test_missing_subject() {
        let claims = IdTokenClaims {
            sub: None,
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::InvalidSubject { length: None })
        );
    }

    #[test]
    fn test_subject_length_boundary() {
        let claims = IdTokenClaims {
            sub: Some("u".repeat(MAX_SUBJECT_LENGTH)),
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));

        let claims = IdTokenClaims {
            sub: Some("u".repeat(MAX_SUBJECT_LENGTH + 1)),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::InvalidSubject { length: Some(129) })
        );
    }

    #[test]
    fn test_subject_length_counts_bytes() {
        // 128 two-byte characters: 256 bytes
        let claims = IdTokenClaims {
            sub: Some("é".repeat(MAX_SUBJECT_LENGTH)),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::InvalidSubject { length: Some(256) })
        );

        // 64 two-byte characters: exactly 128 bytes
        let claims = IdTokenClaims {
            sub: Some("é".repeat(MAX_SUBJECT_LENGTH / 2)),
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));

        // 127 ASCII bytes plus one two-byte character: 129 bytes
        let claims = IdTokenClaims {
            sub: Some(format!("{}é", "u".repeat(MAX_SUBJECT_LENGTH - 1))),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::InvalidSubject { length: Some(129) })
        );
    }

    #[test]
    fn test_subject_character_set_is_not_restricted() {
        let claims = IdTokenClaims {
            sub: Some(" user/42 \u{1F600}".to_string()),
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));
    }

    // =========================================================================
    // Issued-at
    // =========================================================================

    #[test]
    fn test_issued_at_within_skew_passes() {
        let claims = IdTokenClaims {
            iat: Some(NOW + 300),
            ..valid_claims()
        };
        assert_eq!(validator().validate(&claims, NOW), Ok(()));
    }

    #[test]
    fn test_issued_at_in_future_fails() {
        let claims = IdTokenClaims {
            iat: Some(NOW + 301),
            ..valid_claims()
        };
        assert_eq!(
            validator().validate(&claims, NOW),
            Err(VerifyError::InvalidIssuedAt {
                issued_at: Some(NOW + 301),
                now: NOW
            })
        );
    }

    #[test]
    fn test_missing_issued_at_fails() {
        let claims = IdTokenClaims {
            iat: None,
            ..valid_claims()
        };
        assert!(matches!(
            validator().validate(&claims, NOW),
            Err(VerifyError::InvalidIssuedAt {
                issued_at: None,
                ..
            })
        ));
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn test_checks_run_in_order() {
        let everything_wrong = IdTokenClaims {
            iss: Some("https://other/".to_string()),
            aud: Some("other".to_string()),
            sub: None,
            exp: Some(NOW - 10_000),
            iat: None,
            ..IdTokenClaims::default()
        };
        assert!(matches!(
            validator().validate(&everything_wrong, NOW),
            Err(VerifyError::ExpiredToken { .. })
        ));

        let not_expired = IdTokenClaims {
            exp: Some(NOW + 60),
            ..everything_wrong.clone()
        };
        assert!(matches!(
            validator().validate(&not_expired, NOW),
            Err(VerifyError::AudienceMismatch { .. })
        ));

        let not_yet_valid = IdTokenClaims {
            nbf: Some(NOW + 60),
            ..not_expired.clone()
        };
        assert!(matches!(
            validator().validate(&not_yet_valid, NOW),
            Err(VerifyError::NotYetValid { .. })
        ));

        let right_audience = IdTokenClaims {
            aud: Some("proj-x".to_string()),
            ..not_expired
        };
        assert!(matches!(
            validator().validate(&right_audience, NOW),
            Err(VerifyError::IssuerMismatch { .. })
        ));
    }
}
