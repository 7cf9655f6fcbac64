//! Signature verification against a resolved provider key.
//!
//! # Security
//!
//! - The header `alg` must equal the required algorithm exactly; `none`,
//!   HMAC, and any other family are rejected before touching the key
//! - Every failure maps to the same `SignatureMismatch` value so callers
//!   cannot learn why a signature was refused

use crate::errors::VerifyError;
use crate::keys::SigningKey;
use crate::token::ParsedToken;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use std::str::FromStr;

/// Algorithm the provider signs ID tokens with.
pub const REQUIRED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verify `token`'s signature with `key` under `required`.
///
/// # Errors
///
/// Returns `VerifyError::SignatureMismatch` if the declared algorithm differs
/// from `required` or the signature does not verify.
pub fn verify(token: &ParsedToken, key: &SigningKey, required: Algorithm) -> Result<(), VerifyError> {
    let declared = &token.header().alg;
    match Algorithm::from_str(declared) {
        Ok(alg) if alg == required => {}
        _ => {
            tracing::debug!(
                target: "idtoken.signature",
                declared = %declared,
                required = ?required,
                "Token algorithm does not match required algorithm"
            );
            return Err(VerifyError::SignatureMismatch);
        }
    }

    let signature_b64 = URL_SAFE_NO_PAD.encode(token.signature());
    match jsonwebtoken::crypto::verify(
        &signature_b64,
        token.signing_input(),
        key.decoding_key(),
        required,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::debug!(target: "idtoken.signature", kid = %key.kid(), "Signature verification failed");
            Err(VerifyError::SignatureMismatch)
        }
        Err(e) => {
            tracing::debug!(target: "idtoken.signature", kid = %key.kid(), error = %e, "Signature verification errored");
            Err(VerifyError::SignatureMismatch)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use verifier_test_utils::{
        tamper_signature, with_header, TestTokenBuilder, TEST_CERT_1_PEM, TEST_CERT_2_PEM,
        TEST_KID_1,
    };

    fn key_1() -> SigningKey {
        SigningKey::from_certificate_pem(TEST_KID_1, TEST_CERT_1_PEM).unwrap()
    }

    fn signed_token() -> String {
        TestTokenBuilder::new("proj-x").sign_with_key_1()
    }

    #[test]
    fn test_valid_signature() {
        let token = ParsedToken::parse(&signed_token()).unwrap();
        assert_eq!(verify(&token, &key_1(), REQUIRED_ALGORITHM), Ok(()));
    }

    #[test]
    fn test_wrong_key_is_mismatch() {
        let token = ParsedToken::parse(&signed_token()).unwrap();
        let other = SigningKey::from_certificate_pem(TEST_KID_1, TEST_CERT_2_PEM).unwrap();

        assert_eq!(
            verify(&token, &other, REQUIRED_ALGORITHM),
            Err(VerifyError::SignatureMismatch)
        );
    }

    #[test]
    fn test_tampered_signature_is_mismatch() {
        let token = ParsedToken::parse(&tamper_signature(&signed_token())).unwrap();
        assert_eq!(
            verify(&token, &key_1(), REQUIRED_ALGORITHM),
            Err(VerifyError::SignatureMismatch)
        );
    }

    #[test]
    fn test_algorithm_confusion_is_rejected() {
        for alg in ["HS256", "none", "ES256", "RS512", "rs256", ""] {
            let raw = with_header(
                &signed_token(),
                &serde_json::json!({"alg": alg, "kid": TEST_KID_1, "typ": "JWT"}),
            );
            let token = ParsedToken::parse(&raw).unwrap();
            assert_eq!(
                verify(&token, &key_1(), REQUIRED_ALGORITHM),
                Err(VerifyError::SignatureMismatch),
                "alg {alg:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_modified_payload_is_mismatch() {
        let raw = signed_token();
        let (header_b64, rest) = raw.split_once('.').unwrap();
        let (_, signature_b64) = rest.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"admin","aud":"proj-x"}"#);
        let forged = format!("{header_b64}.{forged_payload}.{signature_b64}");
        let token = ParsedToken::parse(&forged).unwrap();

        assert_eq!(
            verify(&token, &key_1(), REQUIRED_ALGORITHM),
            Err(VerifyError::SignatureMismatch)
        );
    }
}
