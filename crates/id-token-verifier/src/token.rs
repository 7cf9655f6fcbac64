//! Raw and parsed ID token representations.
//!
//! Parsing only decodes structure. Nothing here is trusted until the signature
//! has been checked against a provider key and the claims have been validated.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding
//! - Exactly three non-empty base64url segments are required
//! - Claims with an unexpected JSON type make the whole token malformed

use crate::errors::VerifyError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Maximum accepted token size in bytes (8KB).
///
/// Provider ID tokens are around 1KB; anything larger is rejected before
/// base64 decoding or JSON parsing allocates for it.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Token header.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    /// Declared signing algorithm.
    pub alg: String,

    /// Key identifier naming the provider certificate that signed the token.
    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub typ: Option<String>,
}

impl TokenHeader {
    /// The key identifier, if present and non-empty.
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref().filter(|kid| !kid.is_empty())
    }
}

/// Claims carried in the token payload.
///
/// Registered claims are optional at this layer; the claims validator decides
/// what a missing value means.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Subject (the user's uid) - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Time the user authenticated (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// Every other claim, including provider-specific and custom claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for IdTokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdTokenClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("auth_time", &self.auth_time)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("email_verified", &self.email_verified)
            .field("extra_claims", &self.extra.len())
            .finish()
    }
}

/// Structured view of a raw token.
///
/// Owned by a single verification call and never shared.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    header: TokenHeader,
    claims: IdTokenClaims,
    signing_input: String,
    signature: Vec<u8>,
}

impl ParsedToken {
    /// Decode a raw token string.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::MalformedToken` when the token is oversized, does
    /// not have three segments, or a segment fails base64url/JSON decoding.
    pub fn parse(raw: &str) -> Result<Self, VerifyError> {
        if raw.len() > MAX_TOKEN_SIZE_BYTES {
            tracing::debug!(
                target: "idtoken.token",
                token_size = raw.len(),
                max_size = MAX_TOKEN_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(VerifyError::malformed("token exceeds maximum size"));
        }

        let mut segments = raw.split('.');
        let (header_b64, payload_b64, signature_b64) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => {
                    tracing::debug!(target: "idtoken.token", "Token rejected: not three segments");
                    return Err(VerifyError::malformed("token must have three segments"));
                }
            };

        if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
            return Err(VerifyError::malformed("token has an empty segment"));
        }

        let header_bytes = decode_segment(header_b64, "header")?;
        let header: TokenHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
            tracing::debug!(target: "idtoken.token", error = %e, "Failed to parse token header JSON");
            VerifyError::malformed("header is not a valid JSON object")
        })?;

        let payload_bytes = decode_segment(payload_b64, "payload")?;
        let claims: IdTokenClaims = serde_json::from_slice(&payload_bytes).map_err(|e| {
            tracing::debug!(target: "idtoken.token", error = %e, "Failed to parse token payload JSON");
            VerifyError::malformed("payload is not a valid claims object")
        })?;

        let signature = decode_segment(signature_b64, "signature")?;

        Ok(Self {
            header,
            claims,
            signing_input: format!("{header_b64}.{payload_b64}"),
            signature,
        })
    }

    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    /// The exact bytes the signature covers: `base64(header) "." base64(payload)`.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Consume the token, keeping only its claims.
    pub fn into_claims(self) -> IdTokenClaims {
        self.claims
    }
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, VerifyError> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "idtoken.token", segment = name, error = %e, "Failed to decode token segment");
        VerifyError::malformed(format!("{name} is not valid base64url"))
    })
}
