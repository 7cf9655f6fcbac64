//! Builder patterns for test token construction
//!
//! Provides a fluent API for signed RS256 test tokens and helpers that
//! corrupt tokens in controlled ways.

use crate::crypto_fixtures::{
    TEST_ISSUER_BASE, TEST_KID_1, TEST_KID_2, TEST_PRIVATE_KEY_1_PEM, TEST_PRIVATE_KEY_2_PEM,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for signed test ID tokens
///
/// Defaults to a token a verifier for `project_id` accepts: issuer
/// `https://issuer/<project_id>`, audience `project_id`, subject
/// `test-user`, issued now, expiring in one hour.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new("proj-x")
///     .for_subject("user-42")
///     .expires_in(3600)
///     .sign_with_key_1();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    kid: Option<String>,
    include_kid: bool,
}

impl TestTokenBuilder {
    /// Create a builder with valid defaults for `project_id`
    pub fn new(project_id: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert(
            "iss".to_string(),
            json!(format!("{TEST_ISSUER_BASE}{project_id}")),
        );
        claims.insert("aud".to_string(), json!(project_id));
        claims.insert("sub".to_string(), json!("test-user"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("auth_time".to_string(), json!(now.timestamp()));

        Self {
            claims,
            kid: None,
            include_kid: true,
        }
    }

    /// Set the subject (uid)
    pub fn for_subject(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set expiration in seconds from now
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set the expiration timestamp
    pub fn expires_at(self, timestamp: i64) -> Self {
        self.with_claim("exp", json!(timestamp))
    }

    /// Set the issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    /// Set any claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Override the header `kid` (defaults to the signing key's kid)
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self.include_kid = true;
        self
    }

    /// Omit `kid` from the header
    pub fn without_kid(mut self) -> Self {
        self.include_kid = false;
        self
    }

    /// The claims as a JSON value
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign with key pair 1
    pub fn sign_with_key_1(self) -> String {
        self.sign(TEST_KID_1, TEST_PRIVATE_KEY_1_PEM)
    }

    /// Sign with key pair 2
    pub fn sign_with_key_2(self) -> String {
        self.sign(TEST_KID_2, TEST_PRIVATE_KEY_2_PEM)
    }

    fn sign(self, default_kid: &str, private_key_pem: &str) -> String {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .expect("Test private key should be valid RSA PEM");

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = if self.include_kid {
            Some(self.kid.unwrap_or_else(|| default_kid.to_string()))
        } else {
            None
        };

        encode(&header, &Value::Object(self.claims), &encoding_key)
            .expect("Failed to sign test token")
    }
}

/// Flip one bit in the decoded signature and re-encode the token
pub fn tamper_signature(token: &str) -> String {
    let (signing_input, signature_b64) = token
        .rsplit_once('.')
        .expect("Token should have a signature segment");
    let mut signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .expect("Signature should be base64url");
    if let Some(byte) = signature.first_mut() {
        *byte ^= 0x01;
    }
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(&signature))
}

/// Replace the header segment, keeping payload and signature
pub fn with_header(token: &str, header: &Value) -> String {
    let (_, rest) = token
        .split_once('.')
        .expect("Token should have a header segment");
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string().as_bytes());
    format!("{}.{}", header_b64, rest)
}

/// Decode the payload segment as JSON
pub fn decode_payload(token: &str) -> Value {
    let payload_b64 = token.split('.').nth(1).expect("Token should have a payload");
    let bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .expect("Payload should be base64url");
    serde_json::from_slice(&bytes).expect("Payload should be JSON")
}

/// Decode the header segment as JSON
pub fn decode_header(token: &str) -> Value {
    let header_b64 = token.split('.').next().expect("Token should have a header");
    let bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .expect("Header should be base64url");
    serde_json::from_slice(&bytes).expect("Header should be JSON")
}
