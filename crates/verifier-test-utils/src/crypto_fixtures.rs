//! Fixed cryptographic fixtures for testing
//!
//! Two 2048-bit RSA key pairs, each with a self-signed X.509 certificate valid
//! for 100 years, plus an EC certificate for negative tests. Fixtures are
//! static so every test run signs and verifies with the same material.

/// Key identifier for key pair 1.
pub const TEST_KID_1: &str = "test-key-01";

/// Key identifier for key pair 2.
pub const TEST_KID_2: &str = "test-key-02";

/// Issuer base used by test tokens; expected issuer is this plus the project ID.
pub const TEST_ISSUER_BASE: &str = "https://issuer/";

/// PKCS#8 private key for key pair 1.
pub const TEST_PRIVATE_KEY_1_PEM: &str = include_str!("fixtures/signing_key_1.pem");

/// PKCS#8 private key for key pair 2.
pub const TEST_PRIVATE_KEY_2_PEM: &str = include_str!("fixtures/signing_key_2.pem");

/// Certificate carrying the public key of key pair 1.
pub const TEST_CERT_1_PEM: &str = include_str!("fixtures/signing_cert_1.pem");

/// Certificate carrying the public key of key pair 2.
pub const TEST_CERT_2_PEM: &str = include_str!("fixtures/signing_cert_2.pem");

/// Certificate carrying a P-256 key (not acceptable for RS256).
pub const TEST_EC_CERT_PEM: &str = include_str!("fixtures/ec_cert.pem");

/// Certificates for both key pairs, as served by the provider endpoint.
pub fn default_certificates() -> Vec<(&'static str, &'static str)> {
    vec![(TEST_KID_1, TEST_CERT_1_PEM), (TEST_KID_2, TEST_CERT_2_PEM)]
}
