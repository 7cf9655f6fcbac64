//! Signing keys decoded from provider X.509 certificates.

use crate::errors::VerifyError;
use jsonwebtoken::DecodingKey;
use std::fmt;
use x509_parser::parse_x509_certificate;
use x509_parser::public_key::PublicKey;

/// A provider public key, identified by its `kid`.
///
/// Shared read-only across concurrent verifications.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    decoding_key: DecodingKey,
    not_before: i64,
    not_after: i64,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Decode a PEM-encoded X.509 certificate carrying an RSA public key.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::KeyFetch` if the PEM or certificate cannot be
    /// decoded, or the subject public key is not RSA.
    pub fn from_certificate_pem(kid: &str, pem_data: &str) -> Result<Self, VerifyError> {
        let pem_obj = ::pem::parse(pem_data.as_bytes()).map_err(|e| {
            tracing::warn!(target: "idtoken.keys", kid = %kid, error = %e, "Certificate is not valid PEM");
            VerifyError::key_fetch(format!("certificate for kid '{kid}' is not valid PEM"))
        })?;

        if pem_obj.tag() != "CERTIFICATE" {
            tracing::warn!(target: "idtoken.keys", kid = %kid, tag = %pem_obj.tag(), "Unexpected PEM block");
            return Err(VerifyError::key_fetch(format!(
                "PEM block for kid '{kid}' is not a certificate"
            )));
        }

        let (_, cert) = parse_x509_certificate(pem_obj.contents()).map_err(|e| {
            tracing::warn!(target: "idtoken.keys", kid = %kid, error = %e, "Failed to parse X.509 certificate");
            VerifyError::key_fetch(format!("certificate for kid '{kid}' is not valid X.509"))
        })?;

        let spki = cert.public_key();
        if !matches!(spki.parsed(), Ok(PublicKey::RSA(_))) {
            tracing::warn!(target: "idtoken.keys", kid = %kid, "Certificate does not carry an RSA key");
            return Err(VerifyError::key_fetch(format!(
                "certificate for kid '{kid}' does not carry an RSA key"
            )));
        }

        // The SPKI bit string of an RSA key is the PKCS#1 RSAPublicKey DER.
        let decoding_key = DecodingKey::from_rsa_der(&spki.subject_public_key.data);

        Ok(Self {
            kid: kid.to_string(),
            decoding_key,
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Certificate `notBefore` (Unix epoch seconds).
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// Certificate `notAfter` (Unix epoch seconds).
    pub fn not_after(&self) -> i64 {
        self.not_after
    }
}
