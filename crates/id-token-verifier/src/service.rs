//! ID token verification service.
//!
//! Runs the verification pipeline for one raw token:
//!
//! ```text
//! Parsing -> KeyResolution -> SignatureCheck -> ClaimsCheck -> Verified
//!    \____________\________________\_______________\______-> Rejected
//! ```
//!
//! Any failure rejects the token immediately; nothing is retried. Claims are
//! never looked at unless the signature verified.

use crate::claims::ClaimsValidator;
use crate::config::{Config, ConfigError};
use crate::errors::VerifyError;
use crate::keys::{CertificateFetcher, HttpCertificateFetcher, KeySource};
use crate::observability::metrics;
use crate::signature::{self, REQUIRED_ALGORITHM};
use crate::token::{IdTokenClaims, ParsedToken};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// A token that passed every check.
///
/// Only [`TokenVerificationService`] constructs these, and only after the
/// signature and every claim have been validated.
#[derive(Clone, Serialize, PartialEq)]
pub struct VerifiedToken {
    subject: String,
    issuer: String,
    audience: String,
    expiry: i64,
    issued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    claims: Map<String, Value>,
}

impl fmt::Debug for VerifiedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedToken")
            .field("subject", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry", &self.expiry)
            .field("issued_at", &self.issued_at)
            .field("auth_time", &self.auth_time)
            .finish_non_exhaustive()
    }
}

impl VerifiedToken {
    /// Build from claims the validator has accepted.
    ///
    /// Returns `None` if a claim the validator requires is absent, which a
    /// validated claim set never has.
    fn from_validated(claims: IdTokenClaims) -> Option<Self> {
        Some(Self {
            subject: claims.sub?,
            issuer: claims.iss?,
            audience: claims.aud?,
            expiry: claims.exp?,
            issued_at: claims.iat?,
            auth_time: claims.auth_time,
            email: claims.email,
            email_verified: claims.email_verified,
            claims: claims.extra,
        })
    }

    /// The user's uid.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Expiration timestamp (Unix epoch seconds).
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    /// Issued-at timestamp (Unix epoch seconds).
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Time the user authenticated, when the provider includes it.
    pub fn auth_time(&self) -> Option<i64> {
        self.auth_time
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn email_verified(&self) -> Option<bool> {
        self.email_verified
    }

    /// A claim outside the registered set (e.g. a custom claim).
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// All claims outside the registered set.
    pub fn custom_claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Verifies provider ID tokens for a single project.
///
/// Cheap to share: wrap in an `Arc` and call [`verify`](Self::verify) from
/// any number of tasks. The key cache is the only shared state.
pub struct TokenVerificationService {
    key_source: Arc<KeySource>,
    validator: ClaimsValidator,
}

impl TokenVerificationService {
    /// Create a service that fetches certificates over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails [`Config::validate`].
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let fetcher = HttpCertificateFetcher::new(config.cert_url.clone(), config.http_timeout);
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a service with a custom certificate source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails [`Config::validate`].
    pub fn with_fetcher(
        config: &Config,
        fetcher: Arc<dyn CertificateFetcher>,
    ) -> Result<Self, ConfigError> {
        let key_source = KeySource::with_ttl(fetcher, config.cert_cache_ttl)
            .with_min_refresh_interval(config.min_refresh_interval);
        Self::with_key_source(config, Arc::new(key_source))
    }

    /// Create a service sharing an existing key cache.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails [`Config::validate`].
    pub fn with_key_source(
        config: &Config,
        key_source: Arc<KeySource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            key_source,
            validator: ClaimsValidator::new(
                &config.project_id,
                &config.issuer_base,
                config.clock_skew,
            ),
        })
    }

    pub fn key_source(&self) -> &Arc<KeySource> {
        &self.key_source
    }

    pub fn project_id(&self) -> &str {
        self.validator.expected_audience()
    }

    /// Verify `token` against the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns the `VerifyError` of the first stage that rejects the token.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        self.verify_at(token, chrono::Utc::now().timestamp()).await
    }

    /// Verify `token` as of `now` (Unix epoch seconds).
    ///
    /// Prefer [`verify`](Self::verify) in production code; this variant lets
    /// time-dependent behaviour be tested without wall-clock dependence.
    ///
    /// # Errors
    ///
    /// Returns the `VerifyError` of the first stage that rejects the token.
    #[instrument(skip_all, fields(project_id = %self.project_id()))]
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedToken, VerifyError> {
        let start = Instant::now();
        let result = self.run_pipeline(token, now).await;
        metrics::record_verification(result.as_ref().map(|_| ()), start.elapsed());

        match &result {
            Ok(_) => {
                tracing::debug!(target: "idtoken.service", "Token verified successfully");
            }
            Err(e) => {
                tracing::debug!(
                    target: "idtoken.service",
                    stage = %e.stage(),
                    error_type = e.error_type(),
                    error = %e,
                    "Token rejected"
                );
            }
        }

        result
    }

    async fn run_pipeline(&self, token: &str, now: i64) -> Result<VerifiedToken, VerifyError> {
        // Parsing
        let parsed = ParsedToken::parse(token)?;

        // KeyResolution
        let kid = parsed.header().key_id().ok_or(VerifyError::MissingKeyId)?;
        let key = self.key_source.resolve(kid).await?;

        // SignatureCheck
        signature::verify(&parsed, &key, REQUIRED_ALGORITHM)?;

        // ClaimsCheck
        self.validator.validate(parsed.claims(), now)?;

        // Verified
        VerifiedToken::from_validated(parsed.into_claims()).ok_or_else(|| {
            tracing::error!(target: "idtoken.service", "Validated claims missing a required field");
            VerifyError::malformed("validated claims missing a required field")
        })
    }
}
