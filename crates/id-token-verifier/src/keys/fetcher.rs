//! Certificate retrieval from the provider endpoint.
//!
//! The endpoint returns a JSON object mapping key identifiers to PEM-encoded
//! X.509 certificates, e.g.
//!
//! ```text
//! { "a1b2c3": "-----BEGIN CERTIFICATE-----\n...", "d4e5f6": "..." }
//! ```
//!
//! Its `Cache-Control: max-age` tells callers how long the set is current.

use crate::errors::VerifyError;
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Certificates as published by the provider, plus how long they may be cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateSet {
    /// Key identifier to PEM certificate.
    pub certificates: HashMap<String, String>,

    /// Lifetime advertised by the endpoint, if any.
    pub max_age: Option<Duration>,
}

/// Capability for retrieving the provider's current certificates.
#[async_trait]
pub trait CertificateFetcher: Send + Sync {
    /// Fetch the complete certificate set.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::KeyFetch` when the certificates cannot be retrieved.
    async fn fetch_certificates(&self) -> Result<CertificateSet, VerifyError>;
}

/// Fetches certificates over HTTP(S) with a plain GET.
pub struct HttpCertificateFetcher {
    cert_url: String,
    http_client: reqwest::Client,
}

impl HttpCertificateFetcher {
    /// Create a fetcher for `cert_url` with the given request timeout.
    pub fn new(cert_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "idtoken.keys", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            cert_url,
            http_client,
        }
    }

    pub fn cert_url(&self) -> &str {
        &self.cert_url
    }

    async fn fetch(&self) -> Result<CertificateSet, VerifyError> {
        let response = self
            .http_client
            .get(&self.cert_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "idtoken.keys", error = %e, "Failed to fetch certificates");
                VerifyError::key_fetch("certificate endpoint unreachable")
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "idtoken.keys",
                status = %status,
                "Certificate endpoint returned error"
            );
            return Err(VerifyError::key_fetch(format!(
                "certificate endpoint returned status {}",
                status.as_u16()
            )));
        }

        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age);

        let certificates: HashMap<String, String> = response.json().await.map_err(|e| {
            tracing::error!(target: "idtoken.keys", error = %e, "Failed to parse certificate response");
            VerifyError::key_fetch("certificate response is not a kid-to-certificate object")
        })?;

        Ok(CertificateSet {
            certificates,
            max_age,
        })
    }
}

#[async_trait]
impl CertificateFetcher for HttpCertificateFetcher {
    #[instrument(skip(self), fields(url = %self.cert_url))]
    async fn fetch_certificates(&self) -> Result<CertificateSet, VerifyError> {
        tracing::debug!(target: "idtoken.keys", "Fetching provider certificates");

        let start = Instant::now();
        let result = self.fetch().await;
        metrics::record_cert_fetch(result.is_ok(), start.elapsed());

        result
    }
}

/// Extract `max-age` seconds from a `Cache-Control` header value.
pub(crate) fn parse_max_age(header_value: &str) -> Option<Duration> {
    header_value.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value
            .trim()
            .trim_matches('"')
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    })
}
