//! Verifier configuration.
//!
//! Built in code with [`Config::new`] and the `with_*` builders, or loaded
//! from environment variables with [`Config::from_env`].

use crate::claims::DEFAULT_EXPIRY_SKEW;
use crate::keys::{DEFAULT_CACHE_TTL, DEFAULT_MIN_REFRESH_INTERVAL, MAX_CACHE_TTL};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Public certificates for the keys that sign provider ID tokens.
pub const DEFAULT_CERT_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// Issuer prefix; the expected `iss` is this followed by the project ID.
pub const DEFAULT_ISSUER_BASE: &str = "https://securetoken.google.com/";

/// Default HTTP timeout for certificate fetches.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest accepted clock skew (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid project ID: {0}")]
    InvalidProjectId(String),

    #[error("Invalid URL configuration: {0}")]
    InvalidUrl(String),

    #[error("Invalid clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),
}

/// Configuration for a token verification service.
///
/// Holds no secrets, so the derived Debug output is safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Project the tokens must be issued for (`aud`, and the `iss` suffix).
    pub project_id: String,

    /// Certificate endpoint URL.
    pub cert_url: String,

    /// Issuer prefix (always ends with `/`).
    pub issuer_base: String,

    /// Leeway applied to `exp` and `iat`.
    pub clock_skew: Duration,

    /// Cache lifetime when the endpoint sends no `max-age`.
    pub cert_cache_ttl: Duration,

    /// Timeout for a single certificate fetch.
    pub http_timeout: Duration,

    /// Shortest gap between refreshes triggered by an unknown `kid` while
    /// the cached set is still fresh.
    pub min_refresh_interval: Duration,
}

impl Config {
    /// Create a configuration for `project_id` with provider defaults.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            cert_url: DEFAULT_CERT_URL.to_string(),
            issuer_base: DEFAULT_ISSUER_BASE.to_string(),
            clock_skew: DEFAULT_EXPIRY_SKEW,
            cert_cache_ttl: DEFAULT_CACHE_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_cert_url(mut self, cert_url: impl Into<String>) -> Self {
        self.cert_url = cert_url.into();
        self
    }

    #[must_use]
    pub fn with_issuer_base(mut self, issuer_base: impl Into<String>) -> Self {
        self.issuer_base = normalize_issuer_base(issuer_base.into());
        self
    }

    #[must_use]
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    #[must_use]
    pub fn with_cert_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cert_cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// The `iss` value tokens must carry.
    pub fn expected_issuer(&self) -> String {
        crate::claims::expected_issuer(&self.issuer_base, &self.project_id)
    }

    /// Check values a builder may have set out of range.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::InvalidProjectId(
                "project ID must not be empty".to_string(),
            ));
        }
        if !is_http_url(&self.cert_url) {
            return Err(ConfigError::InvalidUrl(format!(
                "certificate URL must use http:// or https://, got '{}'",
                self.cert_url
            )));
        }
        if !is_http_url(&self.issuer_base) {
            return Err(ConfigError::InvalidUrl(format!(
                "issuer base must use http:// or https://, got '{}'",
                self.issuer_base
            )));
        }
        if self.clock_skew > MAX_CLOCK_SKEW {
            return Err(ConfigError::InvalidClockSkew(format!(
                "clock skew must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                self.clock_skew.as_secs()
            )));
        }
        if self.cert_cache_ttl.is_zero() {
            return Err(ConfigError::InvalidDuration(
                "certificate cache TTL must be greater than 0".to_string(),
            ));
        }
        if self.cert_cache_ttl > MAX_CACHE_TTL {
            return Err(ConfigError::InvalidDuration(format!(
                "certificate cache TTL must not exceed {} seconds, got {}",
                MAX_CACHE_TTL.as_secs(),
                self.cert_cache_ttl.as_secs()
            )));
        }
        if self.min_refresh_interval > MAX_CACHE_TTL {
            return Err(ConfigError::InvalidDuration(format!(
                "minimum refresh interval must not exceed {} seconds, got {}",
                MAX_CACHE_TTL.as_secs(),
                self.min_refresh_interval.as_secs()
            )));
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidDuration(
                "HTTP timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or out of range.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let project_id = vars
            .get("ID_TOKEN_PROJECT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("ID_TOKEN_PROJECT_ID".to_string()))?
            .clone();

        let mut config = Self::new(project_id);

        if let Some(cert_url) = vars.get("ID_TOKEN_CERT_URL") {
            config = config.with_cert_url(cert_url.clone());
        }

        if let Some(issuer_base) = vars.get("ID_TOKEN_ISSUER_BASE") {
            config = config.with_issuer_base(issuer_base.clone());
        }

        if let Some(value_str) = vars.get("ID_TOKEN_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "ID_TOKEN_CLOCK_SKEW_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            config = config.with_clock_skew(Duration::from_secs(value));
        }

        if let Some(value_str) = vars.get("ID_TOKEN_CERT_CACHE_TTL_SECONDS") {
            let ttl = parse_positive_secs("ID_TOKEN_CERT_CACHE_TTL_SECONDS", value_str)?;
            config = config.with_cert_cache_ttl(ttl);
        }

        if let Some(value_str) = vars.get("ID_TOKEN_HTTP_TIMEOUT_SECONDS") {
            let timeout = parse_positive_secs("ID_TOKEN_HTTP_TIMEOUT_SECONDS", value_str)?;
            config = config.with_http_timeout(timeout);
        }

        if let Some(value_str) = vars.get("ID_TOKEN_MIN_REFRESH_INTERVAL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidDuration(format!(
                    "ID_TOKEN_MIN_REFRESH_INTERVAL_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            config = config.with_min_refresh_interval(Duration::from_secs(value));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_positive_secs(name: &str, value_str: &str) -> Result<Duration, ConfigError> {
    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Duration::from_secs(value))
}

fn normalize_issuer_base(mut issuer_base: String) -> String {
    if !issuer_base.ends_with('/') {
        issuer_base.push('/');
    }
    issuer_base
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}
