//! ID token verification for a federated authentication provider.
//!
//! Confirms that a token presented by a client was signed by the provider,
//! is unexpired, and was issued for the expected project.
//!
//! # Architecture
//!
//! ```text
//! raw token -> token::ParsedToken::parse
//!           -> keys::KeySource::resolve(kid)
//!           -> signature::verify
//!           -> claims::ClaimsValidator::validate
//!           -> service::VerifiedToken
//! ```
//!
//! # Modules
//!
//! - `config` - Verifier configuration (builder or environment)
//! - `errors` - Closed set of verification errors
//! - `token` - Raw token decoding and claim structures
//! - `keys` - Certificate fetching and the signing key cache
//! - `signature` - Signature and algorithm checks
//! - `claims` - Time window, audience, issuer, subject, and issued-at checks
//! - `service` - Pipeline orchestration
//! - `observability` - Metrics
//!
//! # Usage
//!
//! ```rust,ignore
//! use id_token_verifier::{Config, TokenVerificationService};
//!
//! let service = TokenVerificationService::new(&Config::new("my-project"))?;
//! let verified = service.verify(raw_token).await?;
//! println!("uid = {}", verified.subject());
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod claims;
pub mod config;
pub mod errors;
pub mod keys;
pub mod observability;
pub mod service;
pub mod signature;
pub mod token;

pub use config::{Config, ConfigError};
pub use errors::{VerificationStage, VerifyError};
pub use service::{TokenVerificationService, VerifiedToken};
