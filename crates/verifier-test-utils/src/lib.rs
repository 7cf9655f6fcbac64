//! # Verifier Test Utilities
//!
//! Shared test utilities for the ID token verifier.
//!
//! This crate provides:
//! - Fixed RSA signing keys and matching self-signed certificates
//! - Test token builder that signs RS256 tokens (TestTokenBuilder)
//! - Token mutators for tamper tests (tamper_signature, with_header)
//! - Mock certificate endpoint (MockCertServer)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verifier_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let server = MockCertServer::start().await;
//!     server.serve_default_certificates().await;
//!
//!     let token = TestTokenBuilder::new("proj-x")
//!         .for_subject("user-42")
//!         .sign_with_key_1();
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_cert_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_cert_server::*;
pub use token_builders::*;
