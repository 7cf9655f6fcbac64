//! Provider signing keys: retrieval, decoding, and caching.

pub mod certificate;
pub mod fetcher;
pub mod source;

pub use certificate::SigningKey;
pub use fetcher::{CertificateFetcher, CertificateSet, HttpCertificateFetcher};
pub use source::{
    KeySet, KeySource, DEFAULT_CACHE_TTL, DEFAULT_MIN_REFRESH_INTERVAL, MAX_CACHE_TTL,
};
