//! Cached provider key set.
//!
//! The cache holds one immutable [`KeySet`] behind an `Arc`. A refresh builds
//! the replacement set completely before swapping the `Arc`, so a reader sees
//! either the old set or the new one, never a mix.
//!
//! Refreshes are single-flight. A caller that misses takes the refresh lock;
//! if the set changed while it waited, it uses that set instead of fetching.
//! An unknown `kid` against a fresh set refetches at most once per
//! `min_refresh_interval`.

use crate::errors::VerifyError;
use crate::keys::certificate::SigningKey;
use crate::keys::fetcher::CertificateFetcher;
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL when the endpoint sends no `max-age` (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Upper bound on any cache lifetime, including an advertised `max-age` (1 day).
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Default gap between miss-triggered refreshes of a fresh set.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// One complete generation of provider keys.
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    generation: u64,
    fetched_at: Instant,
    expires_at: Instant,
}

impl KeySet {
    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Monotonic refresh counter; the first installed set is generation 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }

    fn fetched_within(&self, interval: Duration) -> bool {
        self.fetched_at.elapsed() < interval
    }
}

/// Resolves key identifiers to provider signing keys.
pub struct KeySource {
    fetcher: Arc<dyn CertificateFetcher>,
    current: RwLock<Option<Arc<KeySet>>>,
    refresh_lock: Mutex<()>,
    default_ttl: Duration,
    min_refresh_interval: Duration,
}

impl KeySource {
    /// Create an empty key source; the first resolve fetches.
    pub fn new(fetcher: Arc<dyn CertificateFetcher>) -> Self {
        Self::with_ttl(fetcher, DEFAULT_CACHE_TTL)
    }

    /// Create an empty key source with a custom fallback TTL.
    ///
    /// `default_ttl` applies when the endpoint does not advertise `max-age`.
    /// Both it and any advertised `max-age` are capped at [`MAX_CACHE_TTL`].
    pub fn with_ttl(fetcher: Arc<dyn CertificateFetcher>, default_ttl: Duration) -> Self {
        Self {
            fetcher,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            default_ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Set the shortest gap between refreshes caused by an unknown `kid`
    /// while the cached set is fresh. `Duration::ZERO` refetches on every miss.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Resolve `kid` to a signing key.
    ///
    /// Returns a cached key when the set is fresh. Otherwise refreshes the set
    /// (at most one fetch in flight) and looks the key up once more. A miss
    /// against a fresh set fetched within `min_refresh_interval` fails without
    /// fetching.
    ///
    /// # Errors
    ///
    /// - `VerifyError::MissingKeyId` if `kid` is empty
    /// - `VerifyError::KeyFetch` if a needed refresh fails (no fallback is used)
    /// - `VerifyError::UnknownKey` if `kid` is absent from the refreshed set,
    ///   or from a fresh set that was fetched too recently to refetch
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, VerifyError> {
        if kid.is_empty() {
            return Err(VerifyError::MissingKeyId);
        }

        let snapshot = self.snapshot().await;
        if let Some(set) = snapshot.as_ref().filter(|set| set.is_fresh()) {
            if let Some(key) = set.get(kid) {
                tracing::debug!(target: "idtoken.keys", "Signing key cache hit");
                return Ok(key);
            }
            if set.fetched_within(self.min_refresh_interval) {
                tracing::debug!(
                    target: "idtoken.keys",
                    generation = set.generation(),
                    "Key not found in recently fetched set, not refreshing"
                );
                return Err(VerifyError::UnknownKey {
                    kid: kid.to_string(),
                });
            }
            tracing::debug!(target: "idtoken.keys", "Key not found in cached set, refreshing");
        }

        let observed = snapshot.as_ref().map(|set| set.generation());
        let set = self.refresh_after(observed).await?;

        set.get(kid).ok_or_else(|| {
            tracing::warn!(
                target: "idtoken.keys",
                generation = set.generation(),
                key_count = set.len(),
                "Key not found after refresh"
            );
            VerifyError::UnknownKey {
                kid: kid.to_string(),
            }
        })
    }

    /// Fetch and install a new key set unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::KeyFetch` if the fetch fails; the cached set is kept.
    pub async fn force_refresh(&self) -> Result<Arc<KeySet>, VerifyError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_install().await
    }

    /// Key identifiers in the current set (empty before the first fetch).
    pub async fn cached_key_ids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self
            .snapshot()
            .await
            .map(|set| set.keys.keys().cloned().collect())
            .unwrap_or_default();
        kids.sort_unstable();
        kids
    }

    /// The current key set, if one has been installed.
    pub async fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.current.read().await.clone()
    }

    /// Refresh unless another caller already replaced the set we observed.
    async fn refresh_after(&self, observed: Option<u64>) -> Result<Arc<KeySet>, VerifyError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.snapshot().await {
            if Some(current.generation()) != observed && current.is_fresh() {
                tracing::debug!(
                    target: "idtoken.keys",
                    generation = current.generation(),
                    "Key set refreshed by a concurrent caller"
                );
                return Ok(current);
            }
        }

        self.fetch_and_install().await
    }

    /// Caller must hold `refresh_lock`.
    async fn fetch_and_install(&self) -> Result<Arc<KeySet>, VerifyError> {
        let fetched = self.fetcher.fetch_certificates().await?;

        let keys = fetched
            .certificates
            .iter()
            .map(|(kid, pem)| {
                SigningKey::from_certificate_pem(kid, pem).map(|key| (kid.clone(), Arc::new(key)))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let ttl = fetched
            .max_age
            .unwrap_or(self.default_ttl)
            .min(MAX_CACHE_TTL);
        let generation = self
            .snapshot()
            .await
            .map_or(1, |previous| previous.generation() + 1);

        let fetched_at = Instant::now();
        let set = Arc::new(KeySet {
            keys,
            generation,
            fetched_at,
            // Unrepresentable expiry leaves the set stale rather than panicking.
            expires_at: fetched_at.checked_add(ttl).unwrap_or(fetched_at),
        });

        *self.current.write().await = Some(Arc::clone(&set));

        let earliest_cert_expiry = set.keys.values().map(|key| key.not_after()).min();
        metrics::set_signing_key_count(set.len());
        tracing::info!(
            target: "idtoken.keys",
            key_count = set.len(),
            generation,
            ttl_seconds = ttl.as_secs(),
            earliest_cert_expiry = ?earliest_cert_expiry,
            "Signing key cache refreshed"
        );

        Ok(set)
    }
}
