//! # Revocation Checker
//!
//! When a manifest names a revocation endpoint, the checker performs an
//! HTTPS GET expecting `{revoked, reason?}` under the same budget family
//! as `did:web` resolution, with a per-DID verdict cache.
//!
//! Failures fail open: a fetch or parse error is treated as not revoked.
//! Availability is chosen over deny-by-default; a deployment preferring
//! the opposite wraps the injected fetcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::{FetchBudget, HttpFetch};
use crate::store::TtlCache;

/// Response shape of a revocation endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RevocationStatus {
    /// Whether the manifest has been revoked.
    pub revoked: bool,

    /// Optional operator-supplied reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Fetches and caches revocation verdicts.
#[derive(Clone, Debug)]
pub struct RevocationChecker {
    cache: TtlCache<bool>,
    budget: FetchBudget,
    cache_ttl: Duration,
}

impl RevocationChecker {
    /// Create a checker caching verdicts for `cache_ttl_secs` (default
    /// policy is 300 seconds).
    #[must_use]
    pub fn new(budget: FetchBudget, cache_ttl_secs: u64) -> Self {
        Self {
            cache: TtlCache::new(Some(Duration::from_secs(60))),
            budget,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        }
    }

    /// Whether the manifest for `did` is revoked according to `endpoint`.
    ///
    /// Successful fetches are cached per DID. Any I/O, timeout or parse
    /// failure returns `false` and is not cached.
    pub async fn is_revoked(
        &self, did: &str, endpoint: &str, fetcher: &impl HttpFetch,
    ) -> bool {
        if let Some(verdict) = self.cache.get(did) {
            return verdict;
        }

        let body = match fetcher.fetch(endpoint, self.budget).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!("revocation check failed open for {did}: {err}");
                return false;
            }
        };
        let status: RevocationStatus = match serde_json::from_slice(&body) {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!("revocation response unparseable for {did}, failing open: {err}");
                return false;
            }
        };

        self.cache.insert(did, status.revoked, self.cache_ttl);
        if status.revoked {
            tracing::warn!(
                "manifest revoked for {did}: {}",
                status.reason.as_deref().unwrap_or("no reason given")
            );
        }
        status.revoked
    }

    /// Stop the cache reclaim task and clear cached verdicts.
    pub fn dispose(&self) {
        self.cache.dispose();
    }
}
