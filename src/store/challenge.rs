//! # Challenge Store
//!
//! Single-use challenge lifecycle with TTL. A challenge is issued, read
//! back at most once during verification, and consumed by `mark_used`
//! only after every verification step succeeds; failed attempts leave the
//! record unconsumed.
//!
//! `get` hides records whose expiry (plus the store's clock skew) has
//! passed even while they are still materially present; `peek` is the raw
//! read the handler uses so it can distinguish an expired challenge from
//! one that never existed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use chrono::{DateTime, Utc};

/// A stored challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeRecord {
    /// 64 lowercase hex characters, 32 random bytes.
    pub challenge: String,

    /// DID the challenge was issued to.
    pub did: String,

    /// End of the challenge's validity window.
    pub expires_at: DateTime<Utc>,

    /// Whether the challenge has been consumed.
    pub used: bool,
}

/// Contract for challenge storage.
pub trait ChallengeStore: Send + Sync {
    /// Insert a fresh challenge. Inserting over an existing key is an
    /// error; the handler prevents it by using fresh random input.
    fn put(
        &self, challenge: &str, did: &str, expires_at: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Read a challenge, returning nothing once it has expired even if
    /// the record is still materially present.
    fn get(
        &self, challenge: &str,
    ) -> impl Future<Output = anyhow::Result<Option<ChallengeRecord>>> + Send;

    /// Raw read that ignores expiry. Used by the handler to distinguish
    /// an expired challenge from an unknown one.
    fn peek(
        &self, challenge: &str,
    ) -> impl Future<Output = anyhow::Result<Option<ChallengeRecord>>> + Send;

    /// Consume the challenge. Returns `true` only for the call that
    /// transitions `used` from `false` to `true`, so racing verifications
    /// cannot both succeed. Idempotent in effect.
    fn mark_used(&self, challenge: &str) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Remove expired records, returning the count removed.
    fn cleanup(&self) -> impl Future<Output = anyhow::Result<usize>> + Send;

    /// Stop any background reclaim.
    fn dispose(&self);
}

/// In-memory reference store.
///
/// Runs a periodic reclaim (default 60 s) on a background task; the task
/// does not block process exit and is stopped by `dispose`. Clones share
/// the same records.
#[derive(Clone, Debug)]
pub struct MemoryChallengeStore {
    records: Arc<Mutex<HashMap<String, ChallengeRecord>>>,
    clock_skew: chrono::Duration,
    reclaim: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl MemoryChallengeStore {
    /// Reclaim interval for the background task.
    pub const RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

    /// Create a store tolerating `clock_skew_secs` of staleness before a
    /// record stops being readable via `get`.
    #[must_use]
    pub fn new(clock_skew_secs: u64) -> Self {
        let records: Arc<Mutex<HashMap<String, ChallengeRecord>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let clock_skew = crate::config::seconds(clock_skew_secs);

        let task_records = Arc::clone(&records);
        let reclaim = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Self::RECLAIM_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let now = Utc::now();
                let mut records = task_records.lock().expect("lock records");
                records.retain(|_, record| record.expires_at + clock_skew >= now);
            }
        });

        Self { records, clock_skew, reclaim: Arc::new(Mutex::new(Some(reclaim))) }
    }

    fn expired(&self, record: &ChallengeRecord) -> bool {
        record.expires_at + self.clock_skew < Utc::now()
    }
}

impl ChallengeStore for MemoryChallengeStore {
    async fn put(&self, challenge: &str, did: &str, expires_at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut records = self.records.lock().expect("lock records");
        if records.contains_key(challenge) {
            bail!("challenge already exists");
        }
        records.insert(
            challenge.to_string(),
            ChallengeRecord {
                challenge: challenge.to_string(),
                did: did.to_string(),
                expires_at,
                used: false,
            },
        );
        Ok(())
    }

    async fn get(&self, challenge: &str) -> anyhow::Result<Option<ChallengeRecord>> {
        let records = self.records.lock().expect("lock records");
        Ok(records.get(challenge).filter(|record| !self.expired(record)).cloned())
    }

    async fn peek(&self, challenge: &str) -> anyhow::Result<Option<ChallengeRecord>> {
        let records = self.records.lock().expect("lock records");
        Ok(records.get(challenge).cloned())
    }

    async fn mark_used(&self, challenge: &str) -> anyhow::Result<bool> {
        let mut records = self.records.lock().expect("lock records");
        match records.get_mut(challenge) {
            Some(record) if !record.used => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cleanup(&self) -> anyhow::Result<usize> {
        let now = Utc::now();
        let skew = self.clock_skew;
        let mut records = self.records.lock().expect("lock records");
        let before = records.len();
        records.retain(|_, record| record.expires_at + skew >= now);
        Ok(before - records.len())
    }

    fn dispose(&self) {
        if let Some(task) = self.reclaim.lock().expect("lock reclaim").take() {
            task.abort();
        }
        self.records.lock().expect("lock records").clear();
    }
}
