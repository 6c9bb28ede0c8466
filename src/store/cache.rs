//! # TTL Cache
//!
//! A small keyed cache with per-entry expiry, used for verified manifests
//! (TTL = token lifetime) and revocation verdicts. An optional background
//! reclaim keeps memory bounded; `dispose` stops it and clears all
//! entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Keyed cache with per-entry TTL. Clones share the same entries.
#[derive(Clone, Debug)]
pub struct TtlCache<T> {
    entries: Arc<Mutex<HashMap<String, (Instant, T)>>>,
    reclaim: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl<T: Clone + Send + 'static> TtlCache<T> {
    /// Create a cache. With `reclaim_interval` set, a background task
    /// drops expired entries on that cadence.
    #[must_use]
    pub fn new(reclaim_interval: Option<Duration>) -> Self {
        let entries: Arc<Mutex<HashMap<String, (Instant, T)>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let reclaim = reclaim_interval.map(|period| {
            let task_entries = Arc::clone(&entries);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    let now = Instant::now();
                    task_entries
                        .lock()
                        .expect("lock entries")
                        .retain(|_, (deadline, _)| *deadline > now);
                }
            })
        });

        Self { entries, reclaim: Arc::new(Mutex::new(reclaim)) }
    }

    /// Insert a value that expires after `ttl`.
    pub fn insert(&self, key: &str, value: T, ttl: Duration) {
        let deadline = Instant::now() + ttl;
        self.entries.lock().expect("lock entries").insert(key.to_string(), (deadline, value));
    }

    /// Read a live value; an expired entry is dropped on access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().expect("lock entries");
        match entries.get(key) {
            Some((deadline, value)) if *deadline > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Drop expired entries, returning the count removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("lock entries");
        let before = entries.len();
        entries.retain(|_, (deadline, _)| *deadline > now);
        before - entries.len()
    }

    /// Stop the reclaim task and clear all entries.
    pub fn dispose(&self) {
        if let Some(task) = self.reclaim.lock().expect("lock reclaim").take() {
            task.abort();
        }
        self.entries.lock().expect("lock entries").clear();
    }
}
