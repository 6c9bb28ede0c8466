//! # Rate Limiter
//!
//! Sliding-window request counter keyed by `(endpoint, client)`. The
//! limiter is an optional injected dependency of the auth handler;
//! absence disables limiting.
//!
//! `check` inspects without mutating; `record` appends a timestamp after
//! the request body has validated, so malformed traffic never spends a
//! window slot before it is rejected.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Sliding-window rate limiter. Clones share the same records.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    records: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    reclaim: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window_secs` for
    /// each `(endpoint, client)` pair. A background task periodically
    /// drops keys whose samples all fell out of the window.
    #[must_use]
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        let window = Duration::from_secs(window_secs.max(1));
        let records: Arc<Mutex<HashMap<String, VecDeque<Instant>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let task_records = Arc::clone(&records);
        let reclaim = tokio::spawn(async move {
            let mut interval = tokio::time::interval(window);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let now = Instant::now();
                task_records
                    .lock()
                    .expect("lock records")
                    .retain(|_, samples| {
                        samples.iter().any(|sample| now.duration_since(*sample) < window)
                    });
            }
        });

        Self { max_requests, window, records, reclaim: Arc::new(Mutex::new(Some(reclaim))) }
    }

    /// Limiter with the default policy of 10 requests per 60 seconds.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(10, 60)
    }

    fn key(endpoint: &str, client: &str) -> String {
        format!("{endpoint}:{client}")
    }

    /// Whether another request is allowed for the key. Does not mutate.
    #[must_use]
    pub fn check(&self, endpoint: &str, client: &str) -> bool {
        let now = Instant::now();
        let records = self.records.lock().expect("lock records");
        records.get(&Self::key(endpoint, client)).map_or(true, |samples| {
            let live =
                samples.iter().filter(|sample| now.duration_since(**sample) < self.window).count();
            live < self.max_requests
        })
    }

    /// Record a request for the key.
    pub fn record(&self, endpoint: &str, client: &str) {
        let now = Instant::now();
        let mut records = self.records.lock().expect("lock records");
        let samples = records.entry(Self::key(endpoint, client)).or_default();
        while samples.front().is_some_and(|sample| now.duration_since(*sample) >= self.window) {
            samples.pop_front();
        }
        samples.push_back(now);
    }

    /// Drop keys whose samples all fell out of the window, returning the
    /// count removed.
    pub fn compact(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock().expect("lock records");
        let before = records.len();
        records.retain(|_, samples| {
            samples.iter().any(|sample| now.duration_since(*sample) < self.window)
        });
        before - records.len()
    }

    /// Stop the compaction task and clear all records.
    pub fn dispose(&self) {
        if let Some(task) = self.reclaim.lock().expect("lock reclaim").take() {
            task.abort();
        }
        self.records.lock().expect("lock records").clear();
    }
}
