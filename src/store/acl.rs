//! # Access Control Store
//!
//! Per-DID access-control entries plus the highest accepted manifest
//! sequence. Authorization decisions depend on `status` only; the
//! sequence map enforces manifest rollback protection and may track DIDs
//! that have no entry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authorization status of an agent.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered, awaiting operator approval.
    PendingApproval,

    /// Allowed to authenticate.
    Approved,

    /// Registration was declined.
    Rejected,

    /// Blocked; stronger than rejected in intent, identical in effect.
    Banned,
}

/// One access-control entry per DID.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AclEntry {
    /// The agent's DID.
    pub did: String,

    /// Authorization status.
    pub status: AgentStatus,

    /// Manifest sequence captured at registration.
    pub manifest_sequence: u64,

    /// When the entry was created.
    pub registered_at: DateTime<Utc>,

    /// When the entry last changed.
    pub updated_at: DateTime<Utc>,

    /// Free-form reason supplied at registration or by an operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Selected manifest metadata captured for operator review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Contract for access-control storage.
pub trait AclStore: Send + Sync {
    /// Read the entry for a DID.
    fn get(&self, did: &str) -> impl Future<Output = anyhow::Result<Option<AclEntry>>> + Send;

    /// Insert or replace an entry.
    fn set(&self, entry: AclEntry) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// List entries, optionally filtered by status.
    fn list(
        &self, status: Option<AgentStatus>,
    ) -> impl Future<Output = anyhow::Result<Vec<AclEntry>>> + Send;

    /// Delete the entry for a DID, returning whether one existed.
    fn delete(&self, did: &str) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Highest accepted manifest sequence for a DID, 0 if unknown.
    fn max_sequence(&self, did: &str) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Raise the highest accepted sequence. Monotonic: a lower value than
    /// the stored one leaves the stored value in place, so concurrent
    /// updates settle on the maximum.
    fn update_sequence(
        &self, did: &str, sequence: u64,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// In-memory reference store. Clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryAclStore {
    entries: Arc<Mutex<HashMap<String, AclEntry>>>,
    sequences: Arc<Mutex<HashMap<String, u64>>>,
}

impl MemoryAclStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AclStore for MemoryAclStore {
    async fn get(&self, did: &str) -> anyhow::Result<Option<AclEntry>> {
        Ok(self.entries.lock().expect("lock entries").get(did).cloned())
    }

    async fn set(&self, entry: AclEntry) -> anyhow::Result<()> {
        self.entries.lock().expect("lock entries").insert(entry.did.clone(), entry);
        Ok(())
    }

    async fn list(&self, status: Option<AgentStatus>) -> anyhow::Result<Vec<AclEntry>> {
        let entries = self.entries.lock().expect("lock entries");
        let mut listed: Vec<AclEntry> = entries
            .values()
            .filter(|entry| status.map_or(true, |status| entry.status == status))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.did.cmp(&b.did));
        Ok(listed)
    }

    async fn delete(&self, did: &str) -> anyhow::Result<bool> {
        Ok(self.entries.lock().expect("lock entries").remove(did).is_some())
    }

    async fn max_sequence(&self, did: &str) -> anyhow::Result<u64> {
        Ok(self.sequences.lock().expect("lock sequences").get(did).copied().unwrap_or(0))
    }

    async fn update_sequence(&self, did: &str, sequence: u64) -> anyhow::Result<()> {
        let mut sequences = self.sequences.lock().expect("lock sequences");
        let entry = sequences.entry(did.to_string()).or_insert(0);
        *entry = (*entry).max(sequence);
        Ok(())
    }
}
