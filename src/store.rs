//! # Stores
//!
//! Storage interfaces consumed by the auth handler, with in-memory
//! reference implementations. Durable backends implement the same traits;
//! every operation is logically atomic, so a backend may realize it with
//! a mutex, a run-to-completion turn, or compare-and-swap semantics.

pub mod acl;
pub mod cache;
pub mod challenge;

pub use acl::{AclEntry, AclStore, AgentStatus, MemoryAclStore};
pub use cache::TtlCache;
pub use challenge::{ChallengeRecord, ChallengeStore, MemoryChallengeStore};
