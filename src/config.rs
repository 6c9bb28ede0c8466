//! # Configuration
//!
//! Handler configuration with clamped defaults. Values outside their
//! allowed ranges are pulled to the nearest bound rather than rejected,
//! so a misconfigured deployment degrades to safe limits.

use crate::fetch::FetchBudget;

/// How to treat a published `/.well-known/agent-manifest.json` during
/// verification of a `did:web` agent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RemoteManifestPolicy {
    /// Fetch it and prefer it over the request body when it verifies;
    /// fall back silently otherwise.
    #[default]
    Prefer,

    /// Fetch it and hard-fail verification when it is present but does
    /// not verify.
    Strict,

    /// Never fetch it; always use the request body manifest.
    Ignore,
}

/// Auth handler configuration.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Token issuer (`iss` claim).
    pub issuer: String,

    /// Static scope granted to verified agents, split on spaces for the
    /// response's capability list.
    pub scope: String,

    /// Token lifetime in seconds, 60..=43200.
    pub token_lifetime_secs: u64,

    /// Challenge lifetime in seconds, 30..=600.
    pub challenge_lifetime_secs: u64,

    /// Clock skew tolerated for stale inputs, in seconds, at most 3600.
    /// Applied in the past direction only.
    pub clock_skew_secs: u64,

    /// Whether unknown agents may register themselves.
    pub enable_registration: bool,

    /// Budget for DID documents and remote manifests.
    pub document_budget: FetchBudget,

    /// Budget for revocation endpoints.
    pub revocation_budget: FetchBudget,

    /// Seconds a revocation verdict stays cached per DID.
    pub revocation_cache_ttl_secs: u64,

    /// Remote manifest handling for `did:web` agents.
    pub remote_manifest: RemoteManifestPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "agent-auth".into(),
            scope: "agent".into(),
            token_lifetime_secs: 3600,
            challenge_lifetime_secs: 300,
            clock_skew_secs: 60,
            enable_registration: false,
            document_budget: FetchBudget::documents(),
            revocation_budget: FetchBudget::revocation(),
            revocation_cache_ttl_secs: 300,
            remote_manifest: RemoteManifestPolicy::default(),
        }
    }
}

impl AuthConfig {
    /// Pull out-of-range values to their nearest bound.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.token_lifetime_secs = self.token_lifetime_secs.clamp(60, 43_200);
        self.challenge_lifetime_secs = self.challenge_lifetime_secs.clamp(30, 600);
        self.clock_skew_secs = self.clock_skew_secs.min(3600);
        self
    }
}

/// Seconds-to-duration conversion for configuration values. Callers pass
/// values bounded by [`AuthConfig::clamped`], so the cast cannot wrap.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs as i64)
}
