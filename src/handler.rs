//! # Auth Handler
//!
//! Entry point for the three authentication operations. Each operation
//! consumes a validated JSON request body (already parsed into its typed
//! request struct) and an optional client identifier used for rate-limit
//! keying, and returns a typed response or a typed error carrying its own
//! wire code and HTTP status.
//!
//! Every collaborator is injected at construction: challenge store, ACL
//! store, HTTP fetcher, token key material, and optionally a rate limiter
//! and observers. The handler owns no process-wide state.

mod challenge;
mod register;
mod verify;

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

pub use self::challenge::{ChallengeRequest, ChallengeResponse};
pub use self::register::{RegisterRequest, RegisterResponse};
pub use self::verify::{AgentSummary, VerifyRequest, VerifyResponse};
use crate::config::AuthConfig;
use crate::error::Error;
use crate::fetch::{HttpFetch, WebFetcher};
use crate::manifest::Manifest;
use crate::ratelimit::RateLimiter;
use crate::revocation::RevocationChecker;
use crate::store::{
    AclEntry, AclStore, AgentStatus, ChallengeStore, MemoryAclStore, MemoryChallengeStore,
    TtlCache,
};
use crate::token::{TokenClaims, TokenKey, TokenService};

/// Advisory retry interval for pending registrations, in seconds.
pub(crate) const RETRY_AFTER_PENDING: u64 = 3600;

/// Advisory retry interval after a rate-limit rejection, in seconds.
pub(crate) const RETRY_AFTER_RATE_LIMIT: u64 = 60;

type ScopeFn = Box<dyn Fn(&str, &Manifest) -> String + Send + Sync>;
type RegistrationObserver = Box<dyn Fn(&AclEntry) + Send + Sync>;

/// Orchestrates the challenge, verify and register operations.
pub struct AuthHandler<C = MemoryChallengeStore, A = MemoryAclStore, F = WebFetcher> {
    config: AuthConfig,
    tokens: TokenService,
    challenges: C,
    acl: A,
    fetcher: F,
    manifests: TtlCache<Manifest>,
    revocation: RevocationChecker,
    limiter: Option<RateLimiter>,
    scope_fn: Option<ScopeFn>,
    on_registration: Option<RegistrationObserver>,
}

impl AuthHandler {
    /// Build a handler with the in-memory reference stores and the
    /// reqwest fetcher. Must be called within a tokio runtime: the
    /// stores spawn their background reclaim tasks on creation.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the token key material cannot be imported.
    pub fn new(config: AuthConfig, key: &TokenKey<'_>) -> crate::Result<Self> {
        let skew = config.clock_skew_secs;
        Self::with_parts(config, key, MemoryChallengeStore::new(skew), MemoryAclStore::new(), WebFetcher)
    }
}

impl<C: ChallengeStore, A: AclStore, F: HttpFetch> AuthHandler<C, A, F> {
    /// Build a handler from injected stores and fetcher.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the token key material cannot be imported.
    pub fn with_parts(
        config: AuthConfig, key: &TokenKey<'_>, challenges: C, acl: A, fetcher: F,
    ) -> crate::Result<Self> {
        let config = config.clamped();
        let tokens = TokenService::new(
            config.issuer.clone(),
            key,
            config.token_lifetime_secs,
            config.clock_skew_secs,
        )?;
        let revocation =
            RevocationChecker::new(config.revocation_budget, config.revocation_cache_ttl_secs);
        Ok(Self {
            config,
            tokens,
            challenges,
            acl,
            fetcher,
            manifests: TtlCache::new(Some(Duration::from_secs(60))),
            revocation,
            limiter: None,
            scope_fn: None,
            on_registration: None,
        })
    }

    /// Enable rate limiting.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Derive the granted scope from the DID and verified manifest
    /// instead of the static configured scope.
    #[must_use]
    pub fn with_scope_fn(
        mut self, scope_fn: impl Fn(&str, &Manifest) -> String + Send + Sync + 'static,
    ) -> Self {
        self.scope_fn = Some(Box::new(scope_fn));
        self
    }

    /// Observe newly inserted registrations.
    #[must_use]
    pub fn with_registration_observer(
        mut self, observer: impl Fn(&AclEntry) + Send + Sync + 'static,
    ) -> Self {
        self.on_registration = Some(Box::new(observer));
        self
    }

    /// The access-control store, for operator tooling.
    pub const fn acl(&self) -> &A {
        &self.acl
    }

    /// The challenge store.
    pub const fn challenges(&self) -> &C {
        &self.challenges
    }

    /// The verified manifest most recently cached for a DID, if its TTL
    /// has not passed.
    #[must_use]
    pub fn cached_manifest(&self, did: &str) -> Option<Manifest> {
        self.manifests.get(did)
    }

    /// Validate a bearer token presented as an `Authorization` header
    /// value and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` when the header lacks the `Bearer` scheme
    /// or the token fails validation.
    pub fn authenticate_bearer(&self, header_value: &str) -> crate::Result<TokenClaims> {
        let token = header_value.strip_prefix("Bearer ").ok_or(Error::InvalidToken)?;
        self.tokens.validate(token.trim())
    }

    /// Validate a bare token string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` on any validation failure.
    pub fn validate_token(&self, token: &str) -> crate::Result<TokenClaims> {
        self.tokens.validate(token)
    }

    /// Dispose every owned store, cache and limiter, stopping their
    /// background tasks.
    pub fn dispose(&self) {
        self.challenges.dispose();
        self.manifests.dispose();
        self.revocation.dispose();
        if let Some(limiter) = &self.limiter {
            limiter.dispose();
        }
    }

    fn check_limit(&self, endpoint: &str, client: Option<&str>) -> crate::Result<()> {
        if let (Some(limiter), Some(client)) = (&self.limiter, client) {
            if !limiter.check(endpoint, client) {
                tracing::debug!("rate limit hit for {endpoint} by {client}");
                return Err(Error::RateLimited { retry_after: RETRY_AFTER_RATE_LIMIT });
            }
        }
        Ok(())
    }

    fn record_limit(&self, endpoint: &str, client: Option<&str>) {
        if let (Some(limiter), Some(client)) = (&self.limiter, client) {
            limiter.record(endpoint, client);
        }
    }

    fn scope_for(&self, did: &str, manifest: &Manifest) -> String {
        self.scope_fn
            .as_ref()
            .map_or_else(|| self.config.scope.clone(), |scope_fn| scope_fn(did, manifest))
    }
}

/// Wire form of timestamps: RFC 3339 with millisecond precision in UTC.
/// Challenge signing input embeds this exact string, so both the
/// challenge response and verification must format through this one
/// function.
pub(crate) fn rfc3339(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) const fn status_message(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::PendingApproval => "registration received; awaiting operator approval",
        AgentStatus::Approved => "agent is approved",
        AgentStatus::Rejected => "registration has been rejected",
        AgentStatus::Banned => "agent has been banned",
    }
}
