//! # Verify Operation
//!
//! Consumes a challenge: checks the agent's possession proof, verifies
//! the presented manifest, enforces sequence monotonicity, and mints a
//! bearer token. The challenge record transitions to consumed only after
//! every check has passed, so a failed attempt does not burn it.

use std::sync::LazyLock;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{AuthHandler, rfc3339};
use crate::config::{self, RemoteManifestPolicy};
use crate::did::{Did, Method, web};
use crate::error::Error;
use crate::fetch::HttpFetch;
use crate::manifest::{self, MULTIBASE_REGEX, Manifest};
use crate::store::{AclStore, ChallengeStore};
use crate::{codec, crypto};

static HEX_CHALLENGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-f]{64}$").expect("should compile"));

/// Body of `POST /auth/verify`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VerifyRequest {
    /// The agent's DID.
    pub did: String,

    /// Challenge returned by the challenge operation.
    pub challenge: String,

    /// Multibase-encoded Ed25519 signature over
    /// `SHA-256(challenge "." did "." expires_at)`.
    pub signature: String,

    /// The agent's signed manifest.
    pub manifest: Manifest,
}

/// Agent summary returned with a token.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AgentSummary {
    /// The agent's DID.
    pub did: String,

    /// Display name from the verified manifest.
    pub name: String,

    /// Granted scope, split on spaces.
    pub capabilities: Vec<String>,
}

/// Successful verification response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VerifyResponse {
    /// Bearer token for subsequent requests.
    pub token: String,

    /// RFC 3339 expiry of the token.
    pub expires_at: String,

    /// Summary of the verified agent.
    pub agent: AgentSummary,
}

impl<C: ChallengeStore, A: AclStore, F: HttpFetch> AuthHandler<C, A, F> {
    /// Verify a challenge response and mint a token.
    ///
    /// # Errors
    ///
    /// Every step failure surfaces as its own typed error; see the crate
    /// error taxonomy. A failure before the final consume step leaves the
    /// challenge unconsumed.
    pub async fn verify(
        &self, request: VerifyRequest, client: Option<&str>,
    ) -> crate::Result<VerifyResponse> {
        self.check_limit("verify", client)?;
        let did = Did::parse(&request.did)?;
        if !HEX_CHALLENGE_REGEX.is_match(&request.challenge) {
            return Err(Error::InvalidRequest(
                "challenge must be 64 lowercase hex characters".into(),
            ));
        }
        if !MULTIBASE_REGEX.is_match(&request.signature) {
            return Err(Error::InvalidRequest("signature must be multibase base58btc".into()));
        }
        self.record_limit("verify", client);

        let (manifest, manifest_verified) = self.effective_manifest(&did, request.manifest).await?;

        // Challenge state machine: Issued -> (found, !used, !expired) -> Consumed.
        let record =
            self.challenges.peek(&request.challenge).await?.ok_or(Error::ChallengeNotFound)?;
        if record.used {
            return Err(Error::ChallengeAlreadyUsed);
        }
        if record.did != request.did {
            return Err(Error::DidMismatch("challenge was issued to a different DID".into()));
        }
        let skew = config::seconds(self.config.clock_skew_secs);
        if record.expires_at + skew < Utc::now() {
            return Err(Error::ExpiredChallenge);
        }

        // Possession proof over the exact challenge-response string.
        let verifying_key =
            crate::did::resolve_key(&request.did, &self.fetcher, self.config.document_budget)
                .await?;
        let signing_input =
            format!("{}.{}.{}", record.challenge, record.did, rfc3339(&record.expires_at));
        let digest = crypto::sha256(signing_input.as_bytes());
        let signature = codec::decode(&request.signature).map_err(|_| Error::InvalidSignature)?;
        if signature.len() != crypto::SIGNATURE_LENGTH {
            return Err(Error::InvalidSignature);
        }
        if !crypto::verify(&signature, &digest, &verifying_key)? {
            return Err(Error::InvalidSignature);
        }

        if !manifest_verified {
            manifest::verify::verify(
                &manifest,
                &self.fetcher,
                self.config.document_budget,
                self.config.clock_skew_secs,
            )
            .await?;
        }

        if let Some(revocation) = &manifest.revocation {
            if self.revocation.is_revoked(&request.did, &revocation.endpoint, &self.fetcher).await
            {
                return Err(Error::ManifestRevoked);
            }
        }

        if manifest.id != request.did {
            return Err(Error::DidMismatch("manifest id does not match the presented DID".into()));
        }

        // Strict monotonicity: an equal sequence is a rollback.
        let stored = self.acl.max_sequence(&request.did).await?;
        if manifest.sequence <= stored {
            return Err(Error::ManifestRollback { presented: manifest.sequence, stored });
        }
        self.acl.update_sequence(&request.did, manifest.sequence).await?;
        self.manifests.insert(
            &request.did,
            manifest.clone(),
            StdDuration::from_secs(self.config.token_lifetime_secs),
        );

        // Consume only now, so a failed verification never burns the
        // challenge. The store's compare-and-swap closes the race between
        // concurrent verifications.
        if !self.challenges.mark_used(&request.challenge).await? {
            return Err(Error::ChallengeAlreadyUsed);
        }

        let scope = self.scope_for(&request.did, &manifest);
        let (token, claims) = self.tokens.issue(
            &request.did,
            &scope,
            manifest.agent_name(),
            manifest.agent_version(),
            manifest.sequence,
        )?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(Error::Internal)?;
        tracing::debug!("verified {} with manifest sequence {}", request.did, manifest.sequence);

        Ok(VerifyResponse {
            token,
            expires_at: rfc3339(&expires_at),
            agent: AgentSummary {
                did: request.did,
                name: manifest.metadata.name.clone(),
                capabilities: scope.split_whitespace().map(String::from).collect(),
            },
        })
    }

    /// For `did:web` agents, prefer a published
    /// `/.well-known/agent-manifest.json` that verifies. Fetch and parse
    /// failures fall back silently to the request body; a fetched
    /// manifest that fails verification falls back under the `Prefer`
    /// policy and hard-fails under `Strict`.
    async fn effective_manifest(
        &self, did: &Did, body: Manifest,
    ) -> crate::Result<(Manifest, bool)> {
        if did.method != Method::Web
            || self.config.remote_manifest == RemoteManifestPolicy::Ignore
        {
            return Ok((body, false));
        }
        let Ok(url) = web::manifest_url(&did.identifier) else {
            return Ok((body, false));
        };
        let bytes = match self.fetcher.fetch(&url, self.config.document_budget).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!("remote manifest fetch failed for {did}: {err}");
                return Ok((body, false));
            }
        };
        let remote: Manifest = match serde_json::from_slice(&bytes) {
            Ok(remote) => remote,
            Err(err) => {
                tracing::debug!("remote manifest unparseable for {did}: {err}");
                return Ok((body, false));
            }
        };
        match manifest::verify::verify(
            &remote,
            &self.fetcher,
            self.config.document_budget,
            self.config.clock_skew_secs,
        )
        .await
        {
            Ok(()) => Ok((remote, true)),
            Err(err) if self.config.remote_manifest == RemoteManifestPolicy::Strict => Err(err),
            Err(err) => {
                tracing::debug!("remote manifest failed verification for {did}: {err}");
                Ok((body, false))
            }
        }
    }
}
