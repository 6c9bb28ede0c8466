//! # Challenge Operation
//!
//! Issues a fresh single-use challenge to an approved agent. The returned
//! `expires_at` string is part of the challenge signing input and must be
//! echoed back byte-for-byte by the client.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{AuthHandler, RETRY_AFTER_PENDING, rfc3339};
use crate::config;
use crate::crypto;
use crate::did::Did;
use crate::error::Error;
use crate::fetch::HttpFetch;
use crate::store::{AclStore, AgentStatus, ChallengeStore};

/// Body of `POST /auth/challenge`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChallengeRequest {
    /// The agent's DID.
    pub did: String,
}

/// Successful challenge response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChallengeResponse {
    /// 64 lowercase hex characters, 32 random bytes.
    pub challenge: String,

    /// RFC 3339 expiry of the challenge. Clients sign this exact string.
    pub expires_at: String,
}

impl<C: ChallengeStore, A: AclStore, F: HttpFetch> AuthHandler<C, A, F> {
    /// Issue a challenge for an approved DID.
    ///
    /// # Errors
    ///
    /// `RateLimited`, `InvalidRequest`/`UnsupportedDidMethod` for a bad
    /// DID, `DidNotFound`/`DidPending`/`DidRejected`/`DidBanned` from the
    /// access-control decision, `Internal` on store failure.
    pub async fn challenge(
        &self, request: ChallengeRequest, client: Option<&str>,
    ) -> crate::Result<ChallengeResponse> {
        self.check_limit("challenge", client)?;
        Did::parse(&request.did)?;
        self.record_limit("challenge", client);

        match self.acl.get(&request.did).await? {
            None => {
                tracing::debug!("challenge refused, unknown DID {}", request.did);
                let message = if self.config.enable_registration {
                    "agent is not registered; submit a registration request"
                } else {
                    "agent is not registered"
                };
                return Err(Error::DidNotFound(message.into()));
            }
            Some(entry) => match entry.status {
                AgentStatus::PendingApproval => {
                    return Err(Error::DidPending { retry_after: RETRY_AFTER_PENDING });
                }
                AgentStatus::Rejected => return Err(Error::DidRejected),
                AgentStatus::Banned => return Err(Error::DidBanned),
                AgentStatus::Approved => {}
            },
        }

        let challenge = hex::encode(crypto::random_bytes::<32>());
        let expires_at = Utc::now() + config::seconds(self.config.challenge_lifetime_secs);
        self.challenges.put(&challenge, &request.did, expires_at).await?;
        tracing::debug!("issued challenge to {}", request.did);

        Ok(ChallengeResponse { challenge, expires_at: rfc3339(&expires_at) })
    }
}
