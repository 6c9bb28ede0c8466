//! # Register Operation
//!
//! Self-registration for unknown agents. A verified manifest creates a
//! `pending_approval` entry; approval itself is an operator action on the
//! ACL store, outside this engine.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{AuthHandler, RETRY_AFTER_PENDING, status_message};
use crate::error::Error;
use crate::fetch::HttpFetch;
use crate::manifest::{self, Manifest};
use crate::store::{AclEntry, AclStore, AgentStatus, ChallengeStore};

/// Body of `POST /auth/register`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    /// The agent's signed manifest.
    pub manifest: Manifest,

    /// Optional reason for the registration, at most 1024 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Registration response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegisterResponse {
    /// The registered DID.
    pub did: String,

    /// Current status of the entry.
    pub status: AgentStatus,

    /// Human-readable explanation of the status.
    pub message: String,

    /// Advisory seconds until the agent should retry, when pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl<C: ChallengeStore, A: AclStore, F: HttpFetch> AuthHandler<C, A, F> {
    /// Register an agent from its signed manifest.
    ///
    /// An existing entry is returned as-is, whatever its status; only an
    /// unknown DID creates a new `pending_approval` entry.
    ///
    /// # Errors
    ///
    /// `RateLimited`, `InvalidRequest` when registration is disabled or
    /// the body fails validation, manifest verification errors from the
    /// verification pipeline, `Internal` on store failure.
    pub async fn register(
        &self, request: RegisterRequest, client: Option<&str>,
    ) -> crate::Result<RegisterResponse> {
        self.check_limit("register", client)?;
        if !self.config.enable_registration {
            return Err(Error::InvalidRequest("registration is disabled".into()));
        }
        if request.reason.as_ref().is_some_and(|reason| reason.chars().count() > 1024) {
            return Err(Error::InvalidRequest("reason must be at most 1024 characters".into()));
        }
        self.record_limit("register", client);

        manifest::verify::verify(
            &request.manifest,
            &self.fetcher,
            self.config.document_budget,
            self.config.clock_skew_secs,
        )
        .await?;

        let did = request.manifest.id.clone();
        if let Some(existing) = self.acl.get(&did).await? {
            let retry_after = (existing.status == AgentStatus::PendingApproval)
                .then_some(RETRY_AFTER_PENDING);
            return Ok(RegisterResponse {
                did,
                status: existing.status,
                message: status_message(existing.status).into(),
                retry_after,
            });
        }

        let now = Utc::now();
        let entry = AclEntry {
            did: did.clone(),
            status: AgentStatus::PendingApproval,
            manifest_sequence: request.manifest.sequence,
            registered_at: now,
            updated_at: now,
            reason: request.reason,
            metadata: Some(json!({
                "name": request.manifest.metadata.name,
                "description": request.manifest.metadata.description,
                "agent_version": request.manifest.metadata.agent_version,
            })),
        };
        self.acl.set(entry.clone()).await?;
        if let Some(observer) = &self.on_registration {
            observer(&entry);
        }
        tracing::debug!("registered {did}, pending approval");

        Ok(RegisterResponse {
            did,
            status: AgentStatus::PendingApproval,
            message: status_message(AgentStatus::PendingApproval).into(),
            retry_after: Some(RETRY_AFTER_PENDING),
        })
    }
}
