//! # Errors
//!
//! Typed errors for the authentication engine. Each variant maps to a wire
//! code and an HTTP status so that a routing adapter can build the error
//! envelope without inspecting variant internals.
//!
//! Network causes from `did:web` resolution and revocation checks are
//! collapsed before they reach this enum; no variant carries secret
//! material.

use serde_json::{Value, json};
use thiserror::Error;

/// Typed errors for the authentication engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The request body failed schema validation, or the manifest violates
    /// a structural invariant.
    #[error("{0}")]
    InvalidRequest(String),

    /// The challenge signature did not verify against the agent's key.
    #[error("challenge signature verification failed")]
    InvalidSignature,

    /// The manifest proof did not verify against the resolved key.
    #[error("manifest proof verification failed")]
    InvalidManifestSignature,

    /// The challenge exists but its validity window has passed.
    #[error("challenge has expired")]
    ExpiredChallenge,

    /// No challenge record matches the presented value.
    #[error("challenge not found")]
    ChallengeNotFound,

    /// The challenge was already consumed by an earlier verification.
    #[error("challenge has already been used")]
    ChallengeAlreadyUsed,

    /// Two DIDs that must match do not.
    #[error("{0}")]
    DidMismatch(String),

    /// The manifest's `valid_until` is in the past.
    #[error("manifest validity window has passed")]
    ManifestExpired,

    /// The manifest sequence does not advance past the highest accepted
    /// sequence for the DID.
    #[error("manifest sequence {presented} does not advance past {stored}")]
    ManifestRollback {
        /// Sequence carried by the presented manifest.
        presented: u64,
        /// Highest sequence previously accepted for the DID.
        stored: u64,
    },

    /// The DID uses a method this engine does not resolve.
    #[error("unsupported DID method: {0}")]
    UnsupportedDidMethod(String),

    /// The DID could not be resolved to an Ed25519 public key.
    #[error("DID resolution failed")]
    DidResolutionFailed,

    /// The bearer token failed validation.
    #[error("token validation failed")]
    InvalidToken,

    /// The DID has no access-control entry.
    #[error("{0}")]
    DidNotFound(String),

    /// The agent's registration is awaiting operator approval. Not an
    /// error on the wire (HTTP 202), but carried through the error channel.
    #[error("agent registration is pending approval")]
    DidPending {
        /// Seconds the agent should wait before retrying.
        retry_after: u64,
    },

    /// The agent's registration was rejected.
    #[error("agent registration has been rejected")]
    DidRejected,

    /// The agent has been banned.
    #[error("agent has been banned")]
    DidBanned,

    /// The manifest's revocation endpoint reported the manifest revoked.
    #[error("manifest has been revoked")]
    ManifestRevoked,

    /// The caller exceeded the request rate for this operation.
    #[error("rate limit exceeded")]
    RateLimited {
        /// Advisory seconds until the caller should retry.
        retry_after: u64,
    },

    /// An unexpected internal failure. The cause is logged, never leaked.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Wire code for the error envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "AUTH_INVALID_REQUEST",
            Self::InvalidSignature => "AUTH_INVALID_SIGNATURE",
            Self::InvalidManifestSignature => "AUTH_INVALID_MANIFEST_SIGNATURE",
            Self::ExpiredChallenge => "AUTH_EXPIRED_CHALLENGE",
            Self::ChallengeNotFound => "AUTH_CHALLENGE_NOT_FOUND",
            Self::ChallengeAlreadyUsed => "AUTH_CHALLENGE_ALREADY_USED",
            Self::DidMismatch(_) => "AUTH_DID_MISMATCH",
            Self::ManifestExpired => "AUTH_MANIFEST_EXPIRED",
            Self::ManifestRollback { .. } => "AUTH_MANIFEST_ROLLBACK",
            Self::UnsupportedDidMethod(_) => "AUTH_UNSUPPORTED_DID_METHOD",
            Self::DidResolutionFailed => "AUTH_DID_RESOLUTION_FAILED",
            Self::InvalidToken => "AUTH_INVALID_TOKEN",
            Self::DidNotFound(_) => "AUTH_DID_NOT_FOUND",
            Self::DidPending { .. } => "AUTH_DID_PENDING",
            Self::DidRejected => "AUTH_DID_REJECTED",
            Self::DidBanned => "AUTH_DID_BANNED",
            Self::ManifestRevoked => "AUTH_MANIFEST_REVOKED",
            Self::RateLimited { .. } => "AUTH_RATE_LIMITED",
            Self::Internal => "AUTH_INTERNAL_ERROR",
        }
    }

    /// HTTP status the error maps to.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidSignature
            | Self::InvalidManifestSignature
            | Self::ExpiredChallenge
            | Self::ChallengeNotFound
            | Self::ChallengeAlreadyUsed
            | Self::DidMismatch(_)
            | Self::ManifestExpired
            | Self::ManifestRollback { .. }
            | Self::UnsupportedDidMethod(_)
            | Self::DidResolutionFailed => 400,
            Self::InvalidToken => 401,
            Self::DidNotFound(_) | Self::DidRejected | Self::DidBanned | Self::ManifestRevoked => {
                403
            }
            Self::DidPending { .. } => 202,
            Self::RateLimited { .. } => 429,
            Self::Internal => 500,
        }
    }

    /// Response body for the error.
    ///
    /// `DidPending` produces the 202 pending shape; every other variant
    /// produces the error envelope `{"error": {code, message, details?}}`.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::DidPending { retry_after } => json!({
                "status": "pending_approval",
                "message": self.to_string(),
                "retry_after": retry_after,
            }),
            Self::RateLimited { retry_after } => json!({
                "error": {
                    "code": self.code(),
                    "message": self.to_string(),
                    "details": { "retry_after": retry_after },
                }
            }),
            Self::ManifestRollback { presented, stored } => json!({
                "error": {
                    "code": self.code(),
                    "message": self.to_string(),
                    "details": { "presented": presented, "stored": stored },
                }
            }),
            _ => json!({
                "error": { "code": self.code(), "message": self.to_string() }
            }),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("internal error: {err:#}");
        Self::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::InvalidRequest("bad".into()).status(), 400);
        assert_eq!(Error::InvalidToken.status(), 401);
        assert_eq!(Error::DidBanned.status(), 403);
        assert_eq!(Error::DidPending { retry_after: 3600 }.status(), 202);
        assert_eq!(Error::RateLimited { retry_after: 60 }.status(), 429);
        assert_eq!(Error::Internal.status(), 500);
    }

    #[test]
    fn pending_body_shape() {
        let body = Error::DidPending { retry_after: 3600 }.body();
        assert_eq!(body["status"], "pending_approval");
        assert_eq!(body["retry_after"], 3600);
        assert!(body.get("error").is_none());
    }

    #[test]
    fn envelope_body_shape() {
        let body = Error::ChallengeNotFound.body();
        assert_eq!(body["error"]["code"], "AUTH_CHALLENGE_NOT_FOUND");
        assert_eq!(body["error"]["message"], "challenge not found");
    }

    #[test]
    fn internal_hides_cause() {
        let err: Error = anyhow::anyhow!("connection reset by peer").into();
        assert_eq!(err, Error::Internal);
        assert_eq!(err.to_string(), "internal error");
    }
}
