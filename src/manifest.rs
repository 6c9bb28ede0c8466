//! # Agent Manifest
//!
//! A manifest is a self-describing, self-signed document declaring an
//! agent's identity, capabilities and validity window. It is immutable
//! once signed: the proof covers the JCS-canonicalized manifest with the
//! `proof` field absent.
//!
//! Structural validation is the source of truth for shape; downstream
//! code consumes the typed value and does not re-validate.

pub mod verify;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::jcs;

static SEMVER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("should compile")
});

pub(crate) static MULTIBASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^z[1-9A-HJ-NP-Za-km-z]+$").expect("should compile"));

/// Proof type accepted on manifests.
pub const PROOF_TYPE: &str = "Ed25519Signature2020";

/// Proof purpose accepted on manifests.
pub const PROOF_PURPOSE: &str = "assertionMethod";

/// A signed agent manifest.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Semver of the manifest schema used.
    pub version: String,

    /// The agent's DID.
    pub id: String,

    /// Strictly monotonic counter across the agent's lifetime.
    pub sequence: u64,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last-update timestamp.
    pub updated_at: String,

    /// RFC 3339 end of the validity window.
    pub valid_until: String,

    /// Optional revocation endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationPolicy>,

    /// Human-oriented description of the agent.
    pub metadata: Metadata,

    /// Machine-oriented declaration of the agent's surfaces.
    pub capabilities: Capabilities,

    /// Data-integrity proof. Absent only while building the signing
    /// input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

/// Where to ask whether the manifest has been revoked.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RevocationPolicy {
    /// HTTPS endpoint returning `{revoked, reason?}`.
    pub endpoint: String,

    /// Suggested polling interval in seconds, at least 60.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<u64>,
}

/// Descriptive metadata about the agent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    /// Display name, at most 128 characters.
    pub name: String,

    /// Description, at most 1024 characters.
    pub description: String,

    /// Semver of the agent software.
    pub agent_version: String,

    /// Up to 10 tags of at most 32 characters each.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Homepage URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    /// Logo URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,

    /// Operating organization or person.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

/// The agent's declared interfaces and categories.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    /// At least one reachable interface.
    pub interfaces: Vec<Interface>,

    /// Up to 5 free-form categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    /// Permissions the agent requests from callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_required: Option<Vec<String>>,
}

/// A single reachable interface.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Interface {
    /// Transport protocol.
    pub protocol: Protocol,

    /// Interface URL; its scheme must match the protocol.
    pub url: String,

    /// API standard the interface implements, for example `openapi`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_standard: Option<String>,

    /// Methods exposed at the interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,

    /// Reference to a machine-readable schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_ref: Option<String>,
}

/// Interface transport protocols.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// HTTPS.
    Https,

    /// Secure WebSocket.
    Wss,
}

impl Protocol {
    const fn scheme(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Wss => "wss",
        }
    }
}

/// Data-integrity proof over the manifest.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Proof {
    /// Proof type. Must be `Ed25519Signature2020`.
    #[serde(rename = "type")]
    pub type_: String,

    /// RFC 3339 timestamp of proof creation.
    pub created: String,

    /// DID URL of the verification method; must begin with the manifest
    /// `id`.
    pub verification_method: String,

    /// Proof purpose. Must be `assertionMethod`.
    pub proof_purpose: String,

    /// Multibase-encoded 64-byte Ed25519 signature.
    pub proof_value: String,
}

impl Manifest {
    /// Validate the manifest's structure: types are enforced by
    /// deserialization, so this checks length caps, enum and regex
    /// shapes, and cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` naming the first violated constraint, or
    /// `UnsupportedDidMethod` when `id` uses an unknown method.
    pub fn validate(&self) -> crate::Result<()> {
        if !SEMVER_REGEX.is_match(&self.version) {
            return Err(Error::InvalidRequest("manifest version must be semver".into()));
        }
        crate::did::Did::parse(&self.id)?;
        if self.sequence < 1 {
            return Err(Error::InvalidRequest("manifest sequence must be at least 1".into()));
        }
        parse_timestamp(&self.created_at, "created_at")?;
        parse_timestamp(&self.updated_at, "updated_at")?;
        parse_timestamp(&self.valid_until, "valid_until")?;

        if let Some(revocation) = &self.revocation {
            require_url(&revocation.endpoint, "https", "revocation.endpoint")?;
            if revocation.check_interval.is_some_and(|interval| interval < 60) {
                return Err(Error::InvalidRequest(
                    "revocation.check_interval must be at least 60 seconds".into(),
                ));
            }
        }

        self.metadata.validate()?;
        self.capabilities.validate()?;

        if let Some(proof) = &self.proof {
            proof.validate(&self.id)?;
        }
        Ok(())
    }

    /// SHA-256 digest of the JCS-canonicalized manifest with the `proof`
    /// field absent. This is the exact message signed by the agent.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the manifest cannot be canonicalized.
    pub fn signing_digest(&self) -> crate::Result<[u8; 32]> {
        let mut value = serde_json::to_value(self).map_err(|err| {
            tracing::error!("manifest serialization failed: {err}");
            Error::Internal
        })?;
        if let Some(object) = value.as_object_mut() {
            object.remove("proof");
        }
        jcs::digest(&value)
    }
}

impl Metadata {
    fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() || self.name.chars().count() > 128 {
            return Err(Error::InvalidRequest("metadata.name must be 1 to 128 characters".into()));
        }
        if self.description.chars().count() > 1024 {
            return Err(Error::InvalidRequest(
                "metadata.description must be at most 1024 characters".into(),
            ));
        }
        if !SEMVER_REGEX.is_match(&self.agent_version) {
            return Err(Error::InvalidRequest("metadata.agent_version must be semver".into()));
        }
        if let Some(tags) = &self.tags {
            if tags.len() > 10 {
                return Err(Error::InvalidRequest("metadata.tags allows at most 10 tags".into()));
            }
            if tags.iter().any(|tag| tag.is_empty() || tag.chars().count() > 32) {
                return Err(Error::InvalidRequest(
                    "metadata.tags entries must be 1 to 32 characters".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Capabilities {
    fn validate(&self) -> crate::Result<()> {
        if self.interfaces.is_empty() {
            return Err(Error::InvalidRequest(
                "capabilities.interfaces requires at least one interface".into(),
            ));
        }
        if self.categories.as_ref().is_some_and(|categories| categories.len() > 5) {
            return Err(Error::InvalidRequest(
                "capabilities.categories allows at most 5 categories".into(),
            ));
        }
        for interface in &self.interfaces {
            require_url(&interface.url, interface.protocol.scheme(), "interface.url")?;
        }
        Ok(())
    }
}

impl Proof {
    fn validate(&self, manifest_id: &str) -> crate::Result<()> {
        if self.type_ != PROOF_TYPE {
            return Err(Error::InvalidRequest(format!("proof.type must be {PROOF_TYPE}")));
        }
        if self.proof_purpose != PROOF_PURPOSE {
            return Err(Error::InvalidRequest(format!(
                "proof.proof_purpose must be {PROOF_PURPOSE}"
            )));
        }
        parse_timestamp(&self.created, "proof.created")?;
        if !MULTIBASE_REGEX.is_match(&self.proof_value) {
            return Err(Error::InvalidRequest(
                "proof.proof_value must be multibase base58btc".into(),
            ));
        }
        if !self.verification_method.starts_with(manifest_id) {
            return Err(Error::InvalidRequest(
                "proof.verification_method must reference the manifest id".into(),
            ));
        }
        Ok(())
    }
}

/// Parse an RFC 3339 timestamp with offset.
pub(crate) fn parse_timestamp(
    s: &str, field: &str,
) -> crate::Result<chrono::DateTime<chrono::FixedOffset>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|_| Error::InvalidRequest(format!("{field} must be an RFC 3339 timestamp")))
}

fn require_url(s: &str, scheme: &str, field: &str) -> crate::Result<()> {
    let parsed =
        url::Url::parse(s).map_err(|_| Error::InvalidRequest(format!("{field} must be a URL")))?;
    if parsed.scheme() != scheme {
        return Err(Error::InvalidRequest(format!("{field} must use the {scheme} scheme")));
    }
    Ok(())
}

/// Convenience accessors used when minting tokens and ACL entries.
impl Manifest {
    /// The agent's display name.
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.metadata.name
    }

    /// The agent software version.
    #[must_use]
    pub fn agent_version(&self) -> &str {
        &self.metadata.agent_version
    }
}

/// Reject unknown fields early so a manifest round-trips byte-identically
/// through the typed representation.
impl TryFrom<Value> for Manifest {
    type Error = Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| Error::InvalidRequest(format!("invalid manifest: {err}")))
    }
}
