//! # DID Web
//!
//! The `did:web` method maps the identifier to a domain (and optional
//! path) hosting a DID document at `/.well-known/did.json`. Resolution is
//! a network operation and runs under the caller's fetch budget.
//!
//! See <https://w3c-ccg.github.io/did-method-web/>.

use ed25519_dalek::VerifyingKey;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use super::Did;
use crate::error::Error;
use crate::fetch::{FetchBudget, HttpFetch};

/// A DID document, reduced to the fields key resolution needs.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// The DID the document describes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Verification methods carrying key material.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verification_method: Vec<VerificationMethod>,

    /// Methods usable for assertion, by reference or embedded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<MethodRef>,
}

/// A verification method from a DID document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// DID URL identifying the method.
    pub id: String,

    /// Method type, for example `Ed25519VerificationKey2020`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// DID of the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// Multibase-encoded, multicodec-prefixed public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
}

/// `assertionMethod` entries are either DID URL references or embedded
/// verification methods.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MethodRef {
    /// Reference to a method in `verificationMethod`.
    Reference(String),

    /// Embedded verification method.
    Embedded(VerificationMethod),
}

/// HTTP URL of the DID document for a `did:web` identifier.
///
/// The identifier's `:` separators become path separators and percent
/// escapes are decoded, so `example.com%3A8443:agents` becomes
/// `https://example.com:8443/agents/.well-known/did.json`.
///
/// # Errors
///
/// Returns `DidResolutionFailed` when the identifier is empty or decodes
/// to something that is not a valid https URL.
pub fn document_url(identifier: &str) -> crate::Result<String> {
    well_known_url(identifier, "did.json")
}

/// HTTP URL of the published agent manifest for a `did:web` identifier.
///
/// # Errors
///
/// Returns `DidResolutionFailed` under the same conditions as
/// [`document_url`].
pub fn manifest_url(identifier: &str) -> crate::Result<String> {
    well_known_url(identifier, "agent-manifest.json")
}

fn well_known_url(identifier: &str, file: &str) -> crate::Result<String> {
    if identifier.is_empty() {
        return Err(Error::DidResolutionFailed);
    }
    let path = identifier.replace(':', "/");
    let decoded =
        percent_decode_str(&path).decode_utf8().map_err(|_| Error::DidResolutionFailed)?;
    let candidate = format!("https://{decoded}/.well-known/{file}");
    let parsed = url::Url::parse(&candidate).map_err(|_| Error::DidResolutionFailed)?;
    if parsed.scheme() != "https" || parsed.host_str().is_none() {
        return Err(Error::DidResolutionFailed);
    }
    Ok(candidate)
}

/// Resolve a `did:web` identifier to the agent's Ed25519 public key.
///
/// When `method_id` names a specific verification method (from a manifest
/// proof), the document entry with that id is selected. Otherwise the
/// first method referenced by `assertionMethod` is preferred, falling
/// back to the first `verificationMethod` entry.
///
/// # Errors
///
/// Any network, size, redirect, parse or structural failure collapses to
/// `DidResolutionFailed`. The underlying cause is logged, never returned.
pub async fn resolve(
    did: &Did, method_id: Option<&str>, fetcher: &impl HttpFetch, budget: FetchBudget,
) -> crate::Result<VerifyingKey> {
    let url = document_url(&did.identifier)?;
    let body = fetcher.fetch(&url, budget).await.map_err(|err| {
        tracing::debug!("fetching DID document failed: {err}");
        Error::DidResolutionFailed
    })?;
    let document: DidDocument = serde_json::from_slice(&body).map_err(|err| {
        tracing::debug!("parsing DID document failed: {err}");
        Error::DidResolutionFailed
    })?;

    let method = select_method(&document, method_id).ok_or(Error::DidResolutionFailed)?;
    let multikey = method.public_key_multibase.as_deref().ok_or(Error::DidResolutionFailed)?;
    super::key::decode_multibase_key(multikey)
}

fn select_method(document: &DidDocument, method_id: Option<&str>) -> Option<VerificationMethod> {
    if let Some(id) = method_id {
        if let Some(vm) = document.verification_method.iter().find(|vm| vm.id == id) {
            return Some(vm.clone());
        }
        return document.assertion_method.iter().find_map(|entry| match entry {
            MethodRef::Embedded(vm) if vm.id == id => Some(vm.clone()),
            _ => None,
        });
    }

    for entry in &document.assertion_method {
        match entry {
            MethodRef::Reference(id) => {
                if let Some(vm) = document.verification_method.iter().find(|vm| &vm.id == id) {
                    return Some(vm.clone());
                }
            }
            MethodRef::Embedded(vm) => return Some(vm.clone()),
        }
    }
    document.verification_method.first().cloned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{codec, crypto, ED25519_CODEC};

    struct MockFetcher(serde_json::Value);

    impl HttpFetch for MockFetcher {
        async fn fetch(&self, _url: &str, _budget: FetchBudget) -> anyhow::Result<Vec<u8>> {
            Ok(serde_json::to_vec(&self.0)?)
        }
    }

    struct FailingFetcher;

    impl HttpFetch for FailingFetcher {
        async fn fetch(&self, _url: &str, _budget: FetchBudget) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("connection refused")
        }
    }

    fn multikey(verifying_key: &VerifyingKey) -> String {
        let mut bytes = ED25519_CODEC.to_vec();
        bytes.extend_from_slice(verifying_key.as_bytes());
        codec::encode(&bytes)
    }

    #[test]
    fn document_url_construction() {
        assert_eq!(
            document_url("example.com").expect("should build"),
            "https://example.com/.well-known/did.json"
        );
        assert_eq!(
            document_url("example.com:agents:alpha").expect("should build"),
            "https://example.com/agents/alpha/.well-known/did.json"
        );
        assert_eq!(
            document_url("example.com%3A8443").expect("should build"),
            "https://example.com:8443/.well-known/did.json"
        );
        assert!(document_url("").is_err());
    }

    #[tokio::test]
    async fn resolves_first_assertion_method() {
        let (_, vk_a) = crypto::generate_keypair();
        let (_, vk_b) = crypto::generate_keypair();
        let document = json!({
            "id": "did:web:example.com",
            "verificationMethod": [
                {"id": "did:web:example.com#key-0", "publicKeyMultibase": multikey(&vk_a)},
                {"id": "did:web:example.com#key-1", "publicKeyMultibase": multikey(&vk_b)},
            ],
            "assertionMethod": ["did:web:example.com#key-1"],
        });
        let did = Did::parse("did:web:example.com").expect("should parse");
        let resolved = resolve(&did, None, &MockFetcher(document), FetchBudget::documents())
            .await
            .expect("should resolve");
        assert_eq!(resolved, vk_b);
    }

    #[tokio::test]
    async fn resolves_named_method() {
        let (_, vk_a) = crypto::generate_keypair();
        let (_, vk_b) = crypto::generate_keypair();
        let document = json!({
            "verificationMethod": [
                {"id": "did:web:example.com#key-0", "publicKeyMultibase": multikey(&vk_a)},
                {"id": "did:web:example.com#key-1", "publicKeyMultibase": multikey(&vk_b)},
            ],
        });
        let did = Did::parse("did:web:example.com").expect("should parse");
        let resolved = resolve(
            &did,
            Some("did:web:example.com#key-0"),
            &MockFetcher(document),
            FetchBudget::documents(),
        )
        .await
        .expect("should resolve");
        assert_eq!(resolved, vk_a);
    }

    #[tokio::test]
    async fn network_failure_collapses() {
        let did = Did::parse("did:web:example.com").expect("should parse");
        let err = resolve(&did, None, &FailingFetcher, FetchBudget::documents())
            .await
            .expect_err("should fail");
        assert_eq!(err, Error::DidResolutionFailed);
    }

    #[tokio::test]
    async fn empty_document_fails() {
        let did = Did::parse("did:web:example.com").expect("should parse");
        let err = resolve(&did, None, &MockFetcher(json!({})), FetchBudget::documents())
            .await
            .expect_err("should fail");
        assert_eq!(err, Error::DidResolutionFailed);
    }
}
