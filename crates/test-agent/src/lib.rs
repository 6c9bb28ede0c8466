//! # Test Agent
//!
//! The client half of the wire contract, for tests: an Ed25519 keyring
//! bound to a DID, a manifest builder producing `Ed25519Signature2020`
//! proofs over the JCS-canonicalized manifest, and the challenge-response
//! signer.

use chrono::{Duration, SecondsFormat, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde_json::{Value, json};

use agent_auth::manifest::{
    Capabilities, Interface, Manifest, Metadata, PROOF_PURPOSE, PROOF_TYPE, Proof, Protocol,
    RevocationPolicy,
};
use agent_auth::{codec, crypto, did};

/// An agent-side Ed25519 keyring bound to a DID.
pub struct AgentKeyring {
    signing_key: SigningKey,
    multikey: String,
    did: String,
    verification_method: String,
}

impl AgentKeyring {
    /// Generate a keyring with a `did:key` identity derived from the
    /// public key.
    #[must_use]
    pub fn generate() -> Self {
        let (signing_key, verifying_key) = crypto::generate_keypair();
        let multikey = multikey(&verifying_key);
        let did = did::key::from_public_key(&verifying_key);
        let verification_method = format!("{did}#{multikey}");
        Self { signing_key, multikey, did, verification_method }
    }

    /// Generate a keyring with a `did:web` identity for the given
    /// identifier, for example `example.com` or `example.com:agents:alpha`.
    #[must_use]
    pub fn generate_web(identifier: &str) -> Self {
        let (signing_key, verifying_key) = crypto::generate_keypair();
        let multikey = multikey(&verifying_key);
        let did = format!("did:web:{identifier}");
        let verification_method = format!("{did}#key-0");
        Self { signing_key, multikey, did, verification_method }
    }

    /// The agent's DID.
    #[must_use]
    pub fn did(&self) -> &str {
        &self.did
    }

    /// DID URL of the keyring's verification method.
    #[must_use]
    pub fn verification_method(&self) -> &str {
        &self.verification_method
    }

    /// The agent's public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Detached signature over raw bytes.
    #[must_use]
    pub fn sign_bytes(&self, message: &[u8]) -> [u8; 64] {
        crypto::sign(message, &self.signing_key)
    }

    /// Sign a challenge response: the multibase-encoded signature over
    /// `SHA-256(challenge "." did "." expires_at)`, with `expires_at`
    /// exactly as returned by the challenge operation.
    #[must_use]
    pub fn sign_challenge(&self, challenge: &str, expires_at: &str) -> String {
        let input = format!("{challenge}.{}.{expires_at}", self.did);
        codec::encode(&self.sign_bytes(&crypto::sha256(input.as_bytes())))
    }

    /// DID document publishing this keyring's public key, for serving to
    /// a mocked fetcher in `did:web` tests.
    #[must_use]
    pub fn did_document(&self) -> Value {
        json!({
            "id": self.did,
            "verificationMethod": [{
                "id": self.verification_method,
                "type": "Ed25519VerificationKey2020",
                "controller": self.did,
                "publicKeyMultibase": self.multikey,
            }],
            "assertionMethod": [self.verification_method],
        })
    }
}

fn multikey(verifying_key: &VerifyingKey) -> String {
    let mut bytes = agent_auth::ED25519_CODEC.to_vec();
    bytes.extend_from_slice(verifying_key.as_bytes());
    codec::encode(&bytes)
}

fn rfc3339(offset: Duration) -> String {
    (Utc::now() + offset).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds manifests for a keyring, signed or unsigned.
pub struct ManifestBuilder<'a> {
    keyring: &'a AgentKeyring,
    sequence: u64,
    valid_until: String,
    name: String,
    description: String,
    agent_version: String,
    revocation: Option<RevocationPolicy>,
    interface_url: String,
}

impl<'a> ManifestBuilder<'a> {
    /// Start a builder with a 30-day validity window and one https
    /// interface.
    #[must_use]
    pub fn new(keyring: &'a AgentKeyring) -> Self {
        Self {
            keyring,
            sequence: 1,
            valid_until: rfc3339(Duration::days(30)),
            name: "Test Agent".to_string(),
            description: "Agent used in tests.".to_string(),
            agent_version: "0.1.0".to_string(),
            revocation: None,
            interface_url: "https://api.example.com".to_string(),
        }
    }

    /// Set the manifest sequence.
    #[must_use]
    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the end of the validity window.
    #[must_use]
    pub fn valid_until(mut self, valid_until: impl Into<String>) -> Self {
        self.valid_until = valid_until.into();
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare a revocation endpoint.
    #[must_use]
    pub fn revocation(mut self, endpoint: impl Into<String>) -> Self {
        self.revocation = Some(RevocationPolicy { endpoint: endpoint.into(), check_interval: None });
        self
    }

    /// Build the manifest without a proof.
    #[must_use]
    pub fn build(&self) -> Manifest {
        let created = rfc3339(Duration::zero());
        Manifest {
            version: "1.0.0".to_string(),
            id: self.keyring.did.clone(),
            sequence: self.sequence,
            created_at: created.clone(),
            updated_at: created,
            valid_until: self.valid_until.clone(),
            revocation: self.revocation.clone(),
            metadata: Metadata {
                name: self.name.clone(),
                description: self.description.clone(),
                agent_version: self.agent_version.clone(),
                tags: None,
                homepage: None,
                logo: None,
                operator: None,
            },
            capabilities: Capabilities {
                interfaces: vec![Interface {
                    protocol: Protocol::Https,
                    url: self.interface_url.clone(),
                    api_standard: None,
                    methods: None,
                    schema_ref: None,
                }],
                categories: None,
                permissions_required: None,
            },
            proof: None,
        }
    }

    /// Build and sign with the builder's own keyring.
    ///
    /// # Errors
    ///
    /// Fails if the manifest cannot be canonicalized.
    pub fn sign(&self) -> anyhow::Result<Manifest> {
        self.signed_by(self.keyring)
    }

    /// Build with this builder's identity but sign with another keyring.
    /// Verification of the result must fail.
    ///
    /// # Errors
    ///
    /// Fails if the manifest cannot be canonicalized.
    pub fn signed_by(&self, signer: &AgentKeyring) -> anyhow::Result<Manifest> {
        let mut manifest = self.build();
        let digest = manifest.signing_digest()?;
        let signature = signer.sign_bytes(&digest);
        manifest.proof = Some(Proof {
            type_: PROOF_TYPE.to_string(),
            created: rfc3339(Duration::zero()),
            verification_method: self.keyring.verification_method.clone(),
            proof_purpose: PROOF_PURPOSE.to_string(),
            proof_value: codec::encode(&signature),
        });
        Ok(manifest)
    }
}
