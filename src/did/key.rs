//! # DID Key
//!
//! The `did:key` method encodes an Ed25519 public key directly in the
//! identifier: `did:key:z...` is the multibase encoding of the two-byte
//! Ed25519 multicodec prefix followed by the 32-byte key. Resolution is
//! offline and total.
//!
//! See <https://w3c-ccg.github.io/did-method-key>.

use ed25519_dalek::VerifyingKey;

use super::Did;
use crate::error::Error;
use crate::{ED25519_CODEC, codec, crypto};

/// Resolve a `did:key` identifier to its Ed25519 public key.
///
/// # Errors
///
/// Returns `DidResolutionFailed` when the identifier lacks the `z`
/// prefix, does not decode to exactly 34 bytes, or does not carry the
/// Ed25519 multicodec prefix.
pub fn resolve(did: &Did) -> crate::Result<VerifyingKey> {
    decode_multibase_key(&did.identifier)
}

/// Derive the `did:key` form of an Ed25519 public key.
#[must_use]
pub fn from_public_key(verifying_key: &VerifyingKey) -> String {
    let mut bytes = ED25519_CODEC.to_vec();
    bytes.extend_from_slice(verifying_key.as_bytes());
    format!("did:key:{}", codec::encode(&bytes))
}

/// Decode a multibase-encoded, multicodec-prefixed Ed25519 public key.
///
/// This is the shared decoding path for `did:key` identifiers and
/// `publicKeyMultibase` entries in DID documents.
///
/// # Errors
///
/// Returns `DidResolutionFailed` on any structural deviation.
pub(crate) fn decode_multibase_key(multikey: &str) -> crate::Result<VerifyingKey> {
    if !multikey.starts_with('z') {
        tracing::debug!("multikey is not base58btc encoded");
        return Err(Error::DidResolutionFailed);
    }
    let bytes = codec::decode(multikey).map_err(|_| Error::DidResolutionFailed)?;
    if bytes.len() != 34 {
        tracing::debug!("multikey decodes to {} bytes, expected 34", bytes.len());
        return Err(Error::DidResolutionFailed);
    }
    if bytes[0..2] != ED25519_CODEC {
        tracing::debug!("multikey does not carry the Ed25519 multicodec prefix");
        return Err(Error::DidResolutionFailed);
    }
    crypto::verifying_key(&bytes[2..34]).map_err(|_| Error::DidResolutionFailed)
}
