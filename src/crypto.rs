//! # Ed25519 Primitives
//!
//! Keypair generation, detached signing and verification per RFC 8032,
//! plus the random-byte and SHA-256 primitives the rest of the engine
//! builds on.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::RngCore as _;
use rand::rngs::OsRng;
use sha2::{Digest as _, Sha256};

use crate::error::Error;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Generate an Ed25519 keypair from the operating system's CSPRNG.
#[must_use]
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Produce a detached signature over `message`.
///
/// Ed25519 signing is deterministic: the same message and key always yield
/// byte-identical output.
#[must_use]
pub fn sign(message: &[u8], signing_key: &SigningKey) -> [u8; SIGNATURE_LENGTH] {
    signing_key.sign(message).to_bytes()
}

/// Verify a detached signature over `message`.
///
/// Returns `false` for a well-formed signature that does not verify.
///
/// # Errors
///
/// Returns `InvalidRequest` only when `signature` is not exactly 64 bytes.
pub fn verify(
    signature: &[u8], message: &[u8], verifying_key: &VerifyingKey,
) -> crate::Result<bool> {
    let bytes: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| Error::InvalidRequest("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&bytes);
    Ok(verifying_key.verify(message, &signature).is_ok())
}

/// Construct a verifying key from raw bytes.
///
/// # Errors
///
/// Returns `InvalidRequest` when the input is not 32 bytes or does not
/// encode a valid curve point.
pub fn verifying_key(bytes: &[u8]) -> crate::Result<VerifyingKey> {
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| Error::InvalidRequest("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| Error::InvalidRequest("invalid Ed25519 public key".into()))
}

/// Fill a buffer of `N` bytes from the operating system's CSPRNG.
#[must_use]
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// SHA-256 digest.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}
