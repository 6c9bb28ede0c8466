//! # JSON Canonicalization
//!
//! RFC 8785 (JCS) canonical byte encoding of JSON values: object members
//! sorted by UTF-16 code unit order, no insignificant whitespace, ECMA-262
//! number serialization. Structurally equal values canonicalize to
//! byte-identical output.
//!
//! Used exclusively as input to SHA-256 when signing and verifying
//! manifests.

use serde::Serialize;

use crate::crypto;
use crate::error::Error;

/// Canonical UTF-8 bytes of a JSON value.
///
/// # Errors
///
/// Returns `Internal` if the value cannot be represented as JSON (for
/// example a non-finite float).
pub fn to_canonical_vec<T: Serialize>(value: &T) -> crate::Result<Vec<u8>> {
    serde_json_canonicalizer::to_vec(value).map_err(|err| {
        tracing::error!("canonicalization failed: {err}");
        Error::Internal
    })
}

/// SHA-256 digest of the canonical bytes of a JSON value.
///
/// # Errors
///
/// Returns `Internal` if the value cannot be canonicalized.
pub fn digest<T: Serialize>(value: &T) -> crate::Result<[u8; 32]> {
    Ok(crypto::sha256(&to_canonical_vec(value)?))
}
