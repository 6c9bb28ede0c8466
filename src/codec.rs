//! # Multibase Codec
//!
//! Base58btc encoding with the `z` multibase prefix, the encoding used for
//! `did:key` identifiers, `publicKeyMultibase` entries, and signature
//! values on the wire.
//!
//! See <https://github.com/multiformats/multibase>.

use multibase::Base;

use crate::error::Error;

/// Encode bytes as `"z" || base58btc(bytes)`.
///
/// Empty input encodes to the bare prefix `"z"`.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    multibase::encode(Base::Base58Btc, bytes)
}

/// Decode a base58btc string, with or without the leading `z`.
///
/// # Errors
///
/// Returns `InvalidRequest` if the input contains a character outside the
/// Bitcoin base58 alphabet (which excludes `0`, `O`, `I` and `l`).
pub fn decode(s: &str) -> crate::Result<Vec<u8>> {
    let prefixed = if s.starts_with('z') { s.to_string() } else { format!("z{s}") };
    let (base, bytes) = multibase::decode(&prefixed)
        .map_err(|_| Error::InvalidRequest("invalid base58btc encoding".into()))?;
    if base != Base::Base58Btc {
        return Err(Error::InvalidRequest("invalid base58btc encoding".into()));
    }
    Ok(bytes)
}
