//! # Manifest Verification
//!
//! The verification pipeline for signed manifests: structural validation,
//! proof extraction, key resolution, JCS digest, signature check and
//! temporal checks.

use chrono::{Duration, Utc};

use super::Manifest;
use crate::error::Error;
use crate::fetch::{FetchBudget, HttpFetch};
use crate::{codec, crypto, did};

/// Maximum distance of `valid_until` into the future.
const MAX_VALIDITY_DAYS: i64 = 365;

/// Verify a signed manifest.
///
/// Clock skew is applied only in the past direction: a manifest whose
/// `valid_until` passed less than `clock_skew_secs` ago is still
/// accepted, but a window reaching further than 365 days into the future
/// never is.
///
/// # Errors
///
/// - `InvalidRequest` for structural violations or an over-long validity
///   window;
/// - `DidResolutionFailed` / `UnsupportedDidMethod` when the proof's key
///   cannot be resolved;
/// - `InvalidManifestSignature` when the signature does not verify;
/// - `ManifestExpired` when the validity window has passed.
pub async fn verify(
    manifest: &Manifest, fetcher: &impl HttpFetch, budget: FetchBudget, clock_skew_secs: u64,
) -> crate::Result<()> {
    manifest.validate()?;
    let Some(proof) = &manifest.proof else {
        return Err(Error::InvalidRequest("manifest proof is missing".into()));
    };

    let verifying_key = did::resolve_key(&proof.verification_method, fetcher, budget).await?;

    let digest = manifest.signing_digest()?;
    let signature =
        codec::decode(&proof.proof_value).map_err(|_| Error::InvalidManifestSignature)?;
    if signature.len() != crypto::SIGNATURE_LENGTH {
        return Err(Error::InvalidManifestSignature);
    }
    if !crypto::verify(&signature, &digest, &verifying_key)? {
        return Err(Error::InvalidManifestSignature);
    }

    let valid_until = super::parse_timestamp(&manifest.valid_until, "valid_until")?.to_utc();
    let now = Utc::now();
    let skew = crate::config::seconds(clock_skew_secs);
    if valid_until + skew < now {
        return Err(Error::ManifestExpired);
    }
    if valid_until > now + Duration::days(MAX_VALIDITY_DAYS) {
        return Err(Error::InvalidRequest(
            "manifest valid_until must be within 365 days".into(),
        ));
    }
    Ok(())
}
