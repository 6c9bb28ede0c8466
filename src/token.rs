//! # Bearer Tokens
//!
//! Self-contained signed tokens carrying the claims minted after a
//! successful verification. No server-side state: validation is by
//! signature and claims alone.
//!
//! Two algorithms are supported: HS256 with a symmetric secret, and
//! EdDSA with an Ed25519 keypair. The signing key is injected at
//! construction and never logged or serialized.

use base64ct::{Base64UrlUnpadded, Encoding as _};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey as _;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::Error;

/// Claims carried by an issued token.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Configured issuer.
    pub iss: String,

    /// The agent's DID.
    pub sub: String,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,

    /// Unique token id, 16 random bytes hex-encoded.
    pub jti: String,

    /// Space-separated capability scope.
    pub scope: String,

    /// Agent display name from the verified manifest.
    pub agent_name: String,

    /// Agent software version from the verified manifest.
    pub agent_version: String,

    /// Sequence of the manifest presented at verification.
    pub manifest_sequence: u64,
}

/// Signing key material for the token service.
pub enum TokenKey<'a> {
    /// HS256 with a symmetric secret.
    Hs256(&'a [u8]),

    /// EdDSA with an Ed25519 signing key.
    EdDsa(&'a SigningKey),
}

/// Issues and validates bearer tokens.
pub struct TokenService {
    issuer: String,
    lifetime_secs: u64,
    clock_skew_secs: u64,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    /// Build a token service from injected key material.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if an Ed25519 key cannot be exported for the
    /// JWT library.
    pub fn new(
        issuer: impl Into<String>, key: &TokenKey<'_>, lifetime_secs: u64, clock_skew_secs: u64,
    ) -> crate::Result<Self> {
        let (algorithm, encoding_key, decoding_key) = match key {
            TokenKey::Hs256(secret) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret),
                DecodingKey::from_secret(secret),
            ),
            TokenKey::EdDsa(signing_key) => {
                let der = signing_key.to_pkcs8_der().map_err(|err| {
                    tracing::error!("exporting signing key failed: {err}");
                    Error::Internal
                })?;
                let public = Base64UrlUnpadded::encode_string(
                    signing_key.verifying_key().as_bytes(),
                );
                let decoding_key = DecodingKey::from_ed_components(&public).map_err(|err| {
                    tracing::error!("importing verifying key failed: {err}");
                    Error::Internal
                })?;
                (Algorithm::EdDSA, EncodingKey::from_ed_der(der.as_bytes()), decoding_key)
            }
        };
        Ok(Self {
            issuer: issuer.into(),
            lifetime_secs,
            clock_skew_secs,
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// Token lifetime in seconds.
    #[must_use]
    pub const fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }

    /// Mint a token for a verified agent.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if signing fails.
    pub fn issue(
        &self, did: &str, scope: &str, agent_name: &str, agent_version: &str,
        manifest_sequence: u64,
    ) -> crate::Result<(String, TokenClaims)> {
        let iat = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: did.to_string(),
            iat,
            exp: iat + i64::try_from(self.lifetime_secs).unwrap_or(i64::MAX),
            jti: hex::encode(crypto::random_bytes::<16>()),
            scope: scope.to_string(),
            agent_name: agent_name.to_string(),
            agent_version: agent_version.to_string(),
            manifest_sequence,
        };
        let token = jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|err| {
                tracing::error!("token signing failed: {err}");
                Error::Internal
            })?;
        Ok((token, claims))
    }

    /// Validate a token and return its claims.
    ///
    /// Expiry is checked with the configured clock skew as leeway, in the
    /// past direction only. Wrong issuer, bad signature, expiry, and a
    /// missing `sub` or `scope` all surface as `InvalidToken`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` on any validation failure.
    pub fn validate(&self, token: &str) -> crate::Result<TokenClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.clock_skew_secs;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|err| {
                tracing::debug!("token validation failed: {err}");
                Error::InvalidToken
            })?;
        if data.claims.sub.is_empty() || data.claims.scope.is_empty() {
            return Err(Error::InvalidToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(key: &TokenKey<'_>) -> TokenService {
        TokenService::new("https://auth.example.com", key, 3600, 60).expect("should build")
    }

    #[test]
    fn hs256_round_trip() {
        let service = service(&TokenKey::Hs256(b"0123456789abcdef0123456789abcdef"));
        let (token, claims) =
            service.issue("did:key:zAgent", "agent read", "Example", "1.0.0", 3)
                .expect("should issue");

        let validated = service.validate(&token).expect("should validate");
        assert_eq!(validated, claims);
        assert_eq!(validated.exp - validated.iat, 3600);
        assert_eq!(validated.jti.len(), 32);
        assert_eq!(validated.manifest_sequence, 3);
    }

    #[test]
    fn eddsa_round_trip() {
        let (signing_key, _) = crypto::generate_keypair();
        let service = service(&TokenKey::EdDsa(&signing_key));
        let (token, _) =
            service.issue("did:key:zAgent", "agent", "Example", "1.0.0", 1).expect("should issue");
        let validated = service.validate(&token).expect("should validate");
        assert_eq!(validated.sub, "did:key:zAgent");
    }

    #[test]
    fn wrong_issuer_rejected() {
        let secret = TokenKey::Hs256(b"0123456789abcdef0123456789abcdef");
        let issuing = service(&secret);
        let other = TokenService::new("https://other.example.com", &secret, 3600, 60)
            .expect("should build");

        let (token, _) =
            issuing.issue("did:key:zAgent", "agent", "Example", "1.0.0", 1).expect("should issue");
        assert_eq!(other.validate(&token).expect_err("should fail"), Error::InvalidToken);
    }

    #[test]
    fn wrong_key_rejected() {
        let issuing = service(&TokenKey::Hs256(b"secret-one-secret-one-secret-one"));
        let validating = service(&TokenKey::Hs256(b"secret-two-secret-two-secret-two"));

        let (token, _) =
            issuing.issue("did:key:zAgent", "agent", "Example", "1.0.0", 1).expect("should issue");
        assert_eq!(validating.validate(&token).expect_err("should fail"), Error::InvalidToken);
    }

    #[test]
    fn garbage_rejected() {
        let service = service(&TokenKey::Hs256(b"0123456789abcdef0123456789abcdef"));
        assert_eq!(service.validate("not.a.token").expect_err("should fail"), Error::InvalidToken);
    }
}
