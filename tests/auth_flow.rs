//! End-to-end authentication flows for `did:key` agents: the full happy
//! path, replay, rollback, and tampering.

use chrono::Utc;

use agent_auth::config::AuthConfig;
use agent_auth::error::Error;
use agent_auth::fetch::WebFetcher;
use agent_auth::handler::{AuthHandler, ChallengeRequest, VerifyRequest};
use agent_auth::store::{
    AclEntry, AclStore, AgentStatus, MemoryAclStore, MemoryChallengeStore,
};
use agent_auth::token::TokenKey;
use test_agent::{AgentKeyring, ManifestBuilder};

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

fn handler(
    acl: MemoryAclStore,
) -> AuthHandler<MemoryChallengeStore, MemoryAclStore, WebFetcher> {
    let config = AuthConfig::default();
    let challenges = MemoryChallengeStore::new(config.clock_skew_secs);
    AuthHandler::with_parts(config, &TokenKey::Hs256(SECRET), challenges, acl, WebFetcher)
        .expect("should build handler")
}

async fn approve(acl: &MemoryAclStore, did: &str) {
    acl.set(AclEntry {
        did: did.to_string(),
        status: AgentStatus::Approved,
        manifest_sequence: 0,
        registered_at: Utc::now(),
        updated_at: Utc::now(),
        reason: None,
        metadata: None,
    })
    .await
    .expect("should set entry");
}

#[tokio::test]
async fn happy_path() {
    let keyring = AgentKeyring::generate();
    let acl = MemoryAclStore::new();
    approve(&acl, keyring.did()).await;
    let handler = handler(acl.clone());

    let issued = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect("should issue challenge");
    assert_eq!(issued.challenge.len(), 64);
    assert!(issued.challenge.chars().all(|c| c.is_ascii_hexdigit()));

    let manifest = ManifestBuilder::new(&keyring).sign().expect("should sign");
    let response = handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: keyring.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest,
            },
            None,
        )
        .await
        .expect("should verify");

    assert_eq!(response.agent.did, keyring.did());
    assert_eq!(response.agent.capabilities, vec!["agent".to_string()]);

    let claims = handler.validate_token(&response.token).expect("should validate");
    assert_eq!(claims.sub, keyring.did());
    assert_eq!(claims.exp - claims.iat, 3600);
    assert_eq!(claims.manifest_sequence, 1);

    let bearer = handler
        .authenticate_bearer(&format!("Bearer {}", response.token))
        .expect("should authenticate");
    assert_eq!(bearer.scope, "agent");

    assert!(handler.cached_manifest(keyring.did()).is_some());
    handler.dispose();
}

#[tokio::test]
async fn replayed_challenge_is_rejected() {
    let keyring = AgentKeyring::generate();
    let acl = MemoryAclStore::new();
    approve(&acl, keyring.did()).await;
    let handler = handler(acl);

    let issued = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect("should issue challenge");
    let signature = keyring.sign_challenge(&issued.challenge, &issued.expires_at);
    let request = VerifyRequest {
        did: keyring.did().to_string(),
        challenge: issued.challenge,
        signature,
        manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
    };

    handler.verify(request.clone(), None).await.expect("first verify should pass");

    let mut replay = request;
    replay.manifest = ManifestBuilder::new(&keyring).sequence(2).sign().expect("should sign");
    let err = handler.verify(replay, None).await.expect_err("replay should fail");
    assert_eq!(err, Error::ChallengeAlreadyUsed);
    handler.dispose();
}

#[tokio::test]
async fn sequence_rollback_is_rejected() {
    let keyring = AgentKeyring::generate();
    let acl = MemoryAclStore::new();
    approve(&acl, keyring.did()).await;
    let handler = handler(acl.clone());

    let issued = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect("should issue challenge");
    handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: keyring.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
            },
            None,
        )
        .await
        .expect("should verify");

    // Re-presenting sequence 1 on a fresh challenge is a rollback.
    let issued = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect("should issue challenge");
    let err = handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: keyring.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
            },
            None,
        )
        .await
        .expect_err("rollback should fail");
    assert_eq!(err, Error::ManifestRollback { presented: 1, stored: 1 });

    // The failed attempt must not have consumed the challenge; sequence 2
    // succeeds on the same one.
    let response = handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: keyring.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest: ManifestBuilder::new(&keyring).sequence(2).sign().expect("should sign"),
            },
            None,
        )
        .await
        .expect("sequence 2 should verify");
    let claims = handler.validate_token(&response.token).expect("should validate");
    assert_eq!(claims.manifest_sequence, 2);
    handler.dispose();
}

#[tokio::test]
async fn tampered_manifest_leaves_no_trace() {
    let keyring = AgentKeyring::generate();
    let acl = MemoryAclStore::new();
    approve(&acl, keyring.did()).await;
    let handler = handler(acl.clone());

    let issued = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect("should issue challenge");
    let mut manifest = ManifestBuilder::new(&keyring).sign().expect("should sign");
    manifest.metadata.name = "Tampered Agent".to_string();

    let err = handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: keyring.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest,
            },
            None,
        )
        .await
        .expect_err("tampered manifest should fail");
    assert_eq!(err, Error::InvalidManifestSignature);

    // No sequence was recorded and the challenge survived the failure.
    assert_eq!(acl.max_sequence(keyring.did()).await.expect("should read"), 0);
    let response = handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: keyring.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
            },
            None,
        )
        .await
        .expect("intact manifest should verify");
    assert!(!response.token.is_empty());
    handler.dispose();
}

#[tokio::test]
async fn wrong_signer_is_rejected() {
    let keyring = AgentKeyring::generate();
    let stranger = AgentKeyring::generate();
    let acl = MemoryAclStore::new();
    approve(&acl, keyring.did()).await;
    let handler = handler(acl);

    let issued = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect("should issue challenge");

    // The challenge signature comes from the wrong key.
    let err = handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: stranger.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
            },
            None,
        )
        .await
        .expect_err("wrong signer should fail");
    assert_eq!(err, Error::InvalidSignature);
    handler.dispose();
}
