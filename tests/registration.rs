//! Self-registration: pending entries, idempotent re-registration, the
//! registration observer, and the disabled-by-default gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use agent_auth::config::AuthConfig;
use agent_auth::error::Error;
use agent_auth::fetch::WebFetcher;
use agent_auth::handler::{AuthHandler, ChallengeRequest, RegisterRequest};
use agent_auth::store::{AclStore, AgentStatus, MemoryAclStore, MemoryChallengeStore};
use agent_auth::token::TokenKey;
use test_agent::{AgentKeyring, ManifestBuilder};

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

fn open_handler(
    acl: MemoryAclStore,
) -> AuthHandler<MemoryChallengeStore, MemoryAclStore, WebFetcher> {
    let config = AuthConfig { enable_registration: true, ..AuthConfig::default() };
    let challenges = MemoryChallengeStore::new(config.clock_skew_secs);
    AuthHandler::with_parts(config, &TokenKey::Hs256(SECRET), challenges, acl, WebFetcher)
        .expect("should build handler")
}

#[tokio::test]
async fn registration_creates_pending_entry() {
    let acl = MemoryAclStore::new();
    let handler = open_handler(acl.clone());
    let keyring = AgentKeyring::generate();

    let response = handler
        .register(
            RegisterRequest {
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
                reason: Some("nightly index sync".to_string()),
            },
            None,
        )
        .await
        .expect("should register");

    assert_eq!(response.did, keyring.did());
    assert_eq!(response.status, AgentStatus::PendingApproval);
    assert_eq!(response.retry_after, Some(3600));

    let entry = acl.get(keyring.did()).await.expect("should read").expect("should exist");
    assert_eq!(entry.status, AgentStatus::PendingApproval);
    assert_eq!(entry.manifest_sequence, 1);
    assert_eq!(entry.reason.as_deref(), Some("nightly index sync"));
    let metadata = entry.metadata.expect("should capture metadata");
    assert_eq!(metadata["name"], "Test Agent");

    // A pending agent asking for a challenge is told to wait.
    let err = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect_err("pending agent should wait");
    assert_eq!(err, Error::DidPending { retry_after: 3600 });
    handler.dispose();
}

#[tokio::test]
async fn re_registration_reports_status_without_mutation() {
    let acl = MemoryAclStore::new();
    let handler = open_handler(acl.clone());
    let keyring = AgentKeyring::generate();

    handler
        .register(
            RegisterRequest {
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
                reason: None,
            },
            None,
        )
        .await
        .expect("should register");
    let first = acl.get(keyring.did()).await.expect("should read").expect("should exist");

    let response = handler
        .register(
            RegisterRequest {
                manifest: ManifestBuilder::new(&keyring)
                    .sequence(9)
                    .sign()
                    .expect("should sign"),
                reason: Some("please hurry".to_string()),
            },
            None,
        )
        .await
        .expect("should answer");
    assert_eq!(response.status, AgentStatus::PendingApproval);

    let unchanged = acl.get(keyring.did()).await.expect("should read").expect("should exist");
    assert_eq!(unchanged, first);
    handler.dispose();
}

#[tokio::test]
async fn observer_sees_new_registrations() {
    let seen = Arc::new(AtomicUsize::new(0));
    let observer_seen = Arc::clone(&seen);

    let config = AuthConfig { enable_registration: true, ..AuthConfig::default() };
    let challenges = MemoryChallengeStore::new(config.clock_skew_secs);
    let handler = AuthHandler::with_parts(
        config,
        &TokenKey::Hs256(SECRET),
        challenges,
        MemoryAclStore::new(),
        WebFetcher,
    )
    .expect("should build handler")
    .with_registration_observer(move |entry| {
        assert_eq!(entry.status, AgentStatus::PendingApproval);
        observer_seen.fetch_add(1, Ordering::SeqCst);
    });

    let keyring = AgentKeyring::generate();
    let request = RegisterRequest {
        manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
        reason: None,
    };
    handler.register(request.clone(), None).await.expect("should register");
    handler.register(request, None).await.expect("should answer");

    // Only the insertion notifies, not the repeat.
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    handler.dispose();
}

#[tokio::test]
async fn registration_disabled_by_default() {
    let challenges = MemoryChallengeStore::new(60);
    let handler = AuthHandler::with_parts(
        AuthConfig::default(),
        &TokenKey::Hs256(SECRET),
        challenges,
        MemoryAclStore::new(),
        WebFetcher,
    )
    .expect("should build handler");

    let keyring = AgentKeyring::generate();
    let err = handler
        .register(
            RegisterRequest {
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
                reason: None,
            },
            None,
        )
        .await
        .expect_err("should be disabled");
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(err.body()["error"]["code"], "AUTH_INVALID_REQUEST");
    handler.dispose();
}

#[tokio::test]
async fn unsigned_manifest_cannot_register() {
    let handler = open_handler(MemoryAclStore::new());
    let keyring = AgentKeyring::generate();

    let err = handler
        .register(
            RegisterRequest { manifest: ManifestBuilder::new(&keyring).build(), reason: None },
            None,
        )
        .await
        .expect_err("unsigned manifest should fail");
    assert!(matches!(err, Error::InvalidRequest(_)));
    handler.dispose();
}

#[tokio::test]
async fn oversized_reason_rejected() {
    let handler = open_handler(MemoryAclStore::new());
    let keyring = AgentKeyring::generate();

    let err = handler
        .register(
            RegisterRequest {
                manifest: ManifestBuilder::new(&keyring).sign().expect("should sign"),
                reason: Some("r".repeat(1025)),
            },
            None,
        )
        .await
        .expect_err("oversized reason should fail");
    assert!(matches!(err, Error::InvalidRequest(_)));
    handler.dispose();
}
