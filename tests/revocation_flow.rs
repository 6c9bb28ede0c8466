//! Revocation checks during verification: a revoked manifest is refused,
//! while an unreachable revocation endpoint fails open.

use std::collections::HashMap;

use chrono::Utc;

use agent_auth::config::AuthConfig;
use agent_auth::error::Error;
use agent_auth::fetch::{FetchBudget, HttpFetch};
use agent_auth::handler::{AuthHandler, ChallengeRequest, VerifyRequest};
use agent_auth::store::{
    AclEntry, AclStore, AgentStatus, MemoryAclStore, MemoryChallengeStore,
};
use agent_auth::token::TokenKey;
use test_agent::{AgentKeyring, ManifestBuilder};

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
const ENDPOINT: &str = "https://revocation.example.com/status";

#[derive(Default)]
struct MockFetcher(HashMap<String, Vec<u8>>);

impl HttpFetch for MockFetcher {
    async fn fetch(&self, url: &str, _budget: FetchBudget) -> anyhow::Result<Vec<u8>> {
        self.0.get(url).cloned().ok_or_else(|| anyhow::anyhow!("no response for {url}"))
    }
}

async fn run_verify(fetcher: MockFetcher) -> Result<(), Error> {
    let keyring = AgentKeyring::generate();
    let acl = MemoryAclStore::new();
    acl.set(AclEntry {
        did: keyring.did().to_string(),
        status: AgentStatus::Approved,
        manifest_sequence: 0,
        registered_at: Utc::now(),
        updated_at: Utc::now(),
        reason: None,
        metadata: None,
    })
    .await
    .expect("should set entry");

    let config = AuthConfig::default();
    let challenges = MemoryChallengeStore::new(config.clock_skew_secs);
    let handler =
        AuthHandler::with_parts(config, &TokenKey::Hs256(SECRET), challenges, acl, fetcher)
            .expect("should build handler");

    let issued = handler
        .challenge(ChallengeRequest { did: keyring.did().to_string() }, None)
        .await
        .expect("should issue challenge");
    let result = handler
        .verify(
            VerifyRequest {
                did: keyring.did().to_string(),
                challenge: issued.challenge.clone(),
                signature: keyring.sign_challenge(&issued.challenge, &issued.expires_at),
                manifest: ManifestBuilder::new(&keyring)
                    .revocation(ENDPOINT)
                    .sign()
                    .expect("should sign"),
            },
            None,
        )
        .await
        .map(|_| ());
    handler.dispose();
    result
}

#[tokio::test]
async fn revoked_manifest_is_refused() {
    let mut fetcher = MockFetcher::default();
    fetcher.0.insert(
        ENDPOINT.to_string(),
        serde_json::to_vec(&serde_json::json!({"revoked": true, "reason": "compromised key"}))
            .expect("should serialize"),
    );
    let err = run_verify(fetcher).await.expect_err("should be refused");
    assert_eq!(err, Error::ManifestRevoked);
    assert_eq!(err.status(), 403);
}

#[tokio::test]
async fn active_manifest_passes() {
    let mut fetcher = MockFetcher::default();
    fetcher.0.insert(
        ENDPOINT.to_string(),
        serde_json::to_vec(&serde_json::json!({"revoked": false})).expect("should serialize"),
    );
    run_verify(fetcher).await.expect("should verify");
}

#[tokio::test]
async fn unreachable_endpoint_fails_open() {
    run_verify(MockFetcher::default()).await.expect("should fail open");
}
