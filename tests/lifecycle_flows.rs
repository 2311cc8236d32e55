//! End-to-end lifecycle flows through the operations facade.

use async_trait::async_trait;
use bountyboard::api::{
    CancelRequest, ClaimRequest, CreateBountyRequest, CreateServiceRequest, FulfillRequest,
    MarketApi, MatchRequest, UnclaimRequest,
};
use bountyboard::bounty::BountyStatus;
use bountyboard::error::ApiError;
use bountyboard::notify::Notifier;
use bountyboard::registry::{DirectoryFetcher, RegistryCache, RegistryCacheConfig, RegistryEntry};
use bountyboard::store::MarketStore;
use bountyboard::types::Category;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

struct DeadFetcher;

#[async_trait]
impl DirectoryFetcher for DeadFetcher {
    async fn fetch_all(&self) -> Result<Vec<RegistryEntry>, ApiError> {
        Err(ApiError::UpstreamUnavailable("offline".into()))
    }
}

fn market(dir: &Path) -> MarketApi {
    let store = Arc::new(MarketStore::open(&dir.join("market")).unwrap());
    let registry = Arc::new(RegistryCache::new(
        Arc::new(DeadFetcher),
        RegistryCacheConfig::default(),
    ));
    let notifier = Notifier::new(None, Duration::from_secs(5)).unwrap();
    MarketApi::new(store, registry, notifier, Some("operator".into()))
}

fn physical_bounty() -> CreateBountyRequest {
    CreateBountyRequest {
        poster_name: "claw-poster".into(),
        poster_callback_url: None,
        title: "Print a mounting bracket".into(),
        description: "PETG bracket, 4mm holes".into(),
        requirements: None,
        budget: 50.0,
        category: Category::Physical,
        tags: Some("3d-print,bracket".into()),
        expires_at: None,
    }
}

#[test]
fn end_to_end_bounty_walk() {
    let dir = tempfile::tempdir().unwrap();
    let api = market(dir.path());

    // Post: returns id and the poster secret exactly once.
    let created = api.create_bounty(physical_bounty()).unwrap();
    let id = created.bounty.id;
    assert_eq!(created.bounty.status, BountyStatus::Open);
    assert_eq!(created.action, "posted");
    assert!(!created.poster_secret.is_empty());

    // Claim: status moves, claimer secret issued.
    let claimed = api
        .claim_bounty(
            id,
            ClaimRequest {
                claimer_name: "worker-1".into(),
                claimer_callback_url: None,
            },
        )
        .unwrap();
    assert_eq!(claimed.status, BountyStatus::Claimed);
    assert!(!claimed.claimer_secret.is_empty());

    // Unclaim with the claimer secret: open again.
    let released = api
        .unclaim_bounty(
            id,
            UnclaimRequest {
                claimer_secret: claimed.claimer_secret,
            },
        )
        .unwrap();
    assert_eq!(released.status, BountyStatus::Open);
    assert!(released.claimed_by.is_none());

    // A second claimer succeeds.
    let reclaimed = api
        .claim_bounty(
            id,
            ClaimRequest {
                claimer_name: "worker-2".into(),
                claimer_callback_url: None,
            },
        )
        .unwrap();
    assert_eq!(reclaimed.claimed_by, "worker-2");

    // Cancel with the poster secret: terminal, claimer evicted.
    let cancelled = api
        .cancel_bounty(
            id,
            CancelRequest {
                poster_secret: created.poster_secret.clone(),
            },
        )
        .unwrap();
    assert_eq!(cancelled.status, BountyStatus::Cancelled);
    assert!(cancelled.claimed_by.is_none());

    // Any further claim is a conflict.
    let err = api
        .claim_bounty(
            id,
            ClaimRequest {
                claimer_name: "late".into(),
                claimer_callback_url: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict));
}

#[test]
fn match_then_fulfill_records_acp_linkage() {
    let dir = tempfile::tempdir().unwrap();
    let api = market(dir.path());

    let created = api.create_bounty(physical_bounty()).unwrap();
    let id = created.bounty.id;
    api.claim_bounty(
        id,
        ClaimRequest {
            claimer_name: "worker".into(),
            claimer_callback_url: None,
        },
    )
    .unwrap();

    let matched = api
        .match_bounty(
            id,
            MatchRequest {
                poster_secret: created.poster_secret.clone(),
                service_id: None,
                acp_agent_wallet: "0xprinter".into(),
                acp_job_offering: "bracket-print".into(),
            },
        )
        .unwrap();
    assert_eq!(matched.status, BountyStatus::Matched);
    assert_eq!(matched.matched_acp_agent.as_deref(), Some("0xprinter"));

    let fulfilled = api
        .fulfill_bounty(
            id,
            FulfillRequest {
                poster_secret: created.poster_secret,
                acp_job_id: Some("acp-job-9".into()),
            },
        )
        .unwrap();
    assert_eq!(fulfilled.status, BountyStatus::Fulfilled);
    assert_eq!(fulfilled.acp_job_id.as_deref(), Some("acp-job-9"));
}

#[test]
fn wrong_secret_service_flow() {
    let dir = tempfile::tempdir().unwrap();
    let api = market(dir.path());

    let created = api
        .create_service(CreateServiceRequest {
            agent_name: "printer-agent".into(),
            name: "Bracket printing".into(),
            description: "Small PETG parts".into(),
            price: 10.0,
            category: Category::Physical,
            location: None,
            shipping_available: true,
            tags: None,
            acp_agent_wallet: None,
            acp_job_offering: None,
        })
        .unwrap();
    let id = created.service.id;
    assert!(!created.agent_secret.is_empty());

    // Wrong secret: forbidden, listing stays active.
    let err = api.deactivate_service(id, "wrong-secret").unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));
    match api.get_service(id, None).unwrap() {
        bountyboard::version::Conditional::Fresh { body, .. } => assert!(body.is_active),
        other => panic!("expected fresh payload, got {:?}", other.is_unchanged()),
    }

    // Correct secret deactivates; repeating is idempotent.
    let first = api.deactivate_service(id, &created.agent_secret).unwrap();
    assert!(!first.is_active);
    let second = api.deactivate_service(id, &created.agent_secret).unwrap();
    assert!(!second.is_active);
}

#[test]
fn conditional_read_tracks_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let api = market(dir.path());

    let created = api.create_bounty(physical_bounty()).unwrap();
    let id = created.bounty.id;

    let first = api.get_bounty(id, None).unwrap();
    let fingerprint = first.tag().as_str().to_string();

    // Same fingerprint: unchanged, no payload.
    let unchanged = api.get_bounty(id, Some(&fingerprint)).unwrap();
    assert!(unchanged.is_unchanged());

    // A mutation invalidates the old fingerprint.
    api.claim_bounty(
        id,
        ClaimRequest {
            claimer_name: "worker".into(),
            claimer_callback_url: None,
        },
    )
    .unwrap();
    let after = api.get_bounty(id, Some(&fingerprint)).unwrap();
    assert!(!after.is_unchanged());
    assert_ne!(after.tag().as_str(), fingerprint);
}

#[test]
fn list_endpoint_clamps_limit() {
    let dir = tempfile::tempdir().unwrap();
    let api = market(dir.path());
    for _ in 0..3 {
        api.create_bounty(physical_bounty()).unwrap();
    }
    let page = api
        .list_bounties(bountyboard::bounty::BountyFilter {
            limit: 100_000,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.bounties.len(), 3);
}
