//! Bounty lifecycle operations.
//!
//! Every transition is a single compare-and-swap against the stored row:
//! the precondition (expected prior state, secret verification) is checked
//! inside the CAS closure, so concurrent callers resolve to exactly one
//! winner and losers surface `Conflict` without ever observing a partially
//! written record.

use crate::bounty::{Bounty, BountyStatus};
use crate::error::ApiError;
use crate::notify;
use crate::secret;
use crate::store::MarketStore;
use crate::types::{BountyId, Category, ServiceId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Input for posting a new bounty.
#[derive(Debug, Clone, Default)]
pub struct CreateBounty {
    pub poster_name: String,
    pub poster_callback_url: Option<String>,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub budget: f64,
    pub category: Category,
    pub tags: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A freshly created bounty plus the poster secret, returned exactly once.
#[derive(Debug, Clone)]
pub struct CreatedBounty {
    pub bounty: Bounty,
    pub poster_secret: String,
}

/// A successful claim plus the claimer secret, returned exactly once.
#[derive(Debug, Clone)]
pub struct ClaimedBounty {
    pub bounty: Bounty,
    pub claimer_secret: String,
}

/// Input for binding a claimed bounty to a registry agent/service.
#[derive(Debug, Clone, Default)]
pub struct MatchBounty {
    pub service_id: Option<ServiceId>,
    pub acp_agent_wallet: String,
    pub acp_job_offering: String,
}

/// Conjunctive list filters with pagination.
#[derive(Debug, Clone)]
pub struct BountyFilter {
    pub status: Option<BountyStatus>,
    pub category: Option<Category>,
    pub min_budget: Option<f64>,
    pub max_budget: Option<f64>,
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for BountyFilter {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            min_budget: None,
            max_budget: None,
            search: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// One page of bounties plus the total match count before pagination.
#[derive(Debug, Clone)]
pub struct BountyPage {
    pub bounties: Vec<Bounty>,
    pub total: usize,
}

/// Owns bounty state transitions and their authorization rules.
#[derive(Clone)]
pub struct BountyLifecycle {
    store: Arc<MarketStore>,
}

fn require_text(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn require_callback_url(field: &'static str, url: &Option<String>) -> Result<(), ApiError> {
    if let Some(url) = url {
        if !notify::validate_callback_url(url) {
            return Err(ApiError::validation(
                field,
                "must be a public http(s) URL; private and internal addresses are not allowed",
            ));
        }
    }
    Ok(())
}

impl BountyLifecycle {
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    /// Post a new bounty. Issues the poster secret once; only its hash is
    /// persisted.
    pub fn create(&self, req: CreateBounty) -> Result<CreatedBounty, ApiError> {
        require_text("poster_name", &req.poster_name)?;
        require_text("title", &req.title)?;
        require_text("description", &req.description)?;
        if !req.budget.is_finite() || req.budget <= 0.0 {
            return Err(ApiError::validation(
                "budget",
                "must be a finite number greater than zero",
            ));
        }
        require_callback_url("poster_callback_url", &req.poster_callback_url)?;

        let issued = secret::issue();
        let now = Utc::now();
        let bounty = Bounty {
            id: self.store.next_bounty_id()?,
            poster_name: req.poster_name,
            poster_callback_url: req.poster_callback_url,
            poster_secret_hash: Some(issued.token_hash),
            title: req.title,
            description: req.description,
            requirements: req.requirements,
            budget: req.budget,
            category: req.category,
            tags: req.tags,
            status: BountyStatus::Open,
            claimed_by: None,
            claimer_callback_url: None,
            claimer_secret_hash: None,
            claimed_at: None,
            matched_service_id: None,
            matched_acp_agent: None,
            matched_acp_job: None,
            matched_at: None,
            acp_job_id: None,
            fulfilled_at: None,
            expires_at: req.expires_at,
            created_at: now,
            updated_at: None,
        };
        self.store.insert_bounty(&bounty)?;
        info!(bounty_id = bounty.id, category = %bounty.category, "bounty posted");
        Ok(CreatedBounty {
            bounty,
            poster_secret: issued.token,
        })
    }

    /// Claim an open bounty. Exactly one concurrent claimer wins; the rest
    /// receive `Conflict`. Issues the claimer secret once.
    pub fn claim(
        &self,
        id: BountyId,
        claimer_name: &str,
        claimer_callback_url: Option<String>,
    ) -> Result<ClaimedBounty, ApiError> {
        require_text("claimer_name", claimer_name)?;
        require_callback_url("claimer_callback_url", &claimer_callback_url)?;

        let issued = secret::issue();
        let now = Utc::now();
        let bounty = self.store.update_bounty(id, |current| {
            if current.status != BountyStatus::Open {
                return Err(ApiError::Conflict);
            }
            let mut next = current.clone();
            next.status = BountyStatus::Claimed;
            next.claimed_by = Some(claimer_name.to_string());
            next.claimer_callback_url = claimer_callback_url.clone();
            next.claimer_secret_hash = Some(issued.token_hash.clone());
            next.claimed_at = Some(now);
            next.updated_at = Some(now);
            Ok(next)
        })?;
        info!(bounty_id = id, claimed_by = %claimer_name, "bounty claimed");
        Ok(ClaimedBounty {
            bounty,
            claimer_secret: issued.token,
        })
    }

    /// Release a claimed bounty back to the open pool. Requires the claimer
    /// secret; clears every claimer field so anyone may claim again.
    pub fn unclaim(&self, id: BountyId, claimer_secret: &str) -> Result<Bounty, ApiError> {
        let now = Utc::now();
        let bounty = self.store.update_bounty(id, |current| {
            if current.status != BountyStatus::Claimed {
                return Err(ApiError::Conflict);
            }
            if !secret::verify(claimer_secret, current.claimer_secret_hash.as_deref()) {
                return Err(ApiError::Forbidden);
            }
            let mut next = current.clone();
            next.status = BountyStatus::Open;
            next.claimed_by = None;
            next.claimer_callback_url = None;
            next.claimer_secret_hash = None;
            next.claimed_at = None;
            next.updated_at = Some(now);
            Ok(next)
        })?;
        info!(bounty_id = id, "bounty unclaimed");
        Ok(bounty)
    }

    /// Bind a claimed bounty to a registry agent. Requires the poster
    /// secret. When a local service id is supplied it must exist at
    /// transition time; the stored reference is a snapshot, not a live
    /// foreign key.
    pub fn match_bounty(
        &self,
        id: BountyId,
        poster_secret: &str,
        req: MatchBounty,
    ) -> Result<Bounty, ApiError> {
        require_text("acp_agent_wallet", &req.acp_agent_wallet)?;
        require_text("acp_job_offering", &req.acp_job_offering)?;
        if let Some(service_id) = req.service_id {
            if self.store.get_service(service_id)?.is_none() {
                return Err(ApiError::validation(
                    "service_id",
                    format!("service {} does not exist", service_id),
                ));
            }
        }

        let now = Utc::now();
        let bounty = self.store.update_bounty(id, |current| {
            if !secret::verify(poster_secret, current.poster_secret_hash.as_deref()) {
                return Err(ApiError::Forbidden);
            }
            if current.status != BountyStatus::Claimed {
                return Err(ApiError::Conflict);
            }
            let mut next = current.clone();
            next.status = BountyStatus::Matched;
            next.matched_service_id = req.service_id;
            next.matched_acp_agent = Some(req.acp_agent_wallet.clone());
            next.matched_acp_job = Some(req.acp_job_offering.clone());
            next.matched_at = Some(now);
            next.updated_at = Some(now);
            Ok(next)
        })?;
        info!(bounty_id = id, "bounty matched");
        Ok(bounty)
    }

    /// Mark a bounty fulfilled. Requires the poster secret. Allowed from
    /// `Claimed` as well as `Matched`: a poster may accept work directly
    /// without a formal match.
    pub fn fulfill(
        &self,
        id: BountyId,
        poster_secret: &str,
        acp_job_id: Option<String>,
    ) -> Result<Bounty, ApiError> {
        let now = Utc::now();
        let bounty = self.store.update_bounty(id, |current| {
            if !secret::verify(poster_secret, current.poster_secret_hash.as_deref()) {
                return Err(ApiError::Forbidden);
            }
            if !matches!(
                current.status,
                BountyStatus::Claimed | BountyStatus::Matched
            ) {
                return Err(ApiError::Conflict);
            }
            let mut next = current.clone();
            next.status = BountyStatus::Fulfilled;
            next.acp_job_id = acp_job_id.clone();
            next.fulfilled_at = Some(now);
            next.updated_at = Some(now);
            Ok(next)
        })?;
        info!(bounty_id = id, "bounty fulfilled");
        Ok(bounty)
    }

    /// Cancel a bounty from any non-terminal state. Requires the poster
    /// secret. Cancelling a claimed bounty evicts the claimer in the same
    /// atomic write.
    pub fn cancel(&self, id: BountyId, poster_secret: &str) -> Result<Bounty, ApiError> {
        let now = Utc::now();
        let bounty = self.store.update_bounty(id, |current| {
            if !secret::verify(poster_secret, current.poster_secret_hash.as_deref()) {
                return Err(ApiError::Forbidden);
            }
            if current.status.is_terminal() {
                return Err(ApiError::Conflict);
            }
            let mut next = current.clone();
            next.status = BountyStatus::Cancelled;
            next.claimed_by = None;
            next.claimer_callback_url = None;
            next.claimer_secret_hash = None;
            next.claimed_at = None;
            next.updated_at = Some(now);
            Ok(next)
        })?;
        info!(bounty_id = id, "bounty cancelled");
        Ok(bounty)
    }

    /// Cancel bounties whose `expires_at` has passed. Used by the expiry
    /// sweep; each expiry is its own atomic transition, so a bounty claimed
    /// or cancelled mid-sweep is skipped.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<BountyId>, ApiError> {
        let mut expired = Vec::new();
        for bounty in self.store.scan_bounties()? {
            let due = matches!(
                bounty.status,
                BountyStatus::Open | BountyStatus::Claimed
            ) && bounty.expires_at.map(|at| at <= now).unwrap_or(false);
            if !due {
                continue;
            }
            let result = self.store.update_bounty(bounty.id, |current| {
                let still_due = matches!(
                    current.status,
                    BountyStatus::Open | BountyStatus::Claimed
                ) && current.expires_at.map(|at| at <= now).unwrap_or(false);
                if !still_due {
                    return Err(ApiError::Conflict);
                }
                let mut next = current.clone();
                next.status = BountyStatus::Cancelled;
                next.claimed_by = None;
                next.claimer_callback_url = None;
                next.claimer_secret_hash = None;
                next.claimed_at = None;
                next.updated_at = Some(now);
                Ok(next)
            });
            match result {
                Ok(_) => {
                    info!(bounty_id = bounty.id, title = %bounty.title, "expired bounty cancelled");
                    expired.push(bounty.id);
                }
                Err(ApiError::Conflict) => continue,
                Err(other) => return Err(other),
            }
        }
        Ok(expired)
    }

    pub fn get(&self, id: BountyId) -> Result<Bounty, ApiError> {
        self.store
            .get_bounty(id)?
            .ok_or_else(|| ApiError::not_found("bounty", id))
    }

    /// List bounties. Filters are conjunctive; ordering is `created_at`
    /// descending with id descending as the tie-break, so pagination stays
    /// deterministic under concurrent inserts.
    pub fn list(&self, filter: &BountyFilter) -> Result<BountyPage, ApiError> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matched: Vec<Bounty> = self
            .store
            .scan_bounties()?
            .into_iter()
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .filter(|b| filter.category.map_or(true, |c| b.category == c))
            .filter(|b| filter.min_budget.map_or(true, |min| b.budget >= min))
            .filter(|b| filter.max_budget.map_or(true, |max| b.budget <= max))
            .filter(|b| {
                needle
                    .as_ref()
                    .map_or(true, |q| b.search_text().contains(q))
            })
            .collect();

        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matched.len();
        let bounties = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();
        Ok(BountyPage { bounties, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn lifecycle() -> (tempfile::TempDir, BountyLifecycle) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MarketStore::open(dir.path()).unwrap());
        (dir, BountyLifecycle::new(store))
    }

    fn post(lc: &BountyLifecycle) -> CreatedBounty {
        lc.create(CreateBounty {
            poster_name: "poster".into(),
            title: "Build a widget".into(),
            description: "A widget that does things".into(),
            budget: 50.0,
            category: Category::Physical,
            tags: Some("widgets,3d-print".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_create_validates_inputs() {
        let (_dir, lc) = lifecycle();
        let base = CreateBounty {
            poster_name: "p".into(),
            title: "t".into(),
            description: "d".into(),
            budget: 10.0,
            ..Default::default()
        };

        let mut bad = base.clone();
        bad.title = "  ".into();
        assert!(matches!(
            lc.create(bad).unwrap_err(),
            ApiError::Validation { field: "title", .. }
        ));

        let mut bad = base.clone();
        bad.budget = 0.0;
        assert!(matches!(
            lc.create(bad).unwrap_err(),
            ApiError::Validation { field: "budget", .. }
        ));

        let mut bad = base.clone();
        bad.budget = f64::NAN;
        assert!(matches!(
            lc.create(bad).unwrap_err(),
            ApiError::Validation { field: "budget", .. }
        ));

        let mut bad = base;
        bad.poster_callback_url = Some("http://127.0.0.1/hook".into());
        assert!(matches!(
            lc.create(bad).unwrap_err(),
            ApiError::Validation { .. }
        ));
    }

    #[test]
    fn test_claim_sets_claimer_fields() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        let claimed = lc.claim(created.bounty.id, "worker", None).unwrap();
        assert_eq!(claimed.bounty.status, BountyStatus::Claimed);
        assert_eq!(claimed.bounty.claimed_by.as_deref(), Some("worker"));
        assert!(claimed.bounty.claimed_at.is_some());
        assert!(claimed.bounty.claimer_fields_consistent());
        assert!(!claimed.claimer_secret.is_empty());
    }

    #[test]
    fn test_claim_non_open_conflicts() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        lc.claim(created.bounty.id, "first", None).unwrap();
        let err = lc.claim(created.bounty.id, "second", None).unwrap_err();
        assert!(matches!(err, ApiError::Conflict));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let (_dir, lc) = lifecycle();
        let id = post(&lc).bounty.id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let lc = lc.clone();
            handles.push(thread::spawn(move || {
                lc.claim(id, &format!("claimer-{}", i), None)
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, ApiError::Conflict));
            }
        }

        let bounty = lc.get(id).unwrap();
        assert_eq!(bounty.status, BountyStatus::Claimed);
        assert!(bounty.claimer_fields_consistent());
    }

    #[test]
    fn test_unclaim_restores_open() {
        let (_dir, lc) = lifecycle();
        let id = post(&lc).bounty.id;
        let claimed = lc.claim(id, "worker", None).unwrap();

        let released = lc.unclaim(id, &claimed.claimer_secret).unwrap();
        assert_eq!(released.status, BountyStatus::Open);
        assert!(released.claimed_by.is_none());
        assert!(released.claimer_secret_hash.is_none());
        assert!(released.claimed_at.is_none());

        // A different party can now claim.
        let reclaimed = lc.claim(id, "other-worker", None).unwrap();
        assert_eq!(reclaimed.bounty.claimed_by.as_deref(), Some("other-worker"));
    }

    #[test]
    fn test_unclaim_wrong_secret_forbidden() {
        let (_dir, lc) = lifecycle();
        let id = post(&lc).bounty.id;
        lc.claim(id, "worker", None).unwrap();
        assert!(matches!(
            lc.unclaim(id, "wrong-secret").unwrap_err(),
            ApiError::Forbidden
        ));
    }

    #[test]
    fn test_unclaim_open_conflicts() {
        let (_dir, lc) = lifecycle();
        let id = post(&lc).bounty.id;
        assert!(matches!(
            lc.unclaim(id, "anything").unwrap_err(),
            ApiError::Conflict
        ));
    }

    #[test]
    fn test_match_requires_claimed_state() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        let req = MatchBounty {
            service_id: None,
            acp_agent_wallet: "0xabc".into(),
            acp_job_offering: "widget-printing".into(),
        };
        // Open bounty: must be claimed first.
        assert!(matches!(
            lc.match_bounty(created.bounty.id, &created.poster_secret, req.clone())
                .unwrap_err(),
            ApiError::Conflict
        ));

        lc.claim(created.bounty.id, "worker", None).unwrap();
        let matched = lc
            .match_bounty(created.bounty.id, &created.poster_secret, req)
            .unwrap();
        assert_eq!(matched.status, BountyStatus::Matched);
        assert_eq!(matched.matched_acp_agent.as_deref(), Some("0xabc"));
        assert!(matched.matched_at.is_some());
    }

    #[test]
    fn test_match_checks_service_reference() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        lc.claim(created.bounty.id, "worker", None).unwrap();
        let err = lc
            .match_bounty(
                created.bounty.id,
                &created.poster_secret,
                MatchBounty {
                    service_id: Some(999),
                    acp_agent_wallet: "0xabc".into(),
                    acp_job_offering: "job".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation {
                field: "service_id",
                ..
            }
        ));
    }

    #[test]
    fn test_fulfill_from_claimed_and_matched() {
        let (_dir, lc) = lifecycle();

        // Directly from claimed.
        let created = post(&lc);
        lc.claim(created.bounty.id, "worker", None).unwrap();
        let fulfilled = lc
            .fulfill(created.bounty.id, &created.poster_secret, None)
            .unwrap();
        assert_eq!(fulfilled.status, BountyStatus::Fulfilled);
        assert!(fulfilled.fulfilled_at.is_some());

        // Through a match.
        let created = post(&lc);
        lc.claim(created.bounty.id, "worker", None).unwrap();
        lc.match_bounty(
            created.bounty.id,
            &created.poster_secret,
            MatchBounty {
                service_id: None,
                acp_agent_wallet: "0xabc".into(),
                acp_job_offering: "job".into(),
            },
        )
        .unwrap();
        let fulfilled = lc
            .fulfill(
                created.bounty.id,
                &created.poster_secret,
                Some("job-123".into()),
            )
            .unwrap();
        assert_eq!(fulfilled.acp_job_id.as_deref(), Some("job-123"));
    }

    #[test]
    fn test_fulfill_open_conflicts() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        assert!(matches!(
            lc.fulfill(created.bounty.id, &created.poster_secret, None)
                .unwrap_err(),
            ApiError::Conflict
        ));
    }

    #[test]
    fn test_wrong_poster_secret_forbidden() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        lc.claim(created.bounty.id, "worker", None).unwrap();
        assert!(matches!(
            lc.fulfill(created.bounty.id, "bad-secret", None).unwrap_err(),
            ApiError::Forbidden
        ));
        assert!(matches!(
            lc.cancel(created.bounty.id, "bad-secret").unwrap_err(),
            ApiError::Forbidden
        ));
    }

    #[test]
    fn test_cancel_claimed_evicts_claimer() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        lc.claim(created.bounty.id, "worker", None).unwrap();

        let cancelled = lc.cancel(created.bounty.id, &created.poster_secret).unwrap();
        assert_eq!(cancelled.status, BountyStatus::Cancelled);
        assert!(cancelled.claimed_by.is_none());
        assert!(cancelled.claimer_secret_hash.is_none());
        assert!(cancelled.claimer_fields_consistent());

        // Terminal: nothing further is allowed.
        assert!(matches!(
            lc.claim(created.bounty.id, "late", None).unwrap_err(),
            ApiError::Conflict
        ));
        assert!(matches!(
            lc.cancel(created.bounty.id, &created.poster_secret)
                .unwrap_err(),
            ApiError::Conflict
        ));
    }

    #[test]
    fn test_secretless_bounty_fails_closed() {
        let (_dir, lc) = lifecycle();
        let created = post(&lc);
        // Simulate a legacy row with no poster secret.
        lc.store
            .update_bounty(created.bounty.id, |current| {
                let mut next = current.clone();
                next.poster_secret_hash = None;
                Ok(next)
            })
            .unwrap();
        assert!(matches!(
            lc.cancel(created.bounty.id, &created.poster_secret)
                .unwrap_err(),
            ApiError::Forbidden
        ));
    }

    #[test]
    fn test_expire_due_cancels_only_due_bounties() {
        let (_dir, lc) = lifecycle();
        let now = Utc::now();

        let due = lc
            .create(CreateBounty {
                poster_name: "p".into(),
                title: "expiring".into(),
                description: "d".into(),
                budget: 5.0,
                expires_at: Some(now - chrono::Duration::hours(1)),
                ..Default::default()
            })
            .unwrap();
        let alive = lc
            .create(CreateBounty {
                poster_name: "p".into(),
                title: "fresh".into(),
                description: "d".into(),
                budget: 5.0,
                expires_at: Some(now + chrono::Duration::hours(1)),
                ..Default::default()
            })
            .unwrap();

        let expired = lc.expire_due(now).unwrap();
        assert_eq!(expired, vec![due.bounty.id]);
        assert_eq!(lc.get(due.bounty.id).unwrap().status, BountyStatus::Cancelled);
        assert_eq!(lc.get(alive.bounty.id).unwrap().status, BountyStatus::Open);
    }

    #[test]
    fn test_list_filters_are_conjunctive() {
        let (_dir, lc) = lifecycle();
        for (title, budget, category) in [
            ("Print a bracket", 20.0, Category::Physical),
            ("Design a logo", 80.0, Category::Digital),
            ("Print a case", 120.0, Category::Physical),
        ] {
            lc.create(CreateBounty {
                poster_name: "p".into(),
                title: title.into(),
                description: "desc".into(),
                budget,
                category,
                ..Default::default()
            })
            .unwrap();
        }

        let page = lc
            .list(&BountyFilter {
                category: Some(Category::Physical),
                min_budget: Some(50.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.bounties[0].title, "Print a case");

        let page = lc
            .list(&BountyFilter {
                search: Some("PRINT".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_list_order_and_pagination() {
        let (_dir, lc) = lifecycle();
        let mut ids = Vec::new();
        for i in 0..5 {
            let created = lc
                .create(CreateBounty {
                    poster_name: "p".into(),
                    title: format!("bounty {}", i),
                    description: "d".into(),
                    budget: 10.0,
                    ..Default::default()
                })
                .unwrap();
            ids.push(created.bounty.id);
        }

        let page = lc
            .list(&BountyFilter {
                limit: 2,
                offset: 0,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.bounties.len(), 2);
        // Newest first; ids allocated monotonically break created_at ties.
        assert_eq!(page.bounties[0].id, ids[4]);
        assert_eq!(page.bounties[1].id, ids[3]);

        let next = lc
            .list(&BountyFilter {
                limit: 2,
                offset: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.bounties[0].id, ids[2]);
    }
}
