//! Marketplace operations facade.
//!
//! `MarketApi` binds the store, lifecycle, catalog, registry mirror and
//! webhook notifier behind the operation set an HTTP layer mounts. Request
//! and response DTOs are plain serde types; secret hashes never appear in
//! a view. Framework wiring (routing, headers, status codes) lives
//! outside the crate.

use crate::bounty::{
    Bounty, BountyFilter, BountyLifecycle, BountyStatus, CreateBounty, MatchBounty,
};
use crate::catalog::{
    CreateService, Service, ServiceCatalog, ServiceFilter, UpdateService,
};
use crate::error::ApiError;
use crate::matching::MatchCoordinator;
use crate::notify::Notifier;
use crate::registry::{
    CacheHealth, RegistryCache, RegistryEntry, CATEGORY_PRODUCTS, CATEGORY_SERVICES,
};
use crate::store::MarketStore;
use crate::types::{BountyId, Category, ServiceId};
use crate::version::{self, Conditional};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hard ceiling on list page sizes.
const MAX_LIST_LIMIT: usize = 100;
/// Hard ceiling on registry agent pages.
const MAX_AGENT_PAGE: usize = 500;
/// Minimum registry search query length.
const MIN_QUERY_LEN: usize = 2;

/// Marker value for the deprecation header on legacy path redirects.
pub const DEPRECATION_MARKER: &str = "true";
/// Sunset date advertised on legacy path redirects.
pub const LEGACY_SUNSET: &str = "2026-06-01";

// ---- views ----

/// Public projection of a bounty. Secret hashes and callback URLs stay
/// internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BountyView {
    pub id: BountyId,
    pub poster_name: String,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub budget: f64,
    pub category: Category,
    pub tags: Option<String>,
    pub status: BountyStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub matched_service_id: Option<ServiceId>,
    pub matched_acp_agent: Option<String>,
    pub matched_acp_job: Option<String>,
    pub matched_at: Option<DateTime<Utc>>,
    pub acp_job_id: Option<String>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Bounty> for BountyView {
    fn from(b: &Bounty) -> Self {
        Self {
            id: b.id,
            poster_name: b.poster_name.clone(),
            title: b.title.clone(),
            description: b.description.clone(),
            requirements: b.requirements.clone(),
            budget: b.budget,
            category: b.category,
            tags: b.tags.clone(),
            status: b.status,
            claimed_by: b.claimed_by.clone(),
            claimed_at: b.claimed_at,
            matched_service_id: b.matched_service_id,
            matched_acp_agent: b.matched_acp_agent.clone(),
            matched_acp_job: b.matched_acp_job.clone(),
            matched_at: b.matched_at,
            acp_job_id: b.acp_job_id.clone(),
            fulfilled_at: b.fulfilled_at,
            expires_at: b.expires_at,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Public projection of a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceView {
    pub id: ServiceId,
    pub agent_name: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub location: Option<String>,
    pub shipping_available: bool,
    pub tags: Option<String>,
    pub acp_agent_wallet: Option<String>,
    pub acp_job_offering: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<&Service> for ServiceView {
    fn from(s: &Service) -> Self {
        Self {
            id: s.id,
            agent_name: s.agent_name.clone(),
            name: s.name.clone(),
            description: s.description.clone(),
            price: s.price,
            category: s.category,
            location: s.location.clone(),
            shipping_available: s.shipping_available,
            tags: s.tags.clone(),
            acp_agent_wallet: s.acp_agent_wallet.clone(),
            acp_job_offering: s.acp_job_offering.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
            is_active: s.is_active,
        }
    }
}

/// An advisory match candidate in API form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidateView {
    pub name: String,
    pub wallet_address: String,
    pub description: String,
    pub job_offerings: Vec<String>,
    pub score: u32,
}

// ---- requests ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBountyRequest {
    pub poster_name: String,
    #[serde(default)]
    pub poster_callback_url: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Option<String>,
    pub budget: f64,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub claimer_name: String,
    #[serde(default)]
    pub claimer_callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnclaimRequest {
    pub claimer_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub poster_secret: String,
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    pub acp_agent_wallet: String,
    pub acp_job_offering: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillRequest {
    pub poster_secret: String,
    #[serde(default)]
    pub acp_job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub poster_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub agent_name: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub shipping_available: bool,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub acp_agent_wallet: Option<String>,
    #[serde(default)]
    pub acp_job_offering: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    pub agent_secret: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub shipping_available: bool,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub acp_agent_wallet: Option<String>,
    #[serde(default)]
    pub acp_job_offering: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentListQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub online_only: bool,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

// ---- responses ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BountyCreatedResponse {
    pub bounty: BountyView,
    /// Returned exactly once; only the hash is persisted.
    pub poster_secret: String,
    /// Advisory registry candidates; posting is never blocked by them.
    pub registry_matches: Vec<MatchCandidateView>,
    pub action: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub bounty_id: BountyId,
    pub claimed_by: String,
    pub status: BountyStatus,
    /// Returned exactly once; only the hash is persisted.
    pub claimer_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BountyListResponse {
    pub bounties: Vec<BountyView>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCreatedResponse {
    pub service: ServiceView,
    /// Returned exactly once; only the hash is persisted.
    pub agent_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceView>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentListResponse {
    pub agents: Vec<RegistryEntry>,
    pub count: usize,
    pub total_in_registry: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSearchResponse {
    pub query: String,
    pub agents: Vec<RegistryEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BountyStats {
    pub total: usize,
    pub open: usize,
    pub claimed: usize,
    pub matched: usize,
    pub fulfilled: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStats {
    pub total: usize,
    pub products: usize,
    pub services: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub bounties: BountyStats,
    pub agents: AgentStats,
    pub last_registry_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub storage: bool,
    pub registry: CacheHealth,
    pub agents_cached: usize,
    pub last_registry_update: Option<DateTime<Utc>>,
    pub registry_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub agents: usize,
    pub fetched_at: DateTime<Utc>,
    pub joined_in_flight: bool,
}

/// A resolved legacy path: where it moved and the sunset date to
/// advertise. The external router emits the actual redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRedirect {
    pub location: String,
    pub deprecation: &'static str,
    pub sunset: &'static str,
}

/// Map a legacy path (plus optional query string) onto the current path
/// set.
pub fn resolve_legacy_path(path_and_query: &str) -> Option<LegacyRedirect> {
    const ALIASES: &[(&str, &str)] = &[
        ("/api/bounties", "/api/v1/bounties"),
        ("/api/services", "/api/v1/services"),
    ];
    for (old, new) in ALIASES {
        if let Some(rest) = path_and_query.strip_prefix(old) {
            if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
                return Some(LegacyRedirect {
                    location: format!("{}{}", new, rest),
                    deprecation: DEPRECATION_MARKER,
                    sunset: LEGACY_SUNSET,
                });
            }
        }
    }
    None
}

/// The marketplace operations surface.
pub struct MarketApi {
    store: Arc<MarketStore>,
    lifecycle: BountyLifecycle,
    catalog: ServiceCatalog,
    registry: Arc<RegistryCache>,
    coordinator: MatchCoordinator,
    notifier: Notifier,
    admin_secret: Option<String>,
}

fn clamp_limit(limit: usize, ceiling: usize) -> usize {
    limit.clamp(1, ceiling)
}

fn candidate_views(candidates: Vec<crate::matching::MatchCandidate>) -> Vec<MatchCandidateView> {
    candidates
        .into_iter()
        .map(|c| MatchCandidateView {
            name: c.entry.name,
            wallet_address: c.entry.wallet_address,
            description: c.entry.description,
            job_offerings: c.entry.job_offerings,
            score: c.score,
        })
        .collect()
}

impl MarketApi {
    pub fn new(
        store: Arc<MarketStore>,
        registry: Arc<RegistryCache>,
        notifier: Notifier,
        admin_secret: Option<String>,
    ) -> Self {
        Self {
            lifecycle: BountyLifecycle::new(Arc::clone(&store)),
            catalog: ServiceCatalog::new(Arc::clone(&store)),
            coordinator: MatchCoordinator::new(Arc::clone(&registry)),
            store,
            registry,
            notifier,
            admin_secret,
        }
    }

    pub fn lifecycle(&self) -> &BountyLifecycle {
        &self.lifecycle
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<RegistryCache> {
        &self.registry
    }

    // ---- bounties ----

    pub fn create_bounty(
        &self,
        req: CreateBountyRequest,
    ) -> Result<BountyCreatedResponse, ApiError> {
        let created = self.lifecycle.create(CreateBounty {
            poster_name: req.poster_name,
            poster_callback_url: req.poster_callback_url,
            title: req.title,
            description: req.description,
            requirements: req.requirements,
            budget: req.budget,
            category: req.category,
            tags: req.tags,
            expires_at: req.expires_at,
        })?;

        let matches = candidate_views(self.coordinator.check_matches(&created.bounty, 5));
        let message = if matches.is_empty() {
            "Bounty posted. No matching registry agents yet.".to_string()
        } else {
            format!(
                "Bounty posted. {} registry agent(s) look like a match; consider contacting them directly.",
                matches.len()
            )
        };
        Ok(BountyCreatedResponse {
            bounty: BountyView::from(&created.bounty),
            poster_secret: created.poster_secret,
            registry_matches: matches,
            action: "posted".to_string(),
            message,
        })
    }

    pub fn list_bounties(&self, mut filter: BountyFilter) -> Result<BountyListResponse, ApiError> {
        filter.limit = clamp_limit(filter.limit, MAX_LIST_LIMIT);
        let page = self.lifecycle.list(&filter)?;
        Ok(BountyListResponse {
            bounties: page.bounties.iter().map(BountyView::from).collect(),
            total: page.total,
        })
    }

    /// Conditional bounty read: with a matching fingerprint the payload is
    /// omitted.
    pub fn get_bounty(
        &self,
        id: BountyId,
        if_not_matching: Option<&str>,
    ) -> Result<Conditional<BountyView>, ApiError> {
        let bounty = self.lifecycle.get(id)?;
        let tag = version::tag_of(&bounty)?;
        Ok(Conditional::evaluate(tag, if_not_matching, || {
            BountyView::from(&bounty)
        }))
    }

    pub fn claim_bounty(&self, id: BountyId, req: ClaimRequest) -> Result<ClaimResponse, ApiError> {
        let claimed = self
            .lifecycle
            .claim(id, &req.claimer_name, req.claimer_callback_url)?;
        self.notifier.bounty_claimed(&claimed.bounty);
        Ok(ClaimResponse {
            bounty_id: claimed.bounty.id,
            claimed_by: req.claimer_name,
            status: claimed.bounty.status,
            claimer_secret: claimed.claimer_secret,
        })
    }

    pub fn unclaim_bounty(&self, id: BountyId, req: UnclaimRequest) -> Result<BountyView, ApiError> {
        let bounty = self.lifecycle.unclaim(id, &req.claimer_secret)?;
        Ok(BountyView::from(&bounty))
    }

    pub fn match_bounty(&self, id: BountyId, req: MatchRequest) -> Result<BountyView, ApiError> {
        let bounty = self.lifecycle.match_bounty(
            id,
            &req.poster_secret,
            MatchBounty {
                service_id: req.service_id,
                acp_agent_wallet: req.acp_agent_wallet,
                acp_job_offering: req.acp_job_offering,
            },
        )?;
        Ok(BountyView::from(&bounty))
    }

    pub fn fulfill_bounty(&self, id: BountyId, req: FulfillRequest) -> Result<BountyView, ApiError> {
        let bounty = self
            .lifecycle
            .fulfill(id, &req.poster_secret, req.acp_job_id)?;
        self.notifier.bounty_fulfilled(&bounty);
        Ok(BountyView::from(&bounty))
    }

    pub fn cancel_bounty(&self, id: BountyId, req: CancelRequest) -> Result<BountyView, ApiError> {
        let bounty = self.lifecycle.cancel(id, &req.poster_secret)?;
        Ok(BountyView::from(&bounty))
    }

    /// Advisory registry candidates for an existing bounty.
    pub fn check_matches(&self, id: BountyId) -> Result<Vec<MatchCandidateView>, ApiError> {
        let bounty = self.lifecycle.get(id)?;
        Ok(candidate_views(self.coordinator.check_matches(&bounty, 10)))
    }

    // ---- services ----

    pub fn create_service(
        &self,
        req: CreateServiceRequest,
    ) -> Result<ServiceCreatedResponse, ApiError> {
        let created = self.catalog.create(CreateService {
            agent_name: req.agent_name,
            name: req.name,
            description: req.description,
            price: req.price,
            category: req.category,
            location: req.location,
            shipping_available: req.shipping_available,
            tags: req.tags,
            acp_agent_wallet: req.acp_agent_wallet,
            acp_job_offering: req.acp_job_offering,
        })?;
        Ok(ServiceCreatedResponse {
            service: ServiceView::from(&created.service),
            agent_secret: created.agent_secret,
        })
    }

    pub fn list_services(
        &self,
        mut filter: ServiceFilter,
    ) -> Result<ServiceListResponse, ApiError> {
        filter.limit = clamp_limit(filter.limit, MAX_LIST_LIMIT);
        let page = self.catalog.list(&filter)?;
        Ok(ServiceListResponse {
            services: page.services.iter().map(ServiceView::from).collect(),
            total: page.total,
        })
    }

    pub fn get_service(
        &self,
        id: ServiceId,
        if_not_matching: Option<&str>,
    ) -> Result<Conditional<ServiceView>, ApiError> {
        let service = self.catalog.get(id)?;
        let tag = version::tag_of(&service)?;
        Ok(Conditional::evaluate(tag, if_not_matching, || {
            ServiceView::from(&service)
        }))
    }

    pub fn update_service(
        &self,
        id: ServiceId,
        req: UpdateServiceRequest,
    ) -> Result<ServiceView, ApiError> {
        let service = self.catalog.update(
            id,
            &req.agent_secret,
            UpdateService {
                name: req.name,
                description: req.description,
                price: req.price,
                category: req.category,
                location: req.location,
                shipping_available: req.shipping_available,
                tags: req.tags,
                acp_agent_wallet: req.acp_agent_wallet,
                acp_job_offering: req.acp_job_offering,
            },
        )?;
        Ok(ServiceView::from(&service))
    }

    pub fn deactivate_service(
        &self,
        id: ServiceId,
        agent_secret: &str,
    ) -> Result<ServiceView, ApiError> {
        let service = self.catalog.deactivate(id, agent_secret)?;
        Ok(ServiceView::from(&service))
    }

    // ---- registry ----

    /// List mirrored agents. Always served from the snapshot; staleness
    /// schedules a background refresh and the stale data is returned.
    pub fn registry_agents(&self, query: AgentListQuery) -> Result<AgentListResponse, ApiError> {
        Arc::clone(&self.registry).maybe_schedule_refresh();
        let snapshot = self.registry.snapshot();

        let mut agents: Vec<RegistryEntry> = match query.category.as_deref() {
            Some(category) => snapshot
                .by_category(category)
                .into_iter()
                .cloned()
                .collect(),
            None => snapshot.agents().to_vec(),
        };
        if query.online_only {
            agents.retain(|a| a.online);
        }

        let per_page = clamp_limit(query.limit.unwrap_or(100), MAX_AGENT_PAGE);
        let page = query.page.unwrap_or(1).max(1);
        let total = agents.len();
        let total_pages = (total.max(1) + per_page - 1) / per_page;
        let start = (page - 1).saturating_mul(per_page);
        let agents_page: Vec<RegistryEntry> =
            agents.into_iter().skip(start).take(per_page).collect();

        Ok(AgentListResponse {
            count: agents_page.len(),
            agents: agents_page,
            total_in_registry: snapshot.len(),
            last_updated: snapshot.fetched_at(),
            page,
            per_page,
            total_pages,
            has_next: page < total_pages,
        })
    }

    /// Case-insensitive substring search over the snapshot.
    pub fn search_agents(&self, query: &str, limit: usize) -> Result<AgentSearchResponse, ApiError> {
        if query.trim().len() < MIN_QUERY_LEN {
            return Err(ApiError::validation(
                "q",
                format!("query must be at least {} characters", MIN_QUERY_LEN),
            ));
        }
        Arc::clone(&self.registry).maybe_schedule_refresh();
        let snapshot = self.registry.snapshot();
        let agents: Vec<RegistryEntry> = snapshot
            .search(query)
            .into_iter()
            .take(clamp_limit(limit, MAX_LIST_LIMIT))
            .cloned()
            .collect();
        Ok(AgentSearchResponse {
            query: query.to_string(),
            count: agents.len(),
            agents,
        })
    }

    /// Force a registry refresh. Gated by the operator admin secret,
    /// which is distinct from per-entity capability secrets; an absent
    /// configured secret fails closed.
    pub async fn force_refresh(&self, operator_secret: &str) -> Result<RefreshResponse, ApiError> {
        let configured = self.admin_secret.as_deref().ok_or(ApiError::Forbidden)?;
        // Hash both sides so the comparison is constant time.
        if blake3::hash(operator_secret.as_bytes()) != blake3::hash(configured.as_bytes()) {
            return Err(ApiError::Forbidden);
        }
        let outcome = self.registry.refresh(true).await?;
        Ok(RefreshResponse {
            agents: outcome.agent_count,
            fetched_at: outcome.fetched_at,
            joined_in_flight: outcome.joined_in_flight,
        })
    }

    // ---- platform ----

    pub fn stats(&self) -> Result<PlatformStats, ApiError> {
        let bounties = self.store.scan_bounties()?;
        let count = |status: BountyStatus| bounties.iter().filter(|b| b.status == status).count();
        let snapshot = self.registry.snapshot();
        Ok(PlatformStats {
            bounties: BountyStats {
                total: bounties.len(),
                open: count(BountyStatus::Open),
                claimed: count(BountyStatus::Claimed),
                matched: count(BountyStatus::Matched),
                fulfilled: count(BountyStatus::Fulfilled),
                cancelled: count(BountyStatus::Cancelled),
            },
            agents: AgentStats {
                total: snapshot.len(),
                products: snapshot.category_count(CATEGORY_PRODUCTS),
                services: snapshot.category_count(CATEGORY_SERVICES),
            },
            last_registry_update: snapshot.fetched_at(),
        })
    }

    pub fn health(&self) -> HealthReport {
        let storage = self.store.is_reachable();
        let registry = self.registry.health();
        let snapshot = self.registry.snapshot();
        let status = if storage && registry != CacheHealth::Empty {
            "healthy"
        } else {
            "degraded"
        };
        HealthReport {
            status,
            storage,
            registry,
            agents_cached: snapshot.len(),
            last_registry_update: snapshot.fetched_at(),
            registry_error: self.registry.last_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_bounty_paths_resolve() {
        let redirect = resolve_legacy_path("/api/bounties/7/claim").unwrap();
        assert_eq!(redirect.location, "/api/v1/bounties/7/claim");
        assert_eq!(redirect.deprecation, "true");
        assert_eq!(redirect.sunset, LEGACY_SUNSET);

        let redirect = resolve_legacy_path("/api/services?category=digital").unwrap();
        assert_eq!(redirect.location, "/api/v1/services?category=digital");
    }

    #[test]
    fn test_current_paths_do_not_resolve() {
        assert!(resolve_legacy_path("/api/v1/bounties/7").is_none());
        assert!(resolve_legacy_path("/api/bountiful").is_none());
        assert!(resolve_legacy_path("/health").is_none());
    }
}
