//! Service catalog: standing offers listed by agents.
//!
//! Structurally simpler than the bounty lifecycle: one owner, one secret,
//! no multi-party handoff. Updates and deactivation require the agent
//! secret issued at creation; deactivation is an idempotent soft flag.

use crate::error::ApiError;
use crate::secret;
use crate::store::MarketStore;
use crate::types::{Category, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Persisted service record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub agent_name: String,
    pub agent_secret_hash: Option<String>,

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

impl Service {
    pub fn search_text(&self) -> String {
        let mut text = format!("{} {}", self.name, self.description);
        if let Some(tags) = &self.tags {
            text.push(' ');
            text.push_str(tags);
        }
        text.to_lowercase()
    }
}

/// Input for listing a new service.
#[derive(Debug, Clone, Default)]
pub struct CreateService {
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
}

/// The mutable fields an owner may replace on update.
#[derive(Debug, Clone, Default)]
pub struct UpdateService {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub location: Option<String>,
    pub shipping_available: bool,
    pub tags: Option<String>,
    pub acp_agent_wallet: Option<String>,
    pub acp_job_offering: Option<String>,
}

/// A freshly listed service plus the agent secret, returned exactly once.
#[derive(Debug, Clone)]
pub struct CreatedService {
    pub service: Service,
    pub agent_secret: String,
}

/// Conjunctive list filters with pagination. Only active services are
/// listed.
#[derive(Debug, Clone)]
pub struct ServiceFilter {
    pub category: Option<Category>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub location: Option<String>,
    pub shipping_available: Option<bool>,
    pub acp_only: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ServiceFilter {
    fn default() -> Self {
        Self {
            category: None,
            min_price: None,
            max_price: None,
            search: None,
            location: None,
            shipping_available: None,
            acp_only: false,
            limit: 50,
            offset: 0,
        }
    }
}

/// One page of services plus the total match count before pagination.
#[derive(Debug, Clone)]
pub struct ServicePage {
    pub services: Vec<Service>,
    pub total: usize,
}

/// Owns service create/update/deactivate, authorized by the agent secret.
#[derive(Clone)]
pub struct ServiceCatalog {
    store: Arc<MarketStore>,
}

fn validate_listing(
    name: &str,
    description: &str,
    price: f64,
) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }
    if description.trim().is_empty() {
        return Err(ApiError::validation("description", "must not be empty"));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(ApiError::validation(
            "price",
            "must be a finite number greater than zero",
        ));
    }
    Ok(())
}

impl ServiceCatalog {
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    /// List a new service. Issues the agent secret once; only its hash is
    /// persisted.
    pub fn create(&self, req: CreateService) -> Result<CreatedService, ApiError> {
        if req.agent_name.trim().is_empty() {
            return Err(ApiError::validation("agent_name", "must not be empty"));
        }
        validate_listing(&req.name, &req.description, req.price)?;

        let issued = secret::issue();
        let service = Service {
            id: self.store.next_service_id()?,
            agent_name: req.agent_name,
            agent_secret_hash: Some(issued.token_hash),
            name: req.name,
            description: req.description,
            price: req.price,
            category: req.category,
            location: req.location,
            shipping_available: req.shipping_available,
            tags: req.tags,
            acp_agent_wallet: req.acp_agent_wallet,
            acp_job_offering: req.acp_job_offering,
            created_at: Utc::now(),
            updated_at: None,
            is_active: true,
        };
        self.store.insert_service(&service)?;
        info!(service_id = service.id, category = %service.category, "service listed");
        Ok(CreatedService {
            service,
            agent_secret: issued.token,
        })
    }

    pub fn get(&self, id: ServiceId) -> Result<Service, ApiError> {
        self.store
            .get_service(id)?
            .ok_or_else(|| ApiError::not_found("service", id))
    }

    /// Replace the mutable fields of a listing. Requires the agent secret.
    pub fn update(
        &self,
        id: ServiceId,
        agent_secret: &str,
        req: UpdateService,
    ) -> Result<Service, ApiError> {
        validate_listing(&req.name, &req.description, req.price)?;

        let now = Utc::now();
        let service = self.store.update_service(id, |current| {
            if !secret::verify(agent_secret, current.agent_secret_hash.as_deref()) {
                return Err(ApiError::Forbidden);
            }
            let mut next = current.clone();
            next.name = req.name.clone();
            next.description = req.description.clone();
            next.price = req.price;
            next.category = req.category;
            next.location = req.location.clone();
            next.shipping_available = req.shipping_available;
            next.tags = req.tags.clone();
            next.acp_agent_wallet = req.acp_agent_wallet.clone();
            next.acp_job_offering = req.acp_job_offering.clone();
            next.updated_at = Some(now);
            Ok(next)
        })?;
        info!(service_id = id, "service updated");
        Ok(service)
    }

    /// Flip `is_active` off. Requires the agent secret. Idempotent:
    /// deactivating an already-inactive service succeeds silently.
    pub fn deactivate(&self, id: ServiceId, agent_secret: &str) -> Result<Service, ApiError> {
        let now = Utc::now();
        let service = self.store.update_service(id, |current| {
            if !secret::verify(agent_secret, current.agent_secret_hash.as_deref()) {
                return Err(ApiError::Forbidden);
            }
            let mut next = current.clone();
            next.is_active = false;
            next.updated_at = Some(now);
            Ok(next)
        })?;
        info!(service_id = id, "service deactivated");
        Ok(service)
    }

    /// List active services with the same pagination/order contract as
    /// bounties.
    pub fn list(&self, filter: &ServiceFilter) -> Result<ServicePage, ApiError> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let location_needle = filter.location.as_ref().map(|s| s.to_lowercase());
        let mut matched: Vec<Service> = self
            .store
            .scan_services()?
            .into_iter()
            .filter(|s| s.is_active)
            .filter(|s| filter.category.map_or(true, |c| s.category == c))
            .filter(|s| filter.min_price.map_or(true, |min| s.price >= min))
            .filter(|s| filter.max_price.map_or(true, |max| s.price <= max))
            .filter(|s| {
                location_needle.as_ref().map_or(true, |loc| {
                    s.location
                        .as_ref()
                        .map_or(false, |l| l.to_lowercase().contains(loc))
                })
            })
            .filter(|s| {
                filter
                    .shipping_available
                    .map_or(true, |want| s.shipping_available == want)
            })
            .filter(|s| !filter.acp_only || s.acp_agent_wallet.is_some())
            .filter(|s| {
                needle
                    .as_ref()
                    .map_or(true, |q| s.search_text().contains(q))
            })
            .collect();

        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matched.len();
        let services = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();
        Ok(ServicePage { services, total })
    }
}
