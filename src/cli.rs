//! CLI Tooling
//!
//! Command-line interface over the marketplace operations: post and work
//! bounties, manage service listings, query the registry mirror, and run
//! the background daemon.

use crate::api::{
    AgentListQuery, CancelRequest, ClaimRequest, CreateBountyRequest, CreateServiceRequest,
    FulfillRequest, MarketApi, MatchRequest, UnclaimRequest, UpdateServiceRequest,
};
use crate::bounty::{BountyFilter, BountyStatus};
use crate::catalog::ServiceFilter;
use crate::config::{Settings, SettingsLoader};
use crate::error::ApiError;
use crate::notify::Notifier;
use crate::registry::{AcpxFetcher, RegistryCache};
use crate::store::MarketStore;
use crate::tasks;
use crate::types::{BountyId, Category, ServiceId};
use crate::version::Conditional;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Bountyboard CLI - bounty marketplace with an ACP registry mirror
#[derive(Parser)]
#[command(name = "bountyboard")]
#[command(about = "Bounty marketplace: post, claim, match, and fulfill bounties")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides configuration)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bounty operations
    Bounty {
        #[command(subcommand)]
        command: BountyCommands,
    },
    /// Service listing operations
    Service {
        #[command(subcommand)]
        command: ServiceCommands,
    },
    /// Registry mirror operations
    Registry {
        #[command(subcommand)]
        command: RegistryCommands,
    },
    /// Platform statistics
    Stats,
    /// Storage and registry health
    Health,
    /// Run the background daemon (periodic refresh + bounty expiry)
    Daemon,
}

#[derive(Subcommand)]
pub enum BountyCommands {
    /// Post a new bounty (prints the poster secret once)
    Create {
        #[arg(long)]
        poster: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        requirements: Option<String>,
        #[arg(long)]
        budget: f64,
        #[arg(long, default_value = "digital")]
        category: Category,
        #[arg(long)]
        tags: Option<String>,
        /// Auto-cancel after this many days
        #[arg(long)]
        expires_in_days: Option<i64>,
        #[arg(long)]
        callback_url: Option<String>,
    },
    /// List bounties
    List {
        #[arg(long)]
        status: Option<BountyStatus>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        min_budget: Option<f64>,
        #[arg(long)]
        max_budget: Option<f64>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Show one bounty
    Get {
        id: BountyId,
        /// Skip the payload when this fingerprint still matches
        #[arg(long)]
        if_not_matching: Option<String>,
    },
    /// Claim an open bounty (prints the claimer secret once)
    Claim {
        id: BountyId,
        #[arg(long)]
        claimer: String,
        #[arg(long)]
        callback_url: Option<String>,
    },
    /// Release a claimed bounty back to the open pool
    Unclaim {
        id: BountyId,
        #[arg(long)]
        claimer_secret: String,
    },
    /// Bind a claimed bounty to a registry agent
    Match {
        id: BountyId,
        #[arg(long)]
        poster_secret: String,
        #[arg(long)]
        service_id: Option<ServiceId>,
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        job: String,
    },
    /// Mark a bounty fulfilled
    Fulfill {
        id: BountyId,
        #[arg(long)]
        poster_secret: String,
        #[arg(long)]
        acp_job_id: Option<String>,
    },
    /// Cancel a bounty
    Cancel {
        id: BountyId,
        #[arg(long)]
        poster_secret: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show advisory registry matches for a bounty
    Matches { id: BountyId },
}

#[derive(Subcommand)]
pub enum ServiceCommands {
    /// List a new service (prints the agent secret once)
    Create {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value = "digital")]
        category: Category,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        shipping: bool,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        wallet: Option<String>,
        #[arg(long)]
        job_offering: Option<String>,
    },
    /// List active services
    List {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// Only services with ACP linkage
        #[arg(long)]
        acp_only: bool,
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Show one service
    Get { id: ServiceId },
    /// Replace a listing's mutable fields
    Update {
        id: ServiceId,
        #[arg(long)]
        agent_secret: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value = "digital")]
        category: Category,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        shipping: bool,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        wallet: Option<String>,
        #[arg(long)]
        job_offering: Option<String>,
    },
    /// Deactivate a listing
    Deactivate {
        id: ServiceId,
        #[arg(long)]
        agent_secret: String,
    },
}

#[derive(Subcommand)]
pub enum RegistryCommands {
    /// List mirrored agents
    List {
        /// Classifier category (products, services)
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        online_only: bool,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Search mirrored agents
    Search {
        query: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Force a refresh from upstream (requires the operator secret)
    Refresh {
        #[arg(long, env = "BOUNTY_ADMIN_SECRET")]
        admin_secret: String,
    },
}

/// Wires the store, cache, and notifier together for command execution.
pub struct CliContext {
    api: MarketApi,
    settings: Settings,
}

fn colored_status(status: BountyStatus) -> String {
    match status {
        BountyStatus::Open => status.as_str().green().to_string(),
        BountyStatus::Claimed => status.as_str().yellow().to_string(),
        BountyStatus::Matched => status.as_str().cyan().to_string(),
        BountyStatus::Fulfilled => status.as_str().blue().to_string(),
        BountyStatus::Cancelled => status.as_str().red().to_string(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Config(format!("output serialization failed: {}", e)))
}

impl CliContext {
    pub fn new(mut settings: Settings, data_dir: Option<PathBuf>) -> Result<Self, ApiError> {
        if let Some(dir) = data_dir {
            settings.data_dir = dir;
        }
        let store = Arc::new(
            MarketStore::open(&settings.data_dir.join("market")).map_err(ApiError::from)?,
        );
        let fetcher = Arc::new(AcpxFetcher::new(&settings.registry)?);
        let registry = Arc::new(RegistryCache::new(fetcher, settings.registry_cache_config()));
        let notifier = Notifier::new(
            settings.webhook_signing_secret.clone(),
            settings.webhook_timeout(),
        )?;
        let api = MarketApi::new(store, registry, notifier, settings.admin_secret.clone());
        Ok(Self { api, settings })
    }

    pub fn load_settings(cli: &Cli) -> Result<Settings, ApiError> {
        let mut settings = SettingsLoader::load(cli.config.as_deref())?;
        if let Some(level) = &cli.log_level {
            settings.logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            settings.logging.format = format.clone();
        }
        Ok(settings)
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Bounty { command } => self.execute_bounty(command).await,
            Commands::Service { command } => self.execute_service(command),
            Commands::Registry { command } => self.execute_registry(command).await,
            Commands::Stats => to_json(&self.api.stats()?),
            Commands::Health => to_json(&self.api.health()),
            Commands::Daemon => self.run_daemon().await,
        }
    }

    async fn execute_bounty(&self, command: &BountyCommands) -> Result<String, ApiError> {
        match command {
            BountyCommands::Create {
                poster,
                title,
                description,
                requirements,
                budget,
                category,
                tags,
                expires_in_days,
                callback_url,
            } => {
                let response = self.api.create_bounty(CreateBountyRequest {
                    poster_name: poster.clone(),
                    poster_callback_url: callback_url.clone(),
                    title: title.clone(),
                    description: description.clone(),
                    requirements: requirements.clone(),
                    budget: *budget,
                    category: *category,
                    tags: tags.clone(),
                    expires_at: (*expires_in_days).map(|d| Utc::now() + ChronoDuration::days(d)),
                })?;
                let mut out = format!(
                    "Bounty #{} posted.\nposter_secret: {}\n{}\n{}",
                    response.bounty.id,
                    response.poster_secret,
                    "Store this secret now; it will not be shown again.".yellow(),
                    response.message,
                );
                for candidate in &response.registry_matches {
                    out.push_str(&format!(
                        "\n  candidate: {} ({})",
                        candidate.name, candidate.wallet_address
                    ));
                }
                Ok(out)
            }
            BountyCommands::List {
                status,
                category,
                min_budget,
                max_budget,
                search,
                limit,
                offset,
            } => {
                let response = self.api.list_bounties(BountyFilter {
                    status: *status,
                    category: *category,
                    min_budget: *min_budget,
                    max_budget: *max_budget,
                    search: search.clone(),
                    limit: *limit,
                    offset: *offset,
                })?;
                let mut table = Table::new();
                table.set_header(vec!["id", "status", "title", "budget", "category", "claimed by"]);
                for bounty in &response.bounties {
                    table.add_row(vec![
                        bounty.id.to_string(),
                        colored_status(bounty.status),
                        bounty.title.clone(),
                        format!("{:.2}", bounty.budget),
                        bounty.category.to_string(),
                        bounty.claimed_by.clone().unwrap_or_default(),
                    ]);
                }
                Ok(format!("{}\n{} of {} bounties", table, response.bounties.len(), response.total))
            }
            BountyCommands::Get { id, if_not_matching } => {
                match self.api.get_bounty(*id, if_not_matching.as_deref())? {
                    Conditional::Unchanged { tag } => {
                        Ok(format!("unchanged (fingerprint {})", tag))
                    }
                    Conditional::Fresh { tag, body } => {
                        Ok(format!("fingerprint: {}\n{}", tag, to_json(&body)?))
                    }
                }
            }
            BountyCommands::Claim {
                id,
                claimer,
                callback_url,
            } => {
                let response = self.api.claim_bounty(
                    *id,
                    ClaimRequest {
                        claimer_name: claimer.clone(),
                        claimer_callback_url: callback_url.clone(),
                    },
                )?;
                Ok(format!(
                    "Bounty #{} claimed by {}.\nclaimer_secret: {}\n{}",
                    response.bounty_id,
                    response.claimed_by,
                    response.claimer_secret,
                    "Store this secret now; it will not be shown again.".yellow(),
                ))
            }
            BountyCommands::Unclaim { id, claimer_secret } => {
                let bounty = self.api.unclaim_bounty(
                    *id,
                    UnclaimRequest {
                        claimer_secret: claimer_secret.clone(),
                    },
                )?;
                Ok(format!("Bounty #{} is open again.", bounty.id))
            }
            BountyCommands::Match {
                id,
                poster_secret,
                service_id,
                wallet,
                job,
            } => {
                let bounty = self.api.match_bounty(
                    *id,
                    MatchRequest {
                        poster_secret: poster_secret.clone(),
                        service_id: *service_id,
                        acp_agent_wallet: wallet.clone(),
                        acp_job_offering: job.clone(),
                    },
                )?;
                Ok(format!(
                    "Bounty #{} matched to {}.",
                    bounty.id,
                    bounty.matched_acp_agent.unwrap_or_default()
                ))
            }
            BountyCommands::Fulfill {
                id,
                poster_secret,
                acp_job_id,
            } => {
                let bounty = self.api.fulfill_bounty(
                    *id,
                    FulfillRequest {
                        poster_secret: poster_secret.clone(),
                        acp_job_id: acp_job_id.clone(),
                    },
                )?;
                Ok(format!("Bounty #{} fulfilled.", bounty.id))
            }
            BountyCommands::Cancel {
                id,
                poster_secret,
                yes,
            } => {
                if !yes {
                    let confirmed = dialoguer::Confirm::new()
                        .with_prompt(format!("Cancel bounty #{}? This is terminal.", id))
                        .default(false)
                        .interact()
                        .map_err(|e| ApiError::Config(format!("confirmation failed: {}", e)))?;
                    if !confirmed {
                        return Ok("Aborted.".to_string());
                    }
                }
                let bounty = self.api.cancel_bounty(
                    *id,
                    CancelRequest {
                        poster_secret: poster_secret.clone(),
                    },
                )?;
                Ok(format!("Bounty #{} cancelled.", bounty.id))
            }
            BountyCommands::Matches { id } => {
                let candidates = self.api.check_matches(*id)?;
                if candidates.is_empty() {
                    return Ok("No registry candidates for this bounty.".to_string());
                }
                let mut table = Table::new();
                table.set_header(vec!["score", "agent", "wallet", "offerings"]);
                for candidate in &candidates {
                    table.add_row(vec![
                        candidate.score.to_string(),
                        candidate.name.clone(),
                        candidate.wallet_address.clone(),
                        candidate.job_offerings.join(", "),
                    ]);
                }
                Ok(table.to_string())
            }
        }
    }

    fn execute_service(&self, command: &ServiceCommands) -> Result<String, ApiError> {
        match command {
            ServiceCommands::Create {
                agent,
                name,
                description,
                price,
                category,
                location,
                shipping,
                tags,
                wallet,
                job_offering,
            } => {
                let response = self.api.create_service(CreateServiceRequest {
                    agent_name: agent.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    price: *price,
                    category: *category,
                    location: location.clone(),
                    shipping_available: *shipping,
                    tags: tags.clone(),
                    acp_agent_wallet: wallet.clone(),
                    acp_job_offering: job_offering.clone(),
                })?;
                Ok(format!(
                    "Service #{} listed.\nagent_secret: {}\n{}",
                    response.service.id,
                    response.agent_secret,
                    "Store this secret now; it will not be shown again.".yellow(),
                ))
            }
            ServiceCommands::List {
                category,
                search,
                location,
                acp_only,
                limit,
                offset,
            } => {
                let response = self.api.list_services(ServiceFilter {
                    category: *category,
                    search: search.clone(),
                    location: location.clone(),
                    acp_only: *acp_only,
                    limit: *limit,
                    offset: *offset,
                    ..Default::default()
                })?;
                let mut table = Table::new();
                table.set_header(vec!["id", "name", "agent", "price", "category", "location"]);
                for service in &response.services {
                    table.add_row(vec![
                        service.id.to_string(),
                        service.name.clone(),
                        service.agent_name.clone(),
                        format!("{:.2}", service.price),
                        service.category.to_string(),
                        service.location.clone().unwrap_or_default(),
                    ]);
                }
                Ok(format!("{}\n{} of {} services", table, response.services.len(), response.total))
            }
            ServiceCommands::Get { id } => match self.api.get_service(*id, None)? {
                Conditional::Fresh { tag, body } => {
                    Ok(format!("fingerprint: {}\n{}", tag, to_json(&body)?))
                }
                Conditional::Unchanged { tag } => Ok(format!("unchanged (fingerprint {})", tag)),
            },
            ServiceCommands::Update {
                id,
                agent_secret,
                name,
                description,
                price,
                category,
                location,
                shipping,
                tags,
                wallet,
                job_offering,
            } => {
                let service = self.api.update_service(
                    *id,
                    UpdateServiceRequest {
                        agent_secret: agent_secret.clone(),
                        name: name.clone(),
                        description: description.clone(),
                        price: *price,
                        category: *category,
                        location: location.clone(),
                        shipping_available: *shipping,
                        tags: tags.clone(),
                        acp_agent_wallet: wallet.clone(),
                        acp_job_offering: job_offering.clone(),
                    },
                )?;
                Ok(format!("Service #{} updated.", service.id))
            }
            ServiceCommands::Deactivate { id, agent_secret } => {
                let service = self.api.deactivate_service(*id, agent_secret)?;
                Ok(format!("Service #{} deactivated.", service.id))
            }
        }
    }

    async fn execute_registry(&self, command: &RegistryCommands) -> Result<String, ApiError> {
        match command {
            RegistryCommands::List {
                category,
                online_only,
                page,
                limit,
            } => {
                let response = self.api.registry_agents(AgentListQuery {
                    category: category.clone(),
                    online_only: *online_only,
                    page: Some(*page),
                    limit: Some(*limit),
                })?;
                let mut table = Table::new();
                table.set_header(vec!["name", "wallet", "online", "offerings"]);
                for agent in &response.agents {
                    table.add_row(vec![
                        agent.name.clone(),
                        agent.wallet_address.clone(),
                        agent.online.to_string(),
                        agent.job_offerings.join(", "),
                    ]);
                }
                Ok(format!(
                    "{}\npage {}/{} — {} agents in registry",
                    table, response.page, response.total_pages, response.total_in_registry
                ))
            }
            RegistryCommands::Search { query, limit } => {
                let response = self.api.search_agents(query, *limit)?;
                let mut table = Table::new();
                table.set_header(vec!["name", "wallet", "description"]);
                for agent in &response.agents {
                    table.add_row(vec![
                        agent.name.clone(),
                        agent.wallet_address.clone(),
                        agent.description.clone(),
                    ]);
                }
                Ok(format!("{}\n{} match(es)", table, response.count))
            }
            RegistryCommands::Refresh { admin_secret } => {
                let response = self.api.force_refresh(admin_secret).await?;
                Ok(format!(
                    "Registry refreshed: {} agents at {}.",
                    response.agents, response.fetched_at
                ))
            }
        }
    }

    async fn run_daemon(&self) -> Result<String, ApiError> {
        let registry = Arc::clone(self.api.registry());
        let refresh_interval = self.settings.registry_refresh_interval();
        let expiry_interval = self.settings.expiry_check_interval();
        let lifecycle = self.api.lifecycle().clone();

        info!(
            refresh_interval_secs = refresh_interval.as_secs(),
            expiry_interval_secs = expiry_interval.as_secs(),
            "daemon starting"
        );

        // Warm the mirror immediately; failures fall back to the cache file.
        if let Err(e) = registry.refresh(false).await {
            tracing::warn!(error = %e, "initial registry refresh failed; serving cached data");
        }

        let refresh = tasks::spawn_supervised("registry_refresh", {
            let registry = Arc::clone(&registry);
            move || tasks::registry_refresh_loop(Arc::clone(&registry), refresh_interval)
        });
        let expiry = tasks::spawn_supervised("bounty_expiry", {
            move || tasks::bounty_expiry_loop(lifecycle.clone(), expiry_interval)
        });

        let _ = tokio::join!(refresh, expiry);
        Ok(String::new())
    }
}
