//! Local mirror of the external agent directory.
//!
//! Readers always get the current in-memory snapshot and never wait on the
//! network: a stale snapshot schedules a background refresh and is served
//! anyway. Refreshes are single-flight; a new generation is built fully off
//! to the side and swapped in atomically, and an upstream failure leaves
//! the previous generation untouched.

pub mod fetcher;
pub mod snapshot;

pub use fetcher::{AcpxFetcher, DirectoryFetcher};
pub use snapshot::{RegistryEntry, RegistrySnapshot, CATEGORY_PRODUCTS, CATEGORY_SERVICES};

use crate::error::ApiError;
use crate::registry::snapshot::CacheFile;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct RegistryCacheConfig {
    /// Snapshot age beyond which reads schedule a background refresh.
    pub ttl: Duration,
    /// Upper bound on one whole refresh, all pages included.
    pub refresh_deadline: Duration,
    /// Durable snapshot location; None disables persistence.
    pub cache_file: Option<PathBuf>,
}

impl Default for RegistryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            refresh_deadline: Duration::from_secs(120),
            cache_file: None,
        }
    }
}

/// Health signal reported to the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheHealth {
    Healthy,
    Stale,
    Empty,
}

impl CacheHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheHealth::Healthy => "healthy",
            CacheHealth::Stale => "stale",
            CacheHealth::Empty => "empty",
        }
    }
}

/// Result of an explicit refresh call.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub agent_count: usize,
    pub fetched_at: DateTime<Utc>,
    /// True when this caller joined a refresh that was already in flight
    /// (or just completed while it waited) instead of fetching itself.
    pub joined_in_flight: bool,
}

/// The registry mirror.
pub struct RegistryCache {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    /// Single-flight guard: at most one upstream fetch at a time.
    refresh_gate: tokio::sync::Mutex<()>,
    /// Bumped on every successful swap; lets late refresh callers detect
    /// that the generation they waited for already landed.
    generation: AtomicU64,
    /// Debounces fire-and-forget scheduling from stale reads.
    refresh_scheduled: AtomicBool,
    last_error: Mutex<Option<String>>,
    fetcher: Arc<dyn DirectoryFetcher>,
    config: RegistryCacheConfig,
}

impl RegistryCache {
    /// Create the cache, seeding the snapshot from the durable cache file
    /// when one exists so a restart serves stale-but-non-empty data.
    pub fn new(fetcher: Arc<dyn DirectoryFetcher>, config: RegistryCacheConfig) -> Self {
        let initial = config
            .cache_file
            .as_deref()
            .and_then(|path| match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                    Ok(file) => {
                        let snapshot = file.into_snapshot();
                        info!(
                            agents = snapshot.len(),
                            path = %path.display(),
                            "loaded registry cache from file"
                        );
                        Some(snapshot)
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "registry cache file unreadable");
                        None
                    }
                },
                Err(_) => None,
            })
            .unwrap_or_else(RegistrySnapshot::empty);

        Self {
            snapshot: RwLock::new(Arc::new(initial)),
            refresh_gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            refresh_scheduled: AtomicBool::new(false),
            last_error: Mutex::new(None),
            fetcher,
            config,
        }
    }

    /// The current complete generation. Cheap: one Arc clone.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().clone()
    }

    pub fn is_stale(&self) -> bool {
        let fetched_at = match self.snapshot.read().fetched_at() {
            Some(at) => at,
            None => return true,
        };
        match chrono::Duration::from_std(self.config.ttl) {
            Ok(ttl) => Utc::now() - fetched_at > ttl,
            Err(_) => false,
        }
    }

    pub fn health(&self) -> CacheHealth {
        if self.snapshot.read().is_empty() {
            CacheHealth::Empty
        } else if self.is_stale() {
            CacheHealth::Stale
        } else {
            CacheHealth::Healthy
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Fire-and-forget refresh when the snapshot is past its TTL. Best
    /// effort: skipped when a refresh is already scheduled or in flight,
    /// and a no-op outside a tokio runtime.
    pub fn maybe_schedule_refresh(self: Arc<Self>) {
        if !self.is_stale() {
            return;
        }
        if self
            .refresh_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = self.refresh(false).await {
                        debug!(error = %e, "background refresh failed; stale snapshot retained");
                    }
                    self.refresh_scheduled.store(false, Ordering::SeqCst);
                });
            }
            Err(_) => self.refresh_scheduled.store(false, Ordering::SeqCst),
        }
    }

    /// Refresh the mirror from upstream.
    ///
    /// Single-flight: concurrent callers serialize on the gate, and a
    /// caller that waited while another refresh landed returns that
    /// generation instead of fetching again. Without `force`, a snapshot
    /// still within TTL is returned as-is. On failure the previous
    /// snapshot is retained and only this caller sees the error.
    pub async fn refresh(&self, force: bool) -> Result<RefreshOutcome, ApiError> {
        let entry_generation = self.generation.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;

        if self.generation.load(Ordering::SeqCst) != entry_generation {
            let snapshot = self.snapshot();
            return Ok(RefreshOutcome {
                agent_count: snapshot.len(),
                fetched_at: snapshot.fetched_at().unwrap_or_else(Utc::now),
                joined_in_flight: true,
            });
        }

        if !force && !self.is_stale() {
            let snapshot = self.snapshot();
            return Ok(RefreshOutcome {
                agent_count: snapshot.len(),
                fetched_at: snapshot.fetched_at().unwrap_or_else(Utc::now),
                joined_in_flight: false,
            });
        }

        let fetched =
            tokio::time::timeout(self.config.refresh_deadline, self.fetcher.fetch_all()).await;
        let agents = match fetched {
            Ok(Ok(agents)) => agents,
            Ok(Err(e)) => {
                *self.last_error.lock() = Some(e.to_string());
                warn!(error = %e, "registry refresh failed; previous snapshot retained");
                return Err(e);
            }
            Err(_) => {
                let e = ApiError::UpstreamUnavailable(format!(
                    "refresh exceeded deadline of {:?}",
                    self.config.refresh_deadline
                ));
                *self.last_error.lock() = Some(e.to_string());
                warn!("registry refresh timed out; previous snapshot retained");
                return Err(e);
            }
        };

        let fetched_at = Utc::now();
        let agent_count = agents.len();
        let next = Arc::new(RegistrySnapshot::build(agents, Some(fetched_at)));
        *self.snapshot.write() = Arc::clone(&next);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock() = None;
        info!(agents = agent_count, "registry cache refreshed");

        if let Some(path) = &self.config.cache_file {
            let file = CacheFile::from_snapshot(&next);
            if let Err(e) = persist_cache_file(path, &file) {
                warn!(path = %path.display(), error = %e, "failed to persist registry cache");
            }
        }

        Ok(RefreshOutcome {
            agent_count,
            fetched_at,
            joined_in_flight: false,
        })
    }
}

fn persist_cache_file(path: &std::path::Path, file: &CacheFile) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec(file)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, bytes)
}
