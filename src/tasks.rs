//! Background tasks: periodic registry refresh and bounty expiry.
//!
//! Each loop handles its own per-iteration failures; the supervisor only
//! restarts a loop that exits entirely, with a delay so a crash cannot
//! spin.

use crate::bounty::BountyLifecycle;
use crate::registry::RegistryCache;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Delay before restarting a background task that exited.
pub const TASK_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Run a task forever, restarting on exit with a delay.
pub fn spawn_supervised<F, Fut>(name: &'static str, factory: F) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            factory().await;
            error!(
                task = name,
                restart_delay_secs = TASK_RESTART_DELAY.as_secs(),
                "background task exited, restarting"
            );
            sleep(TASK_RESTART_DELAY).await;
        }
    })
}

/// Refresh the registry mirror on a fixed interval. Refresh failures are
/// logged and the stale snapshot keeps serving.
pub async fn registry_refresh_loop(cache: Arc<RegistryCache>, interval: Duration) {
    loop {
        sleep(interval).await;
        debug!("periodic registry refresh starting");
        match cache.refresh(false).await {
            Ok(outcome) => {
                if outcome.joined_in_flight {
                    debug!("periodic refresh joined an in-flight refresh");
                } else {
                    debug!(agents = outcome.agent_count, "periodic registry refresh complete");
                }
            }
            Err(e) => error!(error = %e, "periodic registry refresh failed"),
        }
    }
}

/// Cancel expired bounties on a fixed interval.
pub async fn bounty_expiry_loop(lifecycle: BountyLifecycle, interval: Duration) {
    loop {
        sleep(interval).await;
        match lifecycle.expire_due(Utc::now()) {
            Ok(expired) if !expired.is_empty() => {
                info!(count = expired.len(), "expired bounties cancelled");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "bounty expiration sweep failed"),
        }
    }
}
