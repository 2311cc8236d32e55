//! Upstream directory fetcher.
//!
//! `DirectoryFetcher` is the seam between the cache and the network; the
//! production implementation pages through the acpx agent API with bounded
//! concurrency and a per-request timeout. A failed first page fails the
//! whole fetch; later pages degrade to warnings so one flaky page does not
//! discard an otherwise complete generation.

use crate::config::RegistrySettings;
use crate::error::ApiError;
use crate::registry::snapshot::RegistryEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of complete directory generations.
#[async_trait]
pub trait DirectoryFetcher: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RegistryEntry>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    meta: RawMeta,
}

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    #[serde(default)]
    pagination: RawPagination,
}

#[derive(Debug, Default, Deserialize)]
struct RawPagination {
    #[serde(default)]
    total: u64,
    #[serde(default, rename = "pageCount")]
    page_count: u32,
}

/// Parse one raw agent object into a registry entry. Agents without a
/// usable name are skipped.
pub fn parse_entry(data: &serde_json::Value) -> Option<RegistryEntry> {
    let name = data.get("name")?.as_str()?.trim();
    if name.is_empty() || name == "Unknown" {
        return None;
    }

    let mut job_offerings: Vec<String> = Vec::new();
    for key in ["offerings", "jobs"] {
        if let Some(items) = data.get(key).and_then(|v| v.as_array()) {
            for item in items {
                if let Some(job_name) = item.get("name").and_then(|n| n.as_str()) {
                    if !job_name.is_empty() && !job_offerings.iter().any(|o| o == job_name) {
                        job_offerings.push(job_name.to_string());
                    }
                }
            }
        }
    }

    let metrics = data.get("metrics");
    let online = metrics
        .and_then(|m| m.get("isOnline"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let last_active: Option<DateTime<Utc>> = metrics
        .and_then(|m| m.get("lastActiveAt"))
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(RegistryEntry {
        id: data.get("id").and_then(|v| v.as_u64()),
        name: name.to_string(),
        wallet_address: data
            .get("walletAddress")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        description: data
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        category: data
            .get("category")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        online,
        job_offerings,
        last_active,
    })
}

/// Fetcher for the acpx agent directory.
pub struct AcpxFetcher {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
    concurrent_batch: usize,
}

impl AcpxFetcher {
    pub fn new(settings: &RegistrySettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.fetch_timeout_secs))
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build registry client: {}", e)))?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            page_size: settings.page_size,
            concurrent_batch: settings.concurrent_batch.max(1),
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<RawPage, ApiError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("pagination[page]", page.to_string()),
                ("pagination[pageSize]", self.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::UpstreamUnavailable(format!("page {}: {}", page, e)))?;
        let response = response
            .error_for_status()
            .map_err(|e| ApiError::UpstreamUnavailable(format!("page {}: {}", page, e)))?;
        response
            .json::<RawPage>()
            .await
            .map_err(|e| ApiError::UpstreamUnavailable(format!("page {}: {}", page, e)))
    }
}

#[async_trait]
impl DirectoryFetcher for AcpxFetcher {
    async fn fetch_all(&self) -> Result<Vec<RegistryEntry>, ApiError> {
        let first = self.fetch_page(1).await?;
        let total = first.meta.pagination.total;
        let page_count = first.meta.pagination.page_count.max(1);
        debug!(total, page_count, "registry directory pagination");

        let mut agents: Vec<RegistryEntry> =
            first.data.iter().filter_map(parse_entry).collect();

        if page_count > 1 {
            let fetches = (2..=page_count).map(|page| async move {
                (page, self.fetch_page(page).await)
            });
            let pages: Vec<(u32, Result<RawPage, ApiError>)> = stream::iter(fetches)
                .buffered(self.concurrent_batch)
                .collect()
                .await;
            for (page, result) in pages {
                match result {
                    Ok(raw) => agents.extend(raw.data.iter().filter_map(parse_entry)),
                    Err(e) => warn!(page, error = %e, "registry page fetch failed, skipping"),
                }
            }
        }

        if agents.is_empty() {
            return Err(ApiError::UpstreamUnavailable(
                "directory returned no agents".to_string(),
            ));
        }
        Ok(agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_entry_full() {
        let raw = json!({
            "id": 7,
            "name": "PrintBot",
            "walletAddress": "0xabc",
            "description": "3D printing service",
            "category": "fabrication",
            "offerings": [{"name": "PLA print"}],
            "jobs": [{"name": "PLA print"}, {"name": "Resin print"}],
            "metrics": {"isOnline": true, "lastActiveAt": "2026-01-02T03:04:05Z"}
        });
        let entry = parse_entry(&raw).unwrap();
        assert_eq!(entry.id, Some(7));
        assert_eq!(entry.name, "PrintBot");
        assert!(entry.online);
        // Offerings and jobs are merged without duplicates.
        assert_eq!(entry.job_offerings, vec!["PLA print", "Resin print"]);
        assert!(entry.last_active.is_some());
    }

    #[test]
    fn test_parse_entry_skips_unnamed() {
        assert!(parse_entry(&json!({"description": "no name"})).is_none());
        assert!(parse_entry(&json!({"name": "Unknown"})).is_none());
        assert!(parse_entry(&json!({"name": "   "})).is_none());
    }

    #[test]
    fn test_parse_entry_defaults() {
        let entry = parse_entry(&json!({"name": "Minimal"})).unwrap();
        assert!(!entry.online);
        assert!(entry.wallet_address.is_empty());
        assert!(entry.job_offerings.is_empty());
        assert!(entry.last_active.is_none());
    }

    #[test]
    fn test_raw_page_tolerates_missing_meta() {
        let page: RawPage = serde_json::from_value(json!({"data": []})).unwrap();
        assert_eq!(page.meta.pagination.page_count, 0);
        assert!(page.data.is_empty());
    }
}
