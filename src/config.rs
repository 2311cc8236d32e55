//! Layered configuration.
//!
//! Precedence: built-in defaults, then an optional TOML file, then
//! `BOUNTY__`-prefixed environment variables (highest). The core receives
//! these values at startup; nothing here is consulted again afterwards.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::registry::RegistryCacheConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "bountyboard", "bountyboard")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_expiry_interval_secs() -> u64 {
    3_600
}

/// Registry mirror settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Upstream agent directory endpoint.
    #[serde(default = "RegistrySettings::default_base_url")]
    pub base_url: String,

    /// Durable snapshot file; defaults to `<data_dir>/acp_cache.json`.
    #[serde(default)]
    pub cache_file: Option<PathBuf>,

    /// Snapshot freshness TTL in seconds.
    #[serde(default = "RegistrySettings::default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,

    /// Per-request upstream timeout in seconds.
    #[serde(default = "RegistrySettings::default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound on one whole refresh in seconds.
    #[serde(default = "RegistrySettings::default_refresh_deadline_secs")]
    pub refresh_deadline_secs: u64,

    /// Agents per page requested from upstream.
    #[serde(default = "RegistrySettings::default_page_size")]
    pub page_size: u32,

    /// Concurrent page fetches per refresh.
    #[serde(default = "RegistrySettings::default_concurrent_batch")]
    pub concurrent_batch: usize,
}

impl RegistrySettings {
    fn default_base_url() -> String {
        "https://acpx.virtuals.io/api/agents".to_string()
    }

    fn default_refresh_ttl_secs() -> u64 {
        300
    }

    fn default_fetch_timeout_secs() -> u64 {
        15
    }

    fn default_refresh_deadline_secs() -> u64 {
        120
    }

    fn default_page_size() -> u32 {
        100
    }

    fn default_concurrent_batch() -> usize {
        5
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            cache_file: None,
            refresh_ttl_secs: Self::default_refresh_ttl_secs(),
            fetch_timeout_secs: Self::default_fetch_timeout_secs(),
            refresh_deadline_secs: Self::default_refresh_deadline_secs(),
            page_size: Self::default_page_size(),
            concurrent_batch: Self::default_concurrent_batch(),
        }
    }
}

/// Top-level settings handed to the core at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the sled store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Operator secret gating force-refresh. Absent means the operation
    /// can never succeed.
    #[serde(default)]
    pub admin_secret: Option<String>,

    /// Origins allowed by the (external) HTTP layer.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Key for signing outbound webhook bodies.
    #[serde(default)]
    pub webhook_signing_secret: Option<String>,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    #[serde(default)]
    pub registry: RegistrySettings,

    /// Interval of the bounty expiry sweep in seconds.
    #[serde(default = "default_expiry_interval_secs")]
    pub expiry_check_interval_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            admin_secret: None,
            allowed_origins: Vec::new(),
            webhook_signing_secret: None,
            webhook_timeout_secs: default_webhook_timeout_secs(),
            registry: RegistrySettings::default(),
            expiry_check_interval_secs: default_expiry_interval_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Effective registry cache file path.
    pub fn registry_cache_file(&self) -> PathBuf {
        self.registry
            .cache_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("acp_cache.json"))
    }

    pub fn registry_cache_config(&self) -> RegistryCacheConfig {
        RegistryCacheConfig {
            ttl: Duration::from_secs(self.registry.refresh_ttl_secs),
            refresh_deadline: Duration::from_secs(self.registry.refresh_deadline_secs),
            cache_file: Some(self.registry_cache_file()),
        }
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_secs)
    }

    pub fn registry_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.registry.refresh_ttl_secs)
    }
}

/// Settings loader facade.
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from an optional file plus environment overlay.
    /// Precedence: defaults (lowest) -> file -> environment (highest).
    pub fn load(file: Option<&Path>) -> Result<Settings, ApiError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            let path = path.to_str().ok_or_else(|| {
                ApiError::Config("config file path is not valid UTF-8".to_string())
            })?;
            builder = builder.add_source(File::with_name(path));
        }
        let builder = builder.add_source(
            Environment::with_prefix("BOUNTY")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("allowed_origins")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| ApiError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_complete() {
        let settings = SettingsLoader::load(None).unwrap();
        assert!(settings.admin_secret.is_none());
        assert_eq!(settings.registry.page_size, 100);
        assert_eq!(settings.registry.refresh_ttl_secs, 300);
        assert_eq!(settings.webhook_timeout_secs, 10);
        assert!(settings
            .registry_cache_file()
            .ends_with("acp_cache.json"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bountyboard.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "admin_secret = \"op-secret\"\n\n[registry]\nrefresh_ttl_secs = 60\npage_size = 25"
        )
        .unwrap();

        let settings = SettingsLoader::load(Some(&path)).unwrap();
        assert_eq!(settings.admin_secret.as_deref(), Some("op-secret"));
        assert_eq!(settings.registry.refresh_ttl_secs, 60);
        assert_eq!(settings.registry.page_size, 25);
        // Untouched keys keep their defaults.
        assert_eq!(settings.registry.concurrent_batch, 5);
    }

    #[test]
    fn test_cache_config_durations() {
        let settings = Settings::default();
        let cache = settings.registry_cache_config();
        assert_eq!(cache.ttl, Duration::from_secs(300));
        assert_eq!(cache.refresh_deadline, Duration::from_secs(120));
        assert!(cache.cache_file.is_some());
    }
}
