//! Logging System
//!
//! Structured logging built on the `tracing` crate: configurable level,
//! text or JSON format, and stdout/stderr/file destinations, with
//! module-level overrides.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means a path under
    /// the platform state directory
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Resolve the log file path: BOUNTY_LOG_FILE env, config file value, then
/// the platform state directory.
pub fn resolve_log_file_path(config_file: Option<PathBuf>) -> Result<PathBuf, ApiError> {
    if let Ok(env_path) = std::env::var("BOUNTY_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    let project_dirs = directories::ProjectDirs::from("", "bountyboard", "bountyboard")
        .ok_or_else(|| {
            ApiError::Config("could not determine platform state directory for log file".to_string())
        })?;
    let state_dir = project_dirs
        .state_dir()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
    Ok(state_dir.join("bountyboard.log"))
}

/// Initialize the logging system.
///
/// Priority order (highest to lowest): environment variables (BOUNTY_LOG,
/// BOUNTY_LOG_FORMAT, BOUNTY_LOG_OUTPUT, BOUNTY_LOG_FILE), configuration,
/// defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let disabled = config.map(|c| !c.enabled).unwrap_or(false);
    if disabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true) && !output.file;

    let writer: BoxMakeWriter = if output.file {
        let log_file = resolve_log_file_path(config.and_then(|c| c.file.clone()))?;
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::Config(format!("failed to create log directory: {}", e))
            })?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| {
                ApiError::Config(format!("failed to open log file {:?}: {}", log_file, e))
            })?;
        if output.stderr {
            BoxMakeWriter::new(file.and(std::io::stderr))
        } else {
            BoxMakeWriter::new(file)
        }
    } else if output.stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let base_subscriber = Registry::default().with(filter);
    if format == "json" {
        base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init();
    } else {
        base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .init();
    }

    Ok(())
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env("BOUNTY_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| ApiError::Config(format!("invalid log directive: {}", e)))?,
            );
        }
    }
    Ok(filter)
}

/// Determine output format from config or environment
fn determine_format(config: Option<&LoggingConfig>) -> Result<String, ApiError> {
    if let Ok(format) = std::env::var("BOUNTY_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(ApiError::Config(format!(
            "invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}

/// Output destinations
struct OutputDestinations {
    stderr: bool,
    file: bool,
}

/// Determine output destinations from config or environment
fn determine_output(config: Option<&LoggingConfig>) -> Result<OutputDestinations, ApiError> {
    if let Ok(output) = std::env::var("BOUNTY_LOG_OUTPUT") {
        return parse_output_destinations(&output);
    }
    let output = config.map(|c| c.output.as_str()).unwrap_or("stderr");
    parse_output_destinations(output)
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, ApiError> {
    match output {
        "stdout" => Ok(OutputDestinations {
            stderr: false,
            file: false,
        }),
        "stderr" => Ok(OutputDestinations {
            stderr: true,
            file: false,
        }),
        "file" => Ok(OutputDestinations {
            stderr: false,
            file: true,
        }),
        "file+stderr" => Ok(OutputDestinations {
            stderr: true,
            file: true,
        }),
        _ => Err(ApiError::Config(format!(
            "invalid log output: {} (must be 'stdout', 'stderr', 'file', or 'file+stderr')",
            output
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "stderr");
        assert_eq!(config.file, None);
        assert!(config.color);
    }

    #[test]
    fn test_parse_output_destinations() {
        let out = parse_output_destinations("stdout").unwrap();
        assert!(!out.stderr);
        assert!(!out.file);

        let out = parse_output_destinations("file+stderr").unwrap();
        assert!(out.stderr);
        assert!(out.file);

        assert!(parse_output_destinations("both-ways").is_err());
    }

    #[test]
    fn test_resolve_log_file_path_config_value() {
        let path = resolve_log_file_path(Some(PathBuf::from("/tmp/board.log"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/board.log"));
    }

    #[test]
    fn test_resolve_log_file_path_default_fallback() {
        let path = resolve_log_file_path(None).unwrap();
        assert!(path.ends_with("bountyboard.log"));
    }

    #[test]
    fn test_invalid_format_rejected() {
        let config = LoggingConfig {
            format: "yaml".into(),
            ..Default::default()
        };
        assert!(determine_format(Some(&config)).is_err());
    }
}
