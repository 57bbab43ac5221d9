//! File logging for the add-on tools.
//!
//! Provides timestamped log files with automatic cleanup.
//! Logs are stored in `<data dir>/onelauncher/logs/` by default.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Deserializer, Serialize};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default log retention in hours.
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log retention period in hours.
    #[serde(deserialize_with = "deserialize_retention")]
    pub retention_hours: u32,
    /// Log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Whether logging is enabled.
    pub enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            level: DEFAULT_LOG_LEVEL.to_string(),
            enabled: true,
        }
    }
}

impl LogConfig {
    /// Parses log level from string.
    #[must_use]
    pub fn parse_level(value: &str) -> String {
        match value.to_lowercase().as_str() {
            "trace" => "trace".to_string(),
            "debug" => "debug".to_string(),
            "info" => "info".to_string(),
            "warn" | "warning" => "warn".to_string(),
            "error" => "error".to_string(),
            "off" | "none" | "disabled" => "off".to_string(),
            _ => DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Parses retention hours from string.
    #[must_use]
    pub fn parse_retention(value: &str) -> u32 {
        value.trim().parse().unwrap_or(DEFAULT_LOG_RETENTION_HOURS)
    }
}

/// Accepts `retention_hours = 48` as well as `retention_hours = "48"`.
fn deserialize_retention<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Retention {
        Hours(i64),
        Text(String),
    }

    Ok(match Retention::deserialize(deserializer)? {
        Retention::Hours(hours) => u32::try_from(hours).unwrap_or(DEFAULT_LOG_RETENTION_HOURS),
        Retention::Text(text) => LogConfig::parse_retention(&text),
    })
}

/// Returns the log directory path.
#[must_use]
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("onelauncher")
        .join("logs")
}

/// Returns a fresh log file path inside `log_dir`.
#[must_use]
pub fn current_log_path(log_dir: &Path) -> PathBuf {
    let now = chrono::Local::now();
    let filename = format!("onelauncher-addons_{}.log", now.format("%Y-%m-%d_%H-%M-%S"));
    log_dir.join(filename)
}

/// Deletes `.log` files in `log_dir` older than the retention period.
///
/// # Errors
/// Returns error if directory cannot be read.
pub fn cleanup_old_logs(log_dir: &Path, retention_hours: u32) -> io::Result<u32> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let retention_duration = Duration::from_secs(u64::from(retention_hours) * 3600);
    let now = SystemTime::now();
    let mut deleted_count = 0;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        // Only process .log files
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                if let Ok(age) = now.duration_since(modified) {
                    if age > retention_duration && fs::remove_file(&path).is_ok() {
                        deleted_count += 1;
                    }
                }
            }
        }
    }

    Ok(deleted_count)
}

/// Initializes the logging system.
///
/// Sets up file-based logging with the specified configuration.
/// Also cleans up old log files based on retention settings.
/// `RUST_LOG` overrides the configured level.
///
/// # Errors
/// Returns error if logging cannot be initialized.
pub fn init(config: &LogConfig) -> io::Result<()> {
    if !config.enabled || config.level == "off" {
        return Ok(());
    }

    let log_dir = log_directory();
    fs::create_dir_all(&log_dir)?;

    let deleted = cleanup_old_logs(&log_dir, config.retention_hours)?;

    let log_path = current_log_path(&log_dir);
    let log_file = File::create(&log_path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(log_file.with_max_level(tracing::Level::TRACE))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::info!("OneLauncher add-on logging initialized");
    tracing::info!("Log file: {}", log_path.display());
    tracing::info!("Log level: {}", config.level);
    tracing::info!("Log retention: {} hours", config.retention_hours);
    if deleted > 0 {
        tracing::info!("Cleaned up {} old log file(s)", deleted);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.retention_hours, DEFAULT_LOG_RETENTION_HOURS);
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert!(config.enabled);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(LogConfig::parse_level("debug"), "debug");
        assert_eq!(LogConfig::parse_level("DEBUG"), "debug");
        assert_eq!(LogConfig::parse_level("warning"), "warn");
        assert_eq!(LogConfig::parse_level("off"), "off");
        assert_eq!(LogConfig::parse_level("invalid"), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_retention_accepts_strings() {
        let config: LogConfig = toml::from_str("retention_hours = \"48\"").unwrap();
        assert_eq!(config.retention_hours, 48);

        let config: LogConfig = toml::from_str("retention_hours = 12").unwrap();
        assert_eq!(config.retention_hours, 12);

        let config: LogConfig = toml::from_str("retention_hours = \"soon\"").unwrap();
        assert_eq!(config.retention_hours, DEFAULT_LOG_RETENTION_HOURS);
    }

    #[test]
    fn test_cleanup_keeps_recent_logs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("recent.log"), "x").unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        assert_eq!(cleanup_old_logs(tmp.path(), 1).unwrap(), 0);
        assert!(tmp.path().join("recent.log").exists());
        assert_eq!(cleanup_old_logs(&tmp.path().join("missing"), 1).unwrap(), 0);
    }

    #[test]
    fn test_log_directory() {
        let dir = log_directory();
        assert!(dir.to_string_lossy().contains("onelauncher"));
        assert!(dir.ends_with("logs"));
    }
}
