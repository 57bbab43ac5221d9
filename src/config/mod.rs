//! Configuration module for the add-on tools.
//!
//! Handles loading and saving the `addons.toml` configuration file.

mod game;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use game::{FeedUrls, GameType};

use crate::addons::AddonKind;
use crate::logging::LogConfig;

/// Default `addons.toml` content with every setting documented.
const DEFAULT_CONFIG: &str = r#"# OneLauncher Add-on Manager Configuration
# ========================================
# This file is read every time the add-on manager starts.
# Lines starting with '#' are comments.

# Game
# ----
# Which game's add-ons to manage: lotro or ddo
# DDO only supports skins.
game = "lotro"

# Folders
# -------
# Game documents folder holding Plugins/, ui/skins/ and Music/.
# Defaults to "<Documents>/The Lord of the Rings Online"
# (or "<Documents>/Dungeons and Dragons Online" for DDO).
# documents_dir = "/home/me/Documents/The Lord of the Rings Online"
#
# Where the add-on catalog cache is kept. It can be deleted at any time.
# cache_dir = "/home/me/.cache/onelauncher"

# Remote Feeds
# ------------
# Override the LotroInterface favourites feeds per add-on kind.
[feeds]
# plugins = "https://api.lotrointerface.com/fav/OneLauncher-Plugins.xml"
# skins   = "https://api.lotrointerface.com/fav/OneLauncher-Themes.xml"
# music   = "https://api.lotrointerface.com/fav/OneLauncher-Music.xml"

# Logging Configuration
# ---------------------
# Logs are stored in <data dir>/onelauncher/logs/ with automatic cleanup.
[logging]
enabled = true          # Enable/disable file logging
level = "info"          # trace, debug, info, warn, error, off
retention_hours = 24    # Hours to keep log files
"#;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Config file is not valid TOML for [`Config`].
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be written back.
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Add-on manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Game whose add-ons are managed.
    pub game: GameType,
    /// Game documents folder override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_dir: Option<PathBuf>,
    /// Catalog cache folder override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Remote feed overrides.
    pub feeds: FeedUrls,
    /// Logging configuration.
    pub logging: LogConfig,
    /// Path to config file.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game: GameType::default(),
            documents_dir: None,
            cache_dir: None,
            feeds: FeedUrls::default(),
            logging: LogConfig::default(),
            config_path: Self::default_config_path(),
        }
    }
}

impl Config {
    /// Returns the default config file path (`<config dir>/onelauncher/addons.toml`).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("onelauncher")
            .join("addons.toml")
    }

    /// Loads configuration from the default path, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Returns error if config cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    /// Returns error if config cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        // Create default config if it doesn't exist
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        let content = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = path.to_path_buf();
        config.logging.level = LogConfig::parse_level(&config.logging.level);
        Ok(config)
    }

    /// Creates the default config file.
    fn create_default_config(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)
    }

    /// Reloads the configuration from disk.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        let path = self.config_path.clone();
        *self = Self::load_from(&path)?;
        Ok(())
    }

    /// Writes the configuration back to its file. Comments are not kept.
    ///
    /// # Errors
    /// Returns error if file cannot be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Game documents folder.
    #[must_use]
    pub fn documents_dir(&self) -> PathBuf {
        self.documents_dir.clone().unwrap_or_else(|| {
            dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(self.game.documents_folder_name())
        })
    }

    /// Data folder for add-ons of `kind`.
    #[must_use]
    pub fn data_dir(&self, kind: AddonKind) -> PathBuf {
        self.documents_dir().join(kind.data_folder())
    }

    /// Catalog cache database for the configured game.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| {
                dirs::cache_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("onelauncher")
            })
            .join(format!("addons_cache_{}.sqlite", self.game.as_str()))
    }

    /// Enabled startup scripts for the configured game, kept next to the
    /// config file.
    #[must_use]
    pub fn startup_scripts_path(&self) -> PathBuf {
        self.config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
            .join(format!("startup_scripts_{}.json", self.game.as_str()))
    }

    /// Feed URL for `kind`, or `None` if the game has no such add-ons.
    #[must_use]
    pub fn feed_url(&self, kind: AddonKind) -> Option<String> {
        self.feeds.url(self.game, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_created_and_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("addons.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.game, GameType::Lotro);
        assert_eq!(config.logging, LogConfig::default());
        assert_eq!(config.config_path, path);
        assert!(config.feed_url(AddonKind::Music).is_some());
    }

    #[test]
    fn test_load_custom_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addons.toml");
        fs::write(
            &path,
            "game = \"ddo\"\ndocuments_dir = \"/games/ddo\"\n\
             [logging]\nlevel = \"WARNING\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.game, GameType::Ddo);
        assert_eq!(config.documents_dir(), PathBuf::from("/games/ddo"));
        assert_eq!(
            config.data_dir(AddonKind::Skin),
            PathBuf::from("/games/ddo").join("ui/skins")
        );
        assert_eq!(config.logging.level, "warn");
        assert!(config.feed_url(AddonKind::Plugin).is_none());
        assert!(
            config
                .catalog_path()
                .ends_with("addons_cache_ddo.sqlite")
        );
        assert_eq!(
            config.startup_scripts_path(),
            tmp.path().join("startup_scripts_ddo.json")
        );
    }

    #[test]
    fn test_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addons.toml");
        fs::write(&path, "game = \"eso\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addons.toml");
        let mut config = Config::load_from(&path).unwrap();
        config.game = GameType::Ddo;
        config.cache_dir = Some(tmp.path().join("cache"));
        config.save().unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
