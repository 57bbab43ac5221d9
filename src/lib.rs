//! OneLauncher add-on engine
//!
//! Installs, updates and removes LOTRO and DDO add-ons (plugins, skins and
//! music) and keeps a searchable catalog of installed and remote add-ons.
//!
//! # Architecture
//!
//! - **Addons Module**: Archive handling, manifests, catalog and installer
//! - **Config Module**: `addons.toml` loading and per-game defaults
//! - **Logging Module**: File logging with retention cleanup
//! - **Paths Module**: Case-insensitive path resolution
//!
//! # Usage
//!
//! ```no_run
//! use onelauncher::addons::{AddonManager, CatalogStore, HttpFetcher, StartupScripts};
//! use onelauncher::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let catalog = CatalogStore::open(&config.catalog_path())?;
//! let scripts = StartupScripts::load(&config.startup_scripts_path())?;
//! let mut manager = AddonManager::new(&config, catalog, scripts, Box::new(HttpFetcher::new()));
//! manager.refresh_all()?;
//! # Ok(())
//! # }
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod addons;
pub mod config;
pub mod logging;
pub mod paths;

// Re-export main types
pub use addons::{AddonError, AddonKind, AddonManager, CatalogStore, InstallOutcome};
pub use config::{Config, GameType};
