//! Add-on engine for LOTRO and DDO.
//!
//! Installs, updates and removes plugins, skins and music, and keeps a
//! local catalog of what is installed next to what the remote feeds offer.
//!
//! # Architecture
//!
//! - **types**: Core data structures (`AddonKind`, `AddonRecord`, `AddonError`)
//! - **xml**: Restricted XML reader for manifests and feeds
//! - **manifest**: Compendium manifest reading and writing
//! - **archive**: Extraction and layout normalisation of add-on archives
//! - **scan**: Discovery of installed add-ons on disk
//! - **feed**: Remote feed download and parsing
//! - **catalog**: SQLite catalog with version reconciliation
//! - **scripts**: Registry of enabled startup scripts
//! - **installer**: `AddonManager`, which ties the above together
//!
//! # Usage
//!
//! ```ignore
//! use onelauncher::addons::{AddonManager, CatalogStore, HttpFetcher, StartupScripts};
//! use onelauncher::config::Config;
//!
//! let config = Config::load()?;
//! let catalog = CatalogStore::open(&config.catalog_path())?;
//! let scripts = StartupScripts::load(&config.startup_scripts_path())?;
//! let mut manager = AddonManager::new(&config, catalog, scripts, Box::new(HttpFetcher::new()));
//! manager.refresh_all()?;
//! ```

mod archive;
mod catalog;
mod feed;
mod installer;
mod manifest;
mod scan;
mod scripts;
mod types;
mod xml;

pub use archive::{detect_kind, extract, normalize_invalid_wrappers};
pub use catalog::{CatalogStore, DependencyTarget};
pub use feed::{FeedFetcher, HttpFetcher, parse_feed};
pub use installer::{AddonManager, InstallObserver};
pub use manifest::{get_existing_manifest, parse_manifest, write_manifest};
pub use scan::scan;
pub use scripts::{ScriptEntry, StartupScripts};
pub use types::{
    AddonError, AddonKind, AddonRecord, BUILTIN_UTILITY_ALIAS, BUILTIN_UTILITY_ID,
    INSTALLED_MARKER, InstallOutcome, InstalledAddon, Locality, OUTDATED_MARKER, RejectReason,
    TableKey, UNMANAGED_CATEGORY, UPDATED_MARKER, resolve_dependency_alias, strip_markers,
};
