//! Startup script registry.
//!
//! Add-ons may declare a Python startup script. Declaring one does nothing
//! by itself: a script only lands in this list after the user has read its
//! source and agreed. Nothing in this crate runs the scripts; the list is
//! read by whatever launches the game.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use super::types::AddonError;
use crate::paths::from_windows_relative;

/// One enabled startup script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    /// Path relative to the game documents directory, `/`-separated.
    pub path: String,
    /// Unix timestamp when the user enabled it.
    pub enabled_at: u64,
}

impl ScriptEntry {
    fn new(path: String) -> Self {
        let enabled_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self { path, enabled_at }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ScriptStore {
    #[serde(default)]
    scripts: Vec<ScriptEntry>,
}

/// The active game's enabled startup scripts, persisted as JSON.
#[derive(Debug)]
pub struct StartupScripts {
    store: ScriptStore,
    path: PathBuf,
}

impl StartupScripts {
    /// Loads the registry from `path`; a missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, AddonError> {
        let store = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            ScriptStore::default()
        };

        Ok(Self {
            store,
            path: path.to_path_buf(),
        })
    }

    /// Saves the registry to disk.
    pub fn save(&self) -> Result<(), AddonError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.store)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Enables a script. Returns false if it was already enabled, or if the
    /// path is rooted or climbs out of the documents directory.
    pub fn enable(&mut self, relative_path: &str) -> Result<bool, AddonError> {
        if from_windows_relative(relative_path).is_none() {
            warn!("[ADDON-SCRIPTS] Refusing to enable startup script {relative_path}");
            return Ok(false);
        }
        let normalized = normalize(relative_path);
        if self.contains(&normalized) {
            return Ok(false);
        }
        info!("[ADDON-SCRIPTS] Enabled startup script {normalized}");
        self.store.scripts.push(ScriptEntry::new(normalized));
        self.save()?;
        Ok(true)
    }

    /// Disables a script. Returns false if it was not enabled.
    pub fn disable(&mut self, relative_path: &str) -> Result<bool, AddonError> {
        let normalized = normalize(relative_path);
        let before = self.store.scripts.len();
        self.store.scripts.retain(|entry| entry.path != normalized);
        if self.store.scripts.len() == before {
            return Ok(false);
        }
        info!("[ADDON-SCRIPTS] Disabled startup script {normalized}");
        self.save()?;
        Ok(true)
    }

    /// Checks if a script is enabled.
    #[must_use]
    pub fn contains(&self, relative_path: &str) -> bool {
        let normalized = normalize(relative_path);
        self.store.scripts.iter().any(|entry| entry.path == normalized)
    }

    /// Enabled scripts in the order they were enabled.
    pub fn iter(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.store.scripts.iter()
    }

    /// Number of enabled scripts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.scripts.len()
    }

    /// Checks if no scripts are enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.scripts.is_empty()
    }
}

fn normalize(path: &str) -> String {
    path.split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_enable_disable_persist() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("startup_scripts.json");

        let mut scripts = StartupScripts::load(&path).unwrap();
        assert!(scripts.is_empty());
        assert!(scripts.enable("Plugins\\Garan\\startup.py").unwrap());
        assert!(!scripts.enable("Plugins/Garan/startup.py").unwrap());
        assert!(scripts.contains("Plugins/Garan/startup.py"));

        let reloaded = StartupScripts::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.iter().next().map(|e| e.path.as_str()),
            Some("Plugins/Garan/startup.py")
        );

        let mut scripts = reloaded;
        assert!(scripts.disable("Plugins\\Garan\\startup.py").unwrap());
        assert!(!scripts.disable("Plugins\\Garan\\startup.py").unwrap());
        assert!(StartupScripts::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_enable_refuses_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("startup_scripts.json");

        let mut scripts = StartupScripts::load(&path).unwrap();
        assert!(!scripts.enable("Plugins/Evil/../../../tmp/payload.py").unwrap());
        assert!(!scripts.enable("/tmp/payload.py").unwrap());
        assert!(!scripts.enable("C:\\payload.py").unwrap());
        assert!(scripts.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("startup_scripts.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            StartupScripts::load(&path),
            Err(AddonError::Serialization(_))
        ));
    }
}
