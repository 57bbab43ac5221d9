//! Add-on type definitions.
//!
//! Core data structures shared by the manifest codec, the catalog store and
//! the install orchestrator.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Identity of the builtin utility library every plugin may depend on.
pub const BUILTIN_UTILITY_ID: &str = "1064";

/// Dependency identity that aliases [`BUILTIN_UTILITY_ID`].
pub const BUILTIN_UTILITY_ALIAS: &str = "0";

/// Marker prefixed to remote names whose identity is installed.
pub const INSTALLED_MARKER: &str = "(Installed) ";

/// Marker prefixed to installed versions that have a newer remote release.
pub const OUTDATED_MARKER: &str = "(Outdated) ";

/// Marker prefixed to remote versions newer than the installed one.
pub const UPDATED_MARKER: &str = "(Updated) ";

/// Category given to add-ons the remote catalog does not know about.
pub const UNMANAGED_CATEGORY: &str = "Unmanaged";

/// Kind of add-on content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddonKind {
    /// Lua plugin described by `.plugin` files.
    Plugin,
    /// UI skin.
    Skin,
    /// ABC music collection.
    Music,
}

impl AddonKind {
    /// All kinds in display order.
    pub const ALL: [Self; 3] = [Self::Plugin, Self::Skin, Self::Music];

    /// Parses a kind from user input.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plugin" | "plugins" => Some(Self::Plugin),
            "skin" | "skins" | "theme" | "themes" => Some(Self::Skin),
            "music" | "song" | "songs" => Some(Self::Music),
            _ => None,
        }
    }

    /// Lowercase name used in file extensions and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Skin => "skin",
            Self::Music => "music",
        }
    }

    /// Root element of this kind's manifest document.
    #[must_use]
    pub fn root_tag(&self) -> &'static str {
        match self {
            Self::Plugin => "PluginConfig",
            Self::Skin => "SkinConfig",
            Self::Music => "MusicConfig",
        }
    }

    /// File extension of this kind's manifest (without the dot).
    #[must_use]
    pub fn manifest_extension(&self) -> &'static str {
        match self {
            Self::Plugin => "plugincompendium",
            Self::Skin => "skincompendium",
            Self::Music => "musiccompendium",
        }
    }

    /// Data folder relative to the game documents directory.
    #[must_use]
    pub fn data_folder(&self) -> &'static str {
        match self {
            Self::Plugin => "Plugins",
            Self::Skin => "ui/skins",
            Self::Music => "Music",
        }
    }
}

impl fmt::Display for AddonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the reconciliation a catalog table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    /// Add-ons found on disk.
    Installed,
    /// Add-ons listed by the remote feed.
    Remote,
}

impl Locality {
    /// Parses a locality from user input.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "installed" | "local" => Some(Self::Installed),
            "remote" | "available" | "online" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Typed handle for one catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableKey {
    /// Add-on kind stored in the table.
    pub kind: AddonKind,
    /// Installed or remote side.
    pub locality: Locality,
}

impl TableKey {
    /// Every table the catalog owns.
    pub const ALL: [Self; 6] = [
        Self::installed(AddonKind::Plugin),
        Self::installed(AddonKind::Skin),
        Self::installed(AddonKind::Music),
        Self::remote(AddonKind::Plugin),
        Self::remote(AddonKind::Skin),
        Self::remote(AddonKind::Music),
    ];

    /// Installed table for `kind`.
    #[must_use]
    pub const fn installed(kind: AddonKind) -> Self {
        Self {
            kind,
            locality: Locality::Installed,
        }
    }

    /// Remote table for `kind`.
    #[must_use]
    pub const fn remote(kind: AddonKind) -> Self {
        Self {
            kind,
            locality: Locality::Remote,
        }
    }

    /// Fixed SQL table name.
    #[must_use]
    pub fn table_name(&self) -> &'static str {
        match (self.kind, self.locality) {
            (AddonKind::Plugin, Locality::Installed) => "plugins_installed",
            (AddonKind::Skin, Locality::Installed) => "skins_installed",
            (AddonKind::Music, Locality::Installed) => "music_installed",
            (AddonKind::Plugin, Locality::Remote) => "plugins_remote",
            (AddonKind::Skin, Locality::Remote) => "skins_remote",
            (AddonKind::Music, Locality::Remote) => "music_remote",
        }
    }

    /// The table on the other side of the reconciliation.
    #[must_use]
    pub fn paired(&self) -> Self {
        match self.locality {
            Locality::Installed => Self::remote(self.kind),
            Locality::Remote => Self::installed(self.kind),
        }
    }
}

/// One add-on entry in the catalog.
///
/// `file` holds a filesystem path for installed rows and a download URL for
/// remote rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddonRecord {
    /// Remote catalog identity, empty for unmanaged add-ons.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Remote category, or [`UNMANAGED_CATEGORY`].
    pub category: String,
    /// Version string, possibly carrying a reconciliation marker.
    pub version: String,
    /// Author name.
    pub author: String,
    /// Release date of the latest remote version (`%Y-%m-%d`).
    pub latest_release: String,
    /// Local path or remote URL.
    pub file: String,
    /// Download URL recorded in a manifest. Not stored in the catalog,
    /// where remote rows carry their URL in `file`.
    pub download_url: String,
    /// Identities this add-on depends on.
    pub dependencies: Vec<String>,
    /// Startup script path relative to the add-on's data folder.
    pub startup_script: String,
}

impl AddonRecord {
    /// Creates an unmanaged record for content found on disk.
    #[must_use]
    pub fn unmanaged(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: UNMANAGED_CATEGORY.to_string(),
            file: file.into(),
            ..Self::default()
        }
    }

    /// Returns true if the add-on has a remote identity.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        !self.id.is_empty()
    }

    /// Name without the installed marker.
    #[must_use]
    pub fn display_name(&self) -> &str {
        strip_markers(&self.name)
    }

    /// Version without reconciliation markers.
    #[must_use]
    pub fn plain_version(&self) -> &str {
        strip_markers(&self.version)
    }
}

/// Removes any reconciliation markers from the front of `value`.
#[must_use]
pub fn strip_markers(value: &str) -> &str {
    let mut out = value;
    for marker in [INSTALLED_MARKER, OUTDATED_MARKER, UPDATED_MARKER] {
        if let Some(rest) = out.strip_prefix(marker) {
            out = rest;
        }
    }
    out
}

/// Maps the builtin utility alias to its real identity.
#[must_use]
pub fn resolve_dependency_alias(id: &str) -> &str {
    if id == BUILTIN_UTILITY_ALIAS {
        BUILTIN_UTILITY_ID
    } else {
        id
    }
}

/// Why an install was refused without touching the add-on folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Archive format that cannot be extracted without external tools.
    UnsupportedFormat,
    /// Plugin archive without a single identifiable author folder.
    AmbiguousAuthorFolder,
    /// Add-on kind the active game does not support.
    UnsupportedForGame,
    /// The user declined a required confirmation.
    Cancelled,
}

impl RejectReason {
    /// Stable machine-readable reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported-format",
            Self::AmbiguousAuthorFolder => "ambiguous-author-folder",
            Self::UnsupportedForGame => "unsupported-for-game",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An add-on that was moved into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledAddon {
    /// Detected kind.
    pub kind: AddonKind,
    /// Display name.
    pub name: String,
    /// Remote identity, if installed from the catalog.
    pub id: Option<String>,
    /// Author folder (plugins) or root folder/file (skins, music).
    pub path: PathBuf,
}

/// Terminal state of an install that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Content is in place and registered.
    Installed(InstalledAddon),
    /// Install refused; nothing was changed.
    Rejected(RejectReason),
}

impl InstallOutcome {
    /// Returns true if the add-on was installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }
}

/// Add-on engine errors.
#[derive(Debug, Error)]
pub enum AddonError {
    /// Archive format the engine cannot extract.
    #[error("Unsupported archive format: {}", .path.display())]
    UnsupportedArchiveFormat { path: PathBuf },

    /// Archive contains only directories.
    #[error("Add-on archive is empty: {}", .path.display())]
    EmptyArchive { path: PathBuf },

    /// Manifest or feed document could not be parsed.
    #[error("Malformed manifest '{source_name}': {reason}")]
    MalformedManifest { source_name: String, reason: String },

    /// More than one manifest in a single add-on root.
    #[error("Add-on has multiple compendium files in {}", .dir.display())]
    MultipleManifestsFound { dir: PathBuf },

    /// Plugin archive without a unique author folder.
    #[error("Plugin '{source_name}' doesn't have an author folder with a .plugin file")]
    AmbiguousAuthorFolder { source_name: String },

    /// Download or feed fetch failed.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Target path exists and cannot be merged.
    #[error("Cannot merge into {}: {reason}", .path.display())]
    FilesystemConflict { path: PathBuf, reason: String },

    /// Add-on kind not available for the current game.
    #[error("{game} does not support {kind} add-ons")]
    UnsupportedForGame { kind: AddonKind, game: String },

    /// Add-on not present in the catalog.
    #[error("Add-on '{0}' not found")]
    NotFound(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Catalog database error.
    #[error("Catalog error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Zip container error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Startup script list could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(AddonKind::parse("Plugins"), Some(AddonKind::Plugin));
        assert_eq!(AddonKind::parse("skin"), Some(AddonKind::Skin));
        assert_eq!(AddonKind::parse("music"), Some(AddonKind::Music));
        assert_eq!(AddonKind::parse("maps"), None);
    }

    #[test]
    fn test_kind_manifest_names() {
        assert_eq!(AddonKind::Plugin.root_tag(), "PluginConfig");
        assert_eq!(AddonKind::Skin.manifest_extension(), "skincompendium");
        assert_eq!(AddonKind::Music.data_folder(), "Music");
    }

    #[test]
    fn test_table_pairing() {
        let installed = TableKey::installed(AddonKind::Skin);
        assert_eq!(installed.paired(), TableKey::remote(AddonKind::Skin));
        assert_eq!(installed.paired().paired(), installed);
        assert_eq!(installed.table_name(), "skins_installed");
    }

    #[test]
    fn test_table_names_unique() {
        let mut names: Vec<_> = TableKey::ALL.iter().map(TableKey::table_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TableKey::ALL.len());
    }

    #[test]
    fn test_dependency_alias() {
        assert_eq!(resolve_dependency_alias("0"), BUILTIN_UTILITY_ID);
        assert_eq!(resolve_dependency_alias("42"), "42");
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(strip_markers("(Installed) Vital Target"), "Vital Target");
        assert_eq!(strip_markers("(Outdated) 1.0"), "1.0");
        assert_eq!(strip_markers("(Updated) 1.1"), "1.1");
        assert_eq!(strip_markers("1.2"), "1.2");
    }

    #[test]
    fn test_unmanaged_record() {
        let record = AddonRecord::unmanaged("Old Skin", "/tmp/skins/Old Skin");
        assert!(!record.is_managed());
        assert_eq!(record.category, UNMANAGED_CATEGORY);
    }

    #[test]
    fn test_reject_reason_strings() {
        assert_eq!(RejectReason::UnsupportedFormat.as_str(), "unsupported-format");
        assert_eq!(
            RejectReason::AmbiguousAuthorFolder.to_string(),
            "ambiguous-author-folder"
        );
    }
}
