//! Archive unpacking and add-on layout normalisation.
//!
//! Authors often package their work relative to some folder higher up the
//! game's document tree (`ui/skins/...`, `Plugins/...`). Everything here
//! operates on a scratch directory and reshapes it so that its top level is
//! what belongs in the add-on's data folder.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::types::{AddonError, AddonKind};

/// Top-level folder names that are hoisted away. Case-sensitive.
pub const INVALID_WRAPPER_FOLDERS: [&str; 9] = [
    "ui",
    "skins",
    "Plugins",
    "Music",
    "My Documents",
    "Documents",
    "The Lord of the Rings Online",
    "Dungeons and Dragons Online",
    "Dungeons & Dragons Online",
];

/// Library folders bundled with plugins. Compared case-insensitively.
pub const DEPENDENCY_FOLDERS: [&str; 2] = ["turbine", "turbineplugins"];

/// Extracts a zip archive into `dest`.
///
/// Any other container is a permanent [`AddonError::UnsupportedArchiveFormat`].
/// Entries escaping `dest` are skipped.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<(), AddonError> {
    if !has_extension(archive_path, "zip") {
        return Err(AddonError::UnsupportedArchiveFormat {
            path: archive_path.to_path_buf(),
        });
    }

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    // Addons without any files aren't valid
    let mut has_files = false;
    for i in 0..archive.len() {
        if !archive.by_index(i)?.is_dir() {
            has_files = true;
            break;
        }
    }
    if !has_files {
        return Err(AddonError::EmptyArchive {
            path: archive_path.to_path_buf(),
        });
    }

    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(relative_path) = entry.enclosed_name() else {
            warn!(
                "[ADDON-ARCHIVE] Skipping unsafe entry '{}' in {}",
                entry.name(),
                archive_path.display()
            );
            continue;
        };
        let outpath = dest.join(relative_path);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }

    debug!(
        "[ADDON-ARCHIVE] Extracted {} entries from {}",
        archive.len(),
        archive_path.display()
    );
    Ok(())
}

/// Hoists the contents of denylisted wrapper folders up to `dir`.
///
/// Runs until no wrapper remains at the top level. Wrappers are processed in
/// name order; on a name clash the entry already in `dir` is kept and the
/// hoisted one is dropped.
pub fn normalize_invalid_wrappers(dir: &Path) -> Result<(), AddonError> {
    loop {
        let wrappers: Vec<PathBuf> = sorted_entries(dir)?
            .into_iter()
            .filter(|path| path.is_dir() && is_invalid_wrapper(path))
            .collect();
        if wrappers.is_empty() {
            return Ok(());
        }

        for wrapper in wrappers {
            debug!("[ADDON-ARCHIVE] Hoisting wrapper folder {}", wrapper.display());

            // The wrapper may contain a folder with its own name
            let staging = tempfile::Builder::new()
                .prefix(".hoist-")
                .tempdir_in(dir)?;
            let contents = staging.path().join("contents");
            fs::rename(&wrapper, &contents)?;

            for entry in sorted_entries(&contents)? {
                let Some(name) = entry.file_name() else {
                    continue;
                };
                merge_keep_existing(&entry, &dir.join(name))?;
            }
        }
    }
}

fn is_invalid_wrapper(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| INVALID_WRAPPER_FOLDERS.contains(&name))
}

/// Moves `src` to `dst`, descending into directories that exist on both
/// sides. Existing files win.
fn merge_keep_existing(src: &Path, dst: &Path) -> Result<(), AddonError> {
    if !dst.exists() {
        fs::rename(src, dst)?;
        return Ok(());
    }
    if src.is_dir() && dst.is_dir() {
        for entry in sorted_entries(src)? {
            if let Some(name) = entry.file_name() {
                merge_keep_existing(&entry, &dst.join(name))?;
            }
        }
    } else {
        debug!(
            "[ADDON-ARCHIVE] Keeping existing {}, dropping hoisted copy",
            dst.display()
        );
    }
    Ok(())
}

/// Returns the single top-level folder of `dir`, creating one named
/// `fallback_name` around the current contents when there isn't exactly one.
pub fn ensure_root_folder(dir: &Path, fallback_name: &str) -> Result<PathBuf, AddonError> {
    let entries = sorted_entries(dir)?;
    if let [only] = entries.as_slice() {
        if only.is_dir() {
            return Ok(only.clone());
        }
    }

    // Staged so that `fallback_name` may equal one of the current entries
    let staging = dir.join(format!(".{fallback_name}.root"));
    fs::create_dir(&staging)?;
    for entry in entries {
        if let Some(name) = entry.file_name() {
            fs::rename(&entry, staging.join(name))?;
        }
    }

    let root = dir.join(fallback_name);
    fs::rename(&staging, &root)?;
    debug!("[ADDON-ARCHIVE] Created root folder {}", root.display());
    Ok(root)
}

/// Classifies extracted content.
///
/// Any `.plugin` file makes it a plugin, even when `.abc` files are present.
pub fn detect_kind(dir: &Path) -> Result<AddonKind, AddonError> {
    if contains_extension(dir, "plugin")? {
        Ok(AddonKind::Plugin)
    } else if contains_extension(dir, "abc")? {
        Ok(AddonKind::Music)
    } else {
        Ok(AddonKind::Skin)
    }
}

/// Picks the folder of `dir` that holds the plugin's own files.
///
/// Bundled library folders are ignored unless nothing else is present.
/// With several candidates, the one holding a compendium wins, then the one
/// holding a `.plugin` file.
pub fn select_author_folder(dir: &Path, source_name: &str) -> Result<PathBuf, AddonError> {
    let folders: Vec<PathBuf> = sorted_entries(dir)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect();

    let filtered: Vec<PathBuf> = folders
        .iter()
        .filter(|path| !is_dependency_folder(path))
        .cloned()
        .collect();
    let candidates = if filtered.is_empty() { folders } else { filtered };

    let ambiguous = || AddonError::AmbiguousAuthorFolder {
        source_name: source_name.to_string(),
    };

    match candidates.as_slice() {
        [] => Err(ambiguous()),
        [only] => Ok(only.clone()),
        _ => {
            for extension in ["plugincompendium", "plugin"] {
                for candidate in &candidates {
                    if !files_with_extension(candidate, extension)?.is_empty() {
                        return Ok(candidate.clone());
                    }
                }
            }
            Err(ambiguous())
        }
    }
}

fn is_dependency_folder(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| DEPENDENCY_FOLDERS.contains(&name.to_lowercase().as_str()))
}

/// Copies `src` into `dst` recursively, overwriting files that exist in both.
pub fn merge_into(src: &Path, dst: &Path) -> Result<(), AddonError> {
    if src.is_dir() {
        if dst.exists() && !dst.is_dir() {
            return Err(AddonError::FilesystemConflict {
                path: dst.to_path_buf(),
                reason: "a file exists where a folder is being installed".to_string(),
            });
        }
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            merge_into(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        if dst.is_dir() {
            return Err(AddonError::FilesystemConflict {
                path: dst.to_path_buf(),
                reason: "a folder exists where a file is being installed".to_string(),
            });
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
    }
    Ok(())
}

/// Files directly inside `dir` with the given extension, sorted.
pub fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, AddonError> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|path| path.is_file() && has_extension(path, extension))
        .collect())
}

/// Returns true if any file below `dir` has the given extension.
pub fn contains_extension(dir: &Path, extension: &str) -> Result<bool, AddonError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if contains_extension(&path, extension)? {
                return Ok(true);
            }
        } else if has_extension(&path, extension) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, AddonError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}
