//! Filesystem scans of the installed add-on folders.
//!
//! A corrupt manifest only costs its own entry: it is logged and skipped,
//! and the rest of the folder is still scanned.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::archive::has_extension;
use super::manifest::{PLUGIN_INFO_TAG, parse_descriptors, parse_manifest};
use super::types::{AddonError, AddonKind, AddonRecord, UNMANAGED_CATEGORY};
use crate::paths::resolve_case_insensitive;

/// Scans the data folder of `kind`.
pub fn scan(kind: AddonKind, data_dir: &Path) -> Result<Vec<AddonRecord>, AddonError> {
    fs::create_dir_all(data_dir)?;
    match kind {
        AddonKind::Plugin => scan_plugins(data_dir),
        AddonKind::Skin | AddonKind::Music => scan_folders(kind, data_dir),
    }
}

/// Scans the plugins folder.
///
/// Compendiums count only when they sit directly in an author folder.
/// `.plugin` files listed in a compendium's descriptors belong to it; every
/// other `.plugin` file is an unmanaged plugin of its own.
pub fn scan_plugins(plugins_dir: &Path) -> Result<Vec<AddonRecord>, AddonError> {
    let mut compendiums = Vec::new();
    let mut plugin_files = Vec::new();

    for author_folder in sorted_dirs(plugins_dir)? {
        let mut files = Vec::new();
        walk_files(&author_folder, &mut files)?;
        for file in files {
            if has_extension(&file, AddonKind::Plugin.manifest_extension()) {
                if file.parent() == Some(author_folder.as_path()) {
                    compendiums.push(file);
                }
            } else if has_extension(&file, "plugin") {
                plugin_files.push(file);
            }
        }
    }

    let mut records = Vec::new();
    for compendium in &compendiums {
        match claim_descriptors(plugins_dir, compendium, &mut plugin_files) {
            Ok(()) => {}
            Err(e) => {
                warn!("[ADDON-SCAN] Skipping {}: {}", compendium.display(), e);
                continue;
            }
        }
        match parse_manifest(compendium, AddonKind::Plugin.root_tag()) {
            Ok(record) => records.push(record),
            Err(e) => warn!("[ADDON-SCAN] Skipping {}: {}", compendium.display(), e),
        }
    }

    for plugin_file in &plugin_files {
        match parse_manifest(plugin_file, PLUGIN_INFO_TAG) {
            Ok(mut record) => {
                if record.name.is_empty() {
                    record.name = file_stem(plugin_file);
                }
                record.category = UNMANAGED_CATEGORY.to_string();
                records.push(record);
            }
            Err(e) => warn!("[ADDON-SCAN] Skipping {}: {}", plugin_file.display(), e),
        }
    }

    Ok(records)
}

/// Removes the `.plugin` files a compendium describes from `plugin_files`.
fn claim_descriptors(
    plugins_dir: &Path,
    compendium: &Path,
    plugin_files: &mut Vec<PathBuf>,
) -> Result<(), AddonError> {
    for descriptor in parse_descriptors(compendium)? {
        let path = resolve_case_insensitive(plugins_dir, Path::new(&descriptor));
        plugin_files.retain(|file| file != &path);
        if !path.exists() {
            warn!(
                "[ADDON-SCAN] {} has misconfigured descriptors",
                compendium.display()
            );
        }
    }
    Ok(())
}

/// Scans a skins or music folder.
///
/// Each top-level folder is one add-on, managed if it directly holds a
/// compendium. Bare `.abc` files in the music folder are add-ons too.
fn scan_folders(kind: AddonKind, data_dir: &Path) -> Result<Vec<AddonRecord>, AddonError> {
    let mut records = Vec::new();

    for folder in sorted_dirs(data_dir)? {
        let compendium = sorted_entries(&folder)?
            .into_iter()
            .find(|p| p.is_file() && has_extension(p, kind.manifest_extension()));

        match compendium {
            Some(compendium) => match parse_manifest(&compendium, kind.root_tag()) {
                Ok(record) => records.push(record),
                Err(e) => warn!("[ADDON-SCAN] Skipping {}: {}", compendium.display(), e),
            },
            None => records.push(AddonRecord::unmanaged(
                file_stem(&folder),
                folder.display().to_string(),
            )),
        }
    }

    if kind == AddonKind::Music {
        for file in sorted_entries(data_dir)? {
            if !file.is_file() || !has_extension(&file, "abc") {
                continue;
            }
            let mut record = AddonRecord::unmanaged(file_stem(&file), file.display().to_string());
            match parse_abc_header(&file) {
                Ok((title, author)) => {
                    if !title.is_empty() {
                        record.name = title;
                    }
                    record.author = author;
                }
                Err(e) => warn!("[ADDON-SCAN] Could not read {}: {}", file.display(), e),
            }
            records.push(record);
        }
    }

    Ok(records)
}

/// Reads the song title and transcriber from the first lines of an ABC file.
pub fn parse_abc_header(path: &Path) -> Result<(String, String), AddonError> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);

    let mut title = String::new();
    let mut author = String::new();
    for line in content.lines().take(3) {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("T: ") {
            title = rest.to_string();
        }
        if let Some(rest) = line.strip_prefix("Z: ") {
            author = rest
                .strip_prefix("Transcribed by ")
                .unwrap_or(rest)
                .to_string();
        }
    }
    Ok((title, author))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, AddonError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>, AddonError> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect())
}

fn walk_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), AddonError> {
    for path in sorted_entries(dir)? {
        if path.is_dir() {
            walk_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn plugin_xml(name: &str, package: &str) -> String {
        format!(
            "<Plugin><Information><Name>{name}</Name><Author>Garan</Author>\
             <Version>1.0</Version></Information><Package>{package}</Package></Plugin>"
        )
    }

    #[test]
    fn test_scan_plugins_managed_and_unmanaged() {
        let tmp = TempDir::new().unwrap();
        let plugins = tmp.path();
        touch(
            &plugins.join("Garan/VitalTarget.plugin"),
            &plugin_xml("Vital Target", "Garan.VitalTarget.Main"),
        );
        touch(
            &plugins.join("Garan/Vital Target.plugincompendium"),
            "<PluginConfig><Id>1078</Id><Name>Vital Target</Name><Version>2.3</Version>\
             <Descriptors><descriptor>garan\\VitalTarget.plugin</descriptor></Descriptors>\
             </PluginConfig>",
        );
        touch(
            &plugins.join("Garan/Other.plugin"),
            &plugin_xml("Other", "Garan.Other.Main"),
        );
        // Nested compendiums are not author-level and are ignored
        touch(
            &plugins.join("Garan/Deep/x.plugincompendium"),
            "<PluginConfig><Id>1</Id></PluginConfig>",
        );

        let records = scan_plugins(plugins).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "1078");
        assert_eq!(records[1].name, "Other");
        assert_eq!(records[1].category, UNMANAGED_CATEGORY);
    }

    #[test]
    fn test_scan_skips_corrupt_manifest() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("Broken/Broken.skincompendium"), "<SkinConfig>");
        touch(
            &tmp.path().join("Good/Good.skincompendium"),
            "<SkinConfig><Id>5</Id><Name>Good</Name></SkinConfig>",
        );
        touch(&tmp.path().join("Loose/panel.tga"), "x");

        let records = scan(AddonKind::Skin, tmp.path()).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Good", "Loose"]);
        assert!(records[0].is_managed());
        assert!(!records[1].is_managed());
    }

    #[test]
    fn test_scan_music_bare_abc() {
        let tmp = TempDir::new().unwrap();
        touch(
            &tmp.path().join("tune.abc"),
            "X: 1\nT: Concerning Hobbits\nZ: Transcribed by Bilbo\nK: C\n",
        );
        touch(&tmp.path().join("plain.abc"), "X: 1\nK: C\n");

        let records = scan(AddonKind::Music, tmp.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "plain");
        assert_eq!(records[1].name, "Concerning Hobbits");
        assert_eq!(records[1].author, "Bilbo");
    }

    #[test]
    fn test_abc_header_plain_transcriber() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.abc");
        fs::write(&path, "T: Song\nZ: Somebody\n").unwrap();
        assert_eq!(
            parse_abc_header(&path).unwrap(),
            ("Song".to_string(), "Somebody".to_string())
        );
    }
}
