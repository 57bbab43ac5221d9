//! Add-on install, uninstall and update orchestration.
//!
//! Every install runs in a scratch directory below the work directory and
//! only touches the game's add-on folders once the content has been
//! unpacked, normalised and classified. That commit is the point of no
//! return: a failure after it is reported but the files stay in place.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::archive::{
    detect_kind, ensure_root_folder, extract, files_with_extension, has_extension, merge_into,
    normalize_invalid_wrappers, select_author_folder,
};
use super::catalog::CatalogStore;
use super::feed::{FeedFetcher, parse_feed};
use super::manifest::{
    get_existing_manifest, parse_descriptors, parse_manifest, plugin_package_folder,
    write_manifest,
};
use super::scan;
use super::scripts::StartupScripts;
use super::types::{
    AddonError, AddonKind, AddonRecord, InstallOutcome, InstalledAddon, RejectReason, TableKey,
};
use crate::config::{Config, FeedUrls, GameType};
use crate::paths::{from_windows_relative, resolve_case_insensitive};

/// Receives user-facing events from long-running operations.
pub trait InstallObserver {
    /// A line for the user's log view.
    fn log(&mut self, message: &str);

    /// Download progress of the current archive, `0.0..=1.0`.
    fn progress(&mut self, fraction: f32);

    /// Asks the user to accept `prompt`; `details` is shown alongside.
    fn confirm(&mut self, prompt: &str, details: &str) -> bool;
}

/// Content staged in a scratch directory, ready to be committed.
struct StagedAddon {
    kind: AddonKind,
    /// Folder that receives the manifest.
    manifest_dir: PathBuf,
    /// Top-level entries copied into the data folder.
    roots: Vec<PathBuf>,
}

/// Drives add-on operations for one game.
pub struct AddonManager {
    catalog: CatalogStore,
    scripts: StartupScripts,
    fetcher: Box<dyn FeedFetcher>,
    game: GameType,
    documents_dir: PathBuf,
    work_dir: PathBuf,
    feeds: FeedUrls,
    /// Identities being installed, to stop dependency cycles.
    in_progress: HashSet<String>,
}

impl AddonManager {
    /// Creates a manager for the game configured in `config`.
    pub fn new(
        config: &Config,
        catalog: CatalogStore,
        scripts: StartupScripts,
        fetcher: Box<dyn FeedFetcher>,
    ) -> Self {
        Self {
            catalog,
            scripts,
            fetcher,
            game: config.game,
            documents_dir: config.documents_dir(),
            work_dir: std::env::temp_dir().join("onelauncher-addons"),
            feeds: config.feeds.clone(),
            in_progress: HashSet::new(),
        }
    }

    /// Uses `work_dir` for scratch directories instead of the system
    /// temp folder.
    #[must_use]
    pub fn with_work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = work_dir;
        self
    }

    /// The catalog store.
    #[must_use]
    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// Enabled startup scripts.
    #[must_use]
    pub fn scripts(&self) -> &StartupScripts {
        &self.scripts
    }

    /// Game being managed.
    #[must_use]
    pub fn game(&self) -> GameType {
        self.game
    }

    /// Data folder for add-ons of `kind`.
    #[must_use]
    pub fn data_dir(&self, kind: AddonKind) -> PathBuf {
        self.documents_dir.join(kind.data_folder())
    }

    /// Closes the catalog.
    pub fn close(self) -> Result<(), AddonError> {
        self.catalog.close()
    }

    // ---------------------------------------------------------------
    // Catalog refresh
    // ---------------------------------------------------------------

    /// Rescans the data folder of `kind` and reconciles versions.
    pub fn refresh_installed(&mut self, kind: AddonKind) -> Result<(), AddonError> {
        let records = scan::scan(kind, &self.data_dir(kind))?;
        self.catalog.upsert_local_scan(kind, &records)?;
        self.catalog.reconcile_versions()?;
        Ok(())
    }

    /// Fetches the remote feed of `kind`.
    pub fn refresh_remote(&mut self, kind: AddonKind) -> Result<(), AddonError> {
        let Some(url) = self.feeds.url(self.game, kind) else {
            return Ok(());
        };
        let document = self.fetcher.fetch_feed(&url)?;
        let records = parse_feed(&document, &url)?;
        self.catalog.upsert_remote_feed(kind, &records)?;
        info!(
            "[ADDON-FEED] {} remote {kind} add-ons available",
            records.len()
        );
        Ok(())
    }

    /// Rescans every supported kind, fetches every feed and reconciles.
    pub fn refresh_all(&mut self) -> Result<(), AddonError> {
        for kind in self.game.kinds() {
            let records = scan::scan(kind, &self.data_dir(kind))?;
            self.catalog.upsert_local_scan(kind, &records)?;
            self.refresh_remote(kind)?;
        }
        self.catalog.reconcile_versions()?;
        Ok(())
    }

    /// Refreshes everything and returns the installed add-ons with updates.
    pub fn check_for_updates(&mut self) -> Result<Vec<(AddonKind, AddonRecord)>, AddonError> {
        self.refresh_all()?;
        let mut outdated = Vec::new();
        for kind in self.game.kinds() {
            for record in self.catalog.outdated(kind)? {
                outdated.push((kind, record));
            }
        }
        Ok(outdated)
    }

    /// Searches a catalog table.
    pub fn search(&self, key: TableKey, text: &str) -> Result<Vec<AddonRecord>, AddonError> {
        self.catalog.search(key, text)
    }

    // ---------------------------------------------------------------
    // Install
    // ---------------------------------------------------------------

    /// Installs a local archive or `.abc` file. Its metadata is untrusted, so
    /// the result is unmanaged.
    pub fn install_local(
        &mut self,
        source: &Path,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstallOutcome, AddonError> {
        self.install_archive(source, None, observer)
    }

    /// Downloads and installs the remote add-on `id` of `kind`.
    pub fn install_remote(
        &mut self,
        kind: AddonKind,
        id: &str,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstallOutcome, AddonError> {
        if !self.game.supports(kind) {
            observer.log(&format!("{} does not support {kind} add-ons", self.game));
            return Ok(InstallOutcome::Rejected(RejectReason::UnsupportedForGame));
        }
        let remote = self
            .catalog
            .find_by_id(TableKey::remote(kind), id)?
            .ok_or_else(|| AddonError::NotFound(id.to_string()))?;
        self.install_from_url(&remote.file, remote.display_name(), id, observer)
    }

    fn install_from_url(
        &mut self,
        url: &str,
        name: &str,
        id: &str,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstallOutcome, AddonError> {
        if !self.in_progress.insert(id.to_string()) {
            debug!("[ADDON-INSTALL] {id} is already being installed");
            return Ok(InstallOutcome::Rejected(RejectReason::Cancelled));
        }
        let result = self.download_and_install(url, name, id, observer);
        self.in_progress.remove(id);
        result
    }

    fn download_and_install(
        &mut self,
        url: &str,
        name: &str,
        id: &str,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstallOutcome, AddonError> {
        fs::create_dir_all(&self.work_dir)?;
        let download_dir = tempfile::Builder::new()
            .prefix("download-")
            .tempdir_in(&self.work_dir)?;

        // The file stem names the root folder of layouts that lack one
        let archive = download_dir.path().join(format!("{}.zip", sanitize_file_name(name)));

        observer.log(&format!("Downloading {name}"));
        info!("[ADDON-INSTALL] Downloading {} from {}", name, url);
        self.fetcher
            .fetch_file(url, &archive, &mut |fraction| observer.progress(fraction))?;

        self.install_archive(&archive, Some(id), observer)
    }

    fn install_archive(
        &mut self,
        source: &Path,
        id: Option<&str>,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstallOutcome, AddonError> {
        if has_extension(source, "abc") {
            return self.install_abc(source, observer);
        }
        if !has_extension(source, "zip") {
            observer.log(&format!(
                "{} is not a supported archive. Only .zip archives and .abc files can be installed",
                source.display()
            ));
            return Ok(InstallOutcome::Rejected(RejectReason::UnsupportedFormat));
        }

        let fallback_name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "addon".to_string());

        fs::create_dir_all(&self.work_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix("install-")
            .tempdir_in(&self.work_dir)?;

        extract(source, scratch.path())?;
        normalize_invalid_wrappers(scratch.path())?;

        let kind = detect_kind(scratch.path())?;
        if !self.game.supports(kind) {
            observer.log(&format!("{} does not support {kind} add-ons", self.game));
            return Ok(InstallOutcome::Rejected(RejectReason::UnsupportedForGame));
        }

        let staged = match kind {
            AddonKind::Plugin => {
                let author = match select_author_folder(scratch.path(), &fallback_name) {
                    Ok(author) => author,
                    Err(AddonError::AmbiguousAuthorFolder { source_name }) => {
                        observer.log(&format!(
                            "{source_name} doesn't have an author folder with a .plugin file"
                        ));
                        return Ok(InstallOutcome::Rejected(
                            RejectReason::AmbiguousAuthorFolder,
                        ));
                    }
                    Err(e) => return Err(e),
                };
                let roots = fs::read_dir(scratch.path())?
                    .map(|entry| entry.map(|e| e.path()))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|path| {
                        let keep = path.is_dir();
                        if !keep {
                            warn!(
                                "[ADDON-INSTALL] Ignoring loose file {} outside any author folder",
                                path.display()
                            );
                        }
                        keep
                    })
                    .collect();
                StagedAddon {
                    kind,
                    manifest_dir: author,
                    roots,
                }
            }
            AddonKind::Skin | AddonKind::Music => {
                let root = ensure_root_folder(scratch.path(), &fallback_name)?;
                StagedAddon {
                    kind,
                    manifest_dir: root.clone(),
                    roots: vec![root],
                }
            }
        };

        let record = self.prepare_manifest(&staged, id, observer)?;
        let installed = self.commit(&staged, record.as_ref(), observer)?;

        // Scratch content is committed; drop it before any cascade
        drop(scratch);

        if let Some(record) = &record {
            self.prompt_startup_script(kind, record, observer)?;
            self.install_dependencies(kind, &record.id, observer);
        }

        Ok(InstallOutcome::Installed(installed))
    }

    /// Writes a fresh manifest for catalog installs, or drops an untrusted
    /// one. Returns the managed record, if any.
    fn prepare_manifest(
        &self,
        staged: &StagedAddon,
        id: Option<&str>,
        observer: &mut dyn InstallObserver,
    ) -> Result<Option<AddonRecord>, AddonError> {
        let existing = get_existing_manifest(&staged.manifest_dir)?;

        let remote = match id {
            Some(id) => self.catalog.find_by_id(TableKey::remote(staged.kind), id)?,
            None => None,
        };
        let Some(remote) = remote else {
            if let Some(existing) = existing {
                debug!(
                    "[ADDON-INSTALL] Removing unverified manifest {}",
                    existing.display()
                );
                fs::remove_file(&existing)?;
            }
            if let Some(id) = id {
                warn!(
                    "[ADDON-INSTALL] {id} is not a remote {} add-on, installing as unmanaged",
                    staged.kind
                );
            }
            return Ok(None);
        };

        let mut record = AddonRecord {
            name: remote.display_name().to_string(),
            version: remote.plain_version().to_string(),
            download_url: remote.file.clone(),
            dependencies: Vec::new(),
            startup_script: String::new(),
            ..remote.clone()
        };

        if let Some(existing) = existing {
            match parse_manifest(&existing, staged.kind.root_tag()) {
                Ok(old) => {
                    record.dependencies = old.dependencies;
                    record.startup_script = old.startup_script;
                }
                Err(e) => {
                    warn!("[ADDON-INSTALL] Ignoring unreadable manifest: {}", e);
                    observer.log(&format!("Ignoring unreadable manifest: {e}"));
                }
            }
            fs::remove_file(&existing)?;
        }

        let descriptors = if staged.kind == AddonKind::Plugin {
            let author_name = folder_name(&staged.manifest_dir);
            files_with_extension(&staged.manifest_dir, "plugin")?
                .iter()
                .map(|file| format!("{}\\{}", author_name, folder_name(file)))
                .collect()
        } else {
            Vec::new()
        };

        write_manifest(&staged.manifest_dir, staged.kind, &record, &descriptors)?;
        Ok(Some(record))
    }

    /// Copies staged content into the data folder and registers it.
    fn commit(
        &mut self,
        staged: &StagedAddon,
        record: Option<&AddonRecord>,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstalledAddon, AddonError> {
        let data_dir = self.data_dir(staged.kind);
        fs::create_dir_all(&data_dir)?;

        for root in &staged.roots {
            merge_into(root, &data_dir.join(folder_name(root)))?;
        }

        let path = data_dir.join(folder_name(&staged.manifest_dir));
        let name = record.map_or_else(|| folder_name(&staged.manifest_dir), |r| r.name.clone());
        let id = record.map(|r| r.id.clone());

        info!("[ADDON-INSTALL] Installed {} {} to {}", staged.kind, name, path.display());
        observer.log(&format!("{name} installed"));

        self.refresh_installed(staged.kind)?;
        if let Some(id) = &id {
            self.catalog.set_remote_installed(staged.kind, id, true)?;
        }

        Ok(InstalledAddon {
            kind: staged.kind,
            name,
            id,
            path,
        })
    }

    fn install_abc(
        &mut self,
        source: &Path,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstallOutcome, AddonError> {
        if !self.game.supports(AddonKind::Music) {
            observer.log(&format!("{} does not support .abc/music files", self.game));
            return Ok(InstallOutcome::Rejected(RejectReason::UnsupportedForGame));
        }

        let music_dir = self.data_dir(AddonKind::Music);
        fs::create_dir_all(&music_dir)?;
        let name = folder_name(source);
        let target = music_dir.join(&name);
        if target.is_dir() {
            return Err(AddonError::FilesystemConflict {
                path: target,
                reason: "a folder with the song's name exists".to_string(),
            });
        }
        fs::copy(source, &target)?;
        info!("[ADDON-INSTALL] Copied {} to {}", source.display(), target.display());
        observer.log(&format!("{name} installed"));

        self.refresh_installed(AddonKind::Music)?;

        Ok(InstallOutcome::Installed(InstalledAddon {
            kind: AddonKind::Music,
            name,
            id: None,
            path: target,
        }))
    }

    /// Installs missing dependencies of `id`. Failures are logged and
    /// skipped.
    fn install_dependencies(
        &mut self,
        kind: AddonKind,
        id: &str,
        observer: &mut dyn InstallObserver,
    ) {
        let targets = match self.catalog.dependency_targets(kind, id) {
            Ok(targets) => targets,
            Err(e) => {
                warn!("[ADDON-INSTALL] Could not resolve dependencies of {id}: {e}");
                return;
            }
        };

        for target in targets {
            observer.log(&format!("Installing dependency {}", target.name));
            match self.install_from_url(&target.file, &target.name, &target.id, observer) {
                Ok(InstallOutcome::Installed(_)) => {}
                Ok(InstallOutcome::Rejected(reason)) => {
                    warn!("[ADDON-INSTALL] Dependency {} rejected: {reason}", target.id);
                    observer.log(&format!("Dependency {} was not installed: {reason}", target.name));
                }
                Err(e) => {
                    warn!("[ADDON-INSTALL] Dependency {} failed: {e}", target.id);
                    observer.log(&format!("Dependency {} failed: {e}", target.name));
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Startup scripts
    // ---------------------------------------------------------------

    fn prompt_startup_script(
        &mut self,
        kind: AddonKind,
        record: &AddonRecord,
        observer: &mut dyn InstallObserver,
    ) -> Result<(), AddonError> {
        if record.startup_script.is_empty() {
            return Ok(());
        }
        let Some((relative, path)) = self.locate_startup_script(kind, &record.startup_script)
        else {
            warn!(
                "[ADDON-SCRIPTS] Ignoring startup script outside the data folder: {}",
                record.startup_script
            );
            observer.log(&format!(
                "{} declares a startup script outside its data folder, so it was ignored: {}",
                record.name, record.startup_script
            ));
            return Ok(());
        };
        if !path.is_file() {
            observer.log(&format!(
                "{} declares a startup script that does not exist: {relative}",
                record.name
            ));
            return Ok(());
        }

        let source = String::from_utf8_lossy(&fs::read(&path)?).into_owned();
        let prompt = format!(
            "{} is requesting to run a Python script at every game launch. \
             Review the script's code before enabling it.",
            record.name
        );
        if observer.confirm(&prompt, &source) {
            self.scripts.enable(&relative)?;
        } else {
            info!("[ADDON-INSTALL] Startup script {relative} declined");
        }
        Ok(())
    }

    /// Enables the startup script of the installed add-on `id`.
    ///
    /// Returns false if it has none or the file is missing.
    pub fn enable_startup_script(
        &mut self,
        kind: AddonKind,
        id: &str,
        observer: &mut dyn InstallObserver,
    ) -> Result<bool, AddonError> {
        let record = self.installed_record(kind, id)?;
        if record.startup_script.is_empty() {
            observer.log(&format!("{} has no startup script", record.name));
            return Ok(false);
        }
        let Some((relative, path)) = self.locate_startup_script(kind, &record.startup_script)
        else {
            observer.log(&format!(
                "{} declares a startup script outside its data folder, so it was not enabled",
                record.name
            ));
            return Ok(false);
        };
        if !path.is_file() {
            observer.log(&format!(
                "'{}' startup script does not exist, so it could not be enabled",
                path.display()
            ));
            return Ok(false);
        }
        self.scripts.enable(&relative)
    }

    /// Disables the startup script of the installed add-on `id`.
    pub fn disable_startup_script(&mut self, kind: AddonKind, id: &str) -> Result<bool, AddonError> {
        let record = self.installed_record(kind, id)?;
        let Some((relative, _)) = self.locate_startup_script(kind, &record.startup_script) else {
            return Ok(false);
        };
        self.scripts.disable(&relative)
    }

    fn remove_startup_script(&mut self, kind: AddonKind, script: &str) -> Result<(), AddonError> {
        let Some((relative, path)) = self.locate_startup_script(kind, script) else {
            return Ok(());
        };
        self.scripts.disable(&relative)?;
        if path.is_file() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Resolves a manifest's startup script on disk.
    ///
    /// Returns the registry path (relative to the documents folder, with the
    /// on-disk casing) and the absolute file path. `None` when the script is
    /// empty or would resolve outside the add-on data folder.
    fn locate_startup_script(&self, kind: AddonKind, script: &str) -> Option<(String, PathBuf)> {
        let relative = from_windows_relative(&startup_script_relative(kind, script)?)?;
        let path = resolve_case_insensitive(&self.documents_dir, &relative);
        let stored = path
            .strip_prefix(&self.documents_dir)
            .ok()?
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some((stored, path))
    }

    fn installed_record(&self, kind: AddonKind, id: &str) -> Result<AddonRecord, AddonError> {
        self.catalog
            .find_by_id(TableKey::installed(kind), id)?
            .ok_or_else(|| AddonError::NotFound(id.to_string()))
    }

    // ---------------------------------------------------------------
    // Uninstall and update
    // ---------------------------------------------------------------

    /// Uninstalls the add-on matching `name_or_id`.
    ///
    /// Returns false if the user declined to remove a plugin that other
    /// add-ons depend on.
    pub fn uninstall(
        &mut self,
        kind: AddonKind,
        name_or_id: &str,
        observer: &mut dyn InstallObserver,
    ) -> Result<bool, AddonError> {
        let record = self
            .catalog
            .find_installed(kind, name_or_id)?
            .ok_or_else(|| AddonError::NotFound(name_or_id.to_string()))?;
        self.remove(kind, &record, true, observer)
    }

    fn remove(
        &mut self,
        kind: AddonKind,
        record: &AddonRecord,
        check_dependents: bool,
        observer: &mut dyn InstallObserver,
    ) -> Result<bool, AddonError> {
        let file = PathBuf::from(&record.file);
        let managed = has_extension(&file, kind.manifest_extension());

        if kind == AddonKind::Plugin && managed && check_dependents {
            let dependents = self.catalog.dependents(kind, &record.id)?;
            if !dependents.is_empty() {
                let names: Vec<&str> = dependents.iter().map(AddonRecord::display_name).collect();
                let prompt = format!(
                    "{} installed add-on(s) depend on {}. Are you sure you want to remove it?",
                    dependents.len(),
                    record.name
                );
                if !observer.confirm(&prompt, &names.join("\n")) {
                    info!("[ADDON-UNINSTALL] Kept {} for its dependents", record.name);
                    return Ok(false);
                }
            }
        }

        // Resolved while the script file still exists, so the registry entry matches
        if managed {
            self.remove_startup_script(kind, &record.startup_script)?;
        }

        match kind {
            AddonKind::Plugin if managed => self.remove_managed_plugin(&file)?,
            AddonKind::Plugin => remove_path(&file)?,
            AddonKind::Skin | AddonKind::Music => {
                let data_dir = self.data_dir(kind);
                let target = if managed {
                    file.parent()
                        .filter(|parent| *parent != data_dir)
                        .map_or_else(|| file.clone(), Path::to_path_buf)
                } else {
                    file.clone()
                };
                remove_path(&target)?;
            }
        }

        if managed {
            self.catalog.set_remote_installed(kind, &record.id, false)?;
        }
        // A stale update flag would otherwise outlive a reinstall
        self.catalog.clear_updated_markers(kind)?;

        info!("[ADDON-UNINSTALL] Removed {} {}", kind, record.name);
        observer.log(&format!("{} uninstalled", record.name));

        self.refresh_installed(kind)?;
        Ok(true)
    }

    fn remove_managed_plugin(&self, compendium: &Path) -> Result<(), AddonError> {
        let plugins_dir = self.data_dir(AddonKind::Plugin);

        let descriptors = parse_descriptors(compendium).unwrap_or_else(|e| {
            warn!("[ADDON-UNINSTALL] Could not read descriptors: {}", e);
            Vec::new()
        });

        for descriptor in descriptors {
            let plugin_file = resolve_case_insensitive(&plugins_dir, Path::new(&descriptor));
            if !plugin_file.is_file() {
                continue;
            }
            match plugin_package_folder(&plugin_file) {
                Ok(Some(folder)) => {
                    let package_dir = resolve_case_insensitive(&plugins_dir, &folder);
                    if package_dir.is_dir() && package_dir != plugins_dir {
                        debug!("[ADDON-UNINSTALL] Removing {}", package_dir.display());
                        fs::remove_dir_all(&package_dir)?;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(
                    "[ADDON-UNINSTALL] Could not read {}: {}",
                    plugin_file.display(),
                    e
                ),
            }
            remove_path(&plugin_file)?;
        }

        remove_path(compendium)?;

        // Remove author folder if there are no other plugins in it
        if let Some(author_dir) = compendium.parent() {
            if author_dir != plugins_dir && is_empty_dir(author_dir)? {
                fs::remove_dir(author_dir)?;
            }
        }
        Ok(())
    }

    /// Replaces the installed add-on `id` with the latest remote release.
    pub fn update(
        &mut self,
        kind: AddonKind,
        id: &str,
        observer: &mut dyn InstallObserver,
    ) -> Result<InstallOutcome, AddonError> {
        let installed = self.installed_record(kind, id)?;
        let remote = self
            .catalog
            .find_by_id(TableKey::remote(kind), id)?
            .ok_or_else(|| AddonError::NotFound(id.to_string()))?;

        observer.log(&format!("Updating {}", installed.name));
        self.remove(kind, &installed, false, observer)?;
        self.install_from_url(&remote.file, remote.display_name(), id, observer)
    }

    /// Updates every outdated add-on. Failures are logged and skipped.
    /// Returns the number of add-ons updated.
    pub fn update_all(&mut self, observer: &mut dyn InstallObserver) -> Result<usize, AddonError> {
        let mut updated = 0;
        for kind in self.game.kinds() {
            for record in self.catalog.outdated(kind)? {
                match self.update(kind, &record.id, observer) {
                    Ok(InstallOutcome::Installed(_)) => updated += 1,
                    Ok(InstallOutcome::Rejected(reason)) => {
                        observer.log(&format!("{} was not updated: {reason}", record.name));
                    }
                    Err(e) => {
                        warn!("[ADDON-UPDATE] {} failed: {}", record.name, e);
                        observer.log(&format!("{} failed to update: {e}", record.name));
                    }
                }
            }
        }
        Ok(updated)
    }
}

/// Startup script path relative to the game documents folder.
///
/// `None` for empty, rooted or `..` paths, which could name a file outside
/// the data folder.
fn startup_script_relative(kind: AddonKind, script: &str) -> Option<String> {
    let parts = from_windows_relative(script)?;
    let parts: Vec<_> = parts
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect();
    Some(format!("{}/{}", kind.data_folder(), parts.join("/")))
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        "addon".to_string()
    } else {
        cleaned
    }
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn remove_path(path: &Path) -> Result<(), AddonError> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

fn is_empty_dir(dir: &Path) -> Result<bool, AddonError> {
    Ok(dir.is_dir() && fs::read_dir(dir)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_script_relative() {
        assert_eq!(
            startup_script_relative(AddonKind::Plugin, "Garan\\VT\\startup.py").as_deref(),
            Some("Plugins/Garan/VT/startup.py")
        );
        assert_eq!(
            startup_script_relative(AddonKind::Skin, "Dark\\.\\run.py").as_deref(),
            Some("ui/skins/Dark/run.py")
        );
    }

    #[test]
    fn test_startup_script_relative_rejects_escapes() {
        assert_eq!(
            startup_script_relative(AddonKind::Plugin, "Evil\\..\\..\\..\\tmp\\payload.py"),
            None
        );
        assert_eq!(startup_script_relative(AddonKind::Skin, "/run.py"), None);
        assert_eq!(startup_script_relative(AddonKind::Music, "C:\\run.py"), None);
        assert_eq!(startup_script_relative(AddonKind::Plugin, ""), None);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Vital Target"), "Vital Target");
        assert_eq!(sanitize_file_name("A/B: C?"), "A-B- C-");
        assert_eq!(sanitize_file_name(".."), "addon");
    }
}
