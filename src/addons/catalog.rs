//! Add-on catalog store.
//!
//! A disposable SQLite cache holding one FTS5 table per add-on kind and
//! locality. Installed tables are rebuilt from filesystem scans, remote
//! tables from the feed; the two sides are reconciled by identity.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info, warn};

use super::types::{
    AddonError, AddonKind, AddonRecord, INSTALLED_MARKER, OUTDATED_MARKER, TableKey,
    UNMANAGED_CATEGORY, UPDATED_MARKER, resolve_dependency_alias, strip_markers,
};

/// Column layout shared by every catalog table.
pub const COLUMNS: [&str; 9] = [
    "Name",
    "Category",
    "Version",
    "Author",
    "LatestRelease",
    "File",
    "AddonId",
    "Dependencies",
    "StartupScript",
];

/// Suffixes of the shadow tables FTS5 creates next to each virtual table.
const FTS_SHADOW_SUFFIXES: [&str; 5] = ["_data", "_idx", "_content", "_docsize", "_config"];

const SELECT_COLUMNS: &str = "rowid, Name, Category, Version, Author, LatestRelease, File, \
                              AddonId, Dependencies, StartupScript";

/// A dependency that still has to be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTarget {
    /// Download URL from the remote table.
    pub file: String,
    /// Remote display name.
    pub name: String,
    /// Remote identity, with the utility alias already resolved.
    pub id: String,
}

/// Owned handle to the catalog database.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Opens (or creates) the catalog at `path`.
    ///
    /// A layout that doesn't match the expected tables and columns is
    /// dropped and recreated empty.
    pub fn open(path: &Path) -> Result<Self, AddonError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.ensure_schema()?;
        debug!("[ADDON-CATALOG] Opened {}", path.display());
        Ok(store)
    }

    /// Opens a throwaway in-memory catalog.
    pub fn open_in_memory() -> Result<Self, AddonError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Closes the database, reporting any error flushing it.
    pub fn close(self) -> Result<(), AddonError> {
        self.conn.close().map_err(|(_, e)| AddonError::Database(e))
    }

    fn ensure_schema(&self) -> Result<(), AddonError> {
        if self.schema_matches()? {
            return Ok(());
        }

        info!("[ADDON-CATALOG] Cache layout changed, rebuilding");
        // Dropping a virtual table drops its shadow tables too
        for name in self.user_tables()?.into_iter().filter(|n| !is_shadow_table(n)) {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS \"{name}\";"))?;
        }
        for name in self.user_tables()? {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS \"{name}\";"))?;
        }

        for key in TableKey::ALL {
            self.conn.execute_batch(&format!(
                "CREATE VIRTUAL TABLE {} USING fts5({});",
                key.table_name(),
                COLUMNS.join(", ")
            ))?;
        }
        Ok(())
    }

    fn schema_matches(&self) -> Result<bool, AddonError> {
        let actual: HashSet<String> = self
            .user_tables()?
            .into_iter()
            .filter(|name| !is_shadow_table(name))
            .collect();
        let expected: HashSet<String> = TableKey::ALL
            .iter()
            .map(|key| key.table_name().to_string())
            .collect();
        if actual != expected {
            return Ok(false);
        }

        for key in TableKey::ALL {
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
            let columns = stmt
                .query_map([key.table_name()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            if columns != COLUMNS {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn user_tables(&self) -> Result<Vec<String>, AddonError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Replaces an installed table with a fresh scan.
    ///
    /// Category and latest release are filled in from the remote table;
    /// anything the remote side doesn't know is `Unmanaged`.
    pub fn upsert_local_scan(
        &mut self,
        kind: AddonKind,
        records: &[AddonRecord],
    ) -> Result<(), AddonError> {
        let installed = TableKey::installed(kind).table_name();
        let remote = TableKey::remote(kind).table_name();

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {installed}"), [])?;
        {
            let mut lookup = tx.prepare(&format!(
                "SELECT Category, LatestRelease FROM {remote} WHERE AddonId = ?1 LIMIT 1"
            ))?;
            let mut insert = tx.prepare(&insert_sql(installed))?;
            let mut seen = HashSet::new();

            for record in records {
                let mut row = record.clone();
                if row.is_managed() {
                    if !seen.insert(row.id.clone()) {
                        warn!(
                            "[ADDON-CATALOG] Duplicate {kind} identity {} at {}, skipping",
                            row.id, row.file
                        );
                        continue;
                    }
                    let info = lookup
                        .query_row([&row.id], |r| {
                            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
                        })
                        .optional()?;
                    if let Some((category, latest_release)) = info {
                        row.category = category;
                        row.latest_release = latest_release;
                    }
                }
                if row.category.is_empty() {
                    row.category = UNMANAGED_CATEGORY.to_string();
                }
                insert.execute(record_params(&row))?;
            }
        }
        tx.commit()?;

        debug!(
            "[ADDON-CATALOG] Stored {} installed {kind} entries",
            records.len()
        );
        Ok(())
    }

    /// Replaces a remote table with a freshly fetched feed.
    ///
    /// Names of entries whose identity is installed get the installed marker,
    /// and the matching installed rows take over the remote category and
    /// release date.
    pub fn upsert_remote_feed(
        &mut self,
        kind: AddonKind,
        records: &[AddonRecord],
    ) -> Result<(), AddonError> {
        let installed_ids = self.installed_ids(kind)?;
        let installed = TableKey::installed(kind).table_name();
        let remote = TableKey::remote(kind).table_name();

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {remote}"), [])?;
        {
            let mut insert = tx.prepare(&insert_sql(remote))?;
            let mut backfill = tx.prepare(&format!(
                "UPDATE {installed} SET Category = ?1, LatestRelease = ?2 WHERE AddonId = ?3"
            ))?;
            let mut seen = HashSet::new();
            for record in records {
                if record.is_managed() && !seen.insert(record.id.as_str()) {
                    continue;
                }
                let mut row = record.clone();
                row.name = record.display_name().to_string();
                if row.is_managed() && installed_ids.contains(&row.id) {
                    row.name = format!("{INSTALLED_MARKER}{}", row.name);
                    backfill.execute(params![row.category, row.latest_release, row.id])?;
                }
                insert.execute(record_params(&row))?;
            }
        }
        tx.commit()?;

        debug!(
            "[ADDON-CATALOG] Stored {} remote {kind} entries",
            records.len()
        );
        Ok(())
    }

    /// Marks installed add-ons with a newer remote version.
    ///
    /// Every installed row with an identity is matched against the installed
    /// remote row of the same identity; differing versions get the outdated
    /// and updated markers. Returns the number of outdated add-ons.
    pub fn reconcile_versions(&mut self) -> Result<usize, AddonError> {
        let mut outdated = 0;
        for kind in AddonKind::ALL {
            outdated += self.reconcile_kind(kind)?;
        }
        if outdated > 0 {
            info!("[ADDON-CATALOG] {outdated} add-on(s) have updates");
        }
        Ok(outdated)
    }

    fn reconcile_kind(&mut self, kind: AddonKind) -> Result<usize, AddonError> {
        let installed_key = TableKey::installed(kind);
        let remote_key = TableKey::remote(kind);

        let remote_by_id: HashMap<String, (i64, AddonRecord)> = self
            .rows_with_rowid(remote_key)?
            .into_iter()
            .filter(|(_, r)| r.is_managed() && r.name.starts_with(INSTALLED_MARKER))
            .map(|(rowid, r)| (r.id.clone(), (rowid, r)))
            .collect();

        let mut updates = Vec::new();
        for (rowid, local) in self.rows_with_rowid(installed_key)? {
            if !local.is_managed() {
                continue;
            }
            let Some((remote_rowid, remote)) = remote_by_id.get(&local.id) else {
                continue;
            };
            if local.plain_version() == remote.plain_version() {
                continue;
            }
            updates.push((
                rowid,
                format!("{OUTDATED_MARKER}{}", local.plain_version()),
                *remote_rowid,
                format!("{UPDATED_MARKER}{}", remote.plain_version()),
            ));
        }

        let tx = self.conn.transaction()?;
        for (rowid, local_version, remote_rowid, remote_version) in &updates {
            tx.execute(
                &format!(
                    "UPDATE {} SET Version = ?1 WHERE rowid = ?2",
                    installed_key.table_name()
                ),
                params![local_version, rowid],
            )?;
            tx.execute(
                &format!(
                    "UPDATE {} SET Version = ?1 WHERE rowid = ?2",
                    remote_key.table_name()
                ),
                params![remote_version, remote_rowid],
            )?;
        }
        tx.commit()?;

        Ok(updates.len())
    }

    /// Dependencies of the installed add-on `identity` that are not
    /// installed yet and can be fetched from the remote table.
    pub fn dependency_targets(
        &self,
        kind: AddonKind,
        identity: &str,
    ) -> Result<Vec<DependencyTarget>, AddonError> {
        if identity.is_empty() {
            return Ok(Vec::new());
        }

        let installed = TableKey::installed(kind).table_name();
        let remote = TableKey::remote(kind).table_name();

        let dependencies: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT Dependencies FROM {installed} WHERE AddonId = ?1 \
                     ORDER BY rowid DESC LIMIT 1"
                ),
                [identity],
                |row| row.get(0),
            )
            .optional()?;
        let Some(dependencies) = dependencies else {
            return Ok(Vec::new());
        };

        let installed_ids = self.installed_ids(kind)?;
        let mut lookup = self.conn.prepare(&format!(
            "SELECT File, Name FROM {remote} WHERE AddonId = ?1 LIMIT 1"
        ))?;

        let mut targets: Vec<DependencyTarget> = Vec::new();
        for dependency in split_dependencies(&dependencies) {
            let id = resolve_dependency_alias(&dependency).to_string();
            if installed_ids.contains(&id) || targets.iter().any(|t| t.id == id) {
                continue;
            }
            let found = lookup
                .query_row([&id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .optional()?;
            match found {
                Some((file, name)) => targets.push(DependencyTarget {
                    file,
                    name: strip_markers(&name).to_string(),
                    id,
                }),
                None => debug!("[ADDON-CATALOG] Dependency {id} is not in the remote {kind} list"),
            }
        }
        Ok(targets)
    }

    /// Case-insensitive search.
    ///
    /// Every whitespace-separated word must appear in the name, category or
    /// author. Empty text returns every row. Results are ordered by name.
    ///
    /// Matching is done here rather than with SQL `LIKE`, which only folds
    /// ASCII case.
    pub fn search(&self, key: TableKey, text: &str) -> Result<Vec<AddonRecord>, AddonError> {
        let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();

        let mut records: Vec<AddonRecord> = self
            .rows(key)?
            .into_iter()
            .filter(|record| {
                let haystack = [&record.name, &record.category, &record.author]
                    .map(|field| field.to_lowercase());
                words
                    .iter()
                    .all(|word| haystack.iter().any(|field| field.contains(word.as_str())))
            })
            .collect();
        records.sort_by_key(|r| r.display_name().to_lowercase());
        Ok(records)
    }

    /// Every row of a table in insertion order.
    pub fn rows(&self, key: TableKey) -> Result<Vec<AddonRecord>, AddonError> {
        Ok(self
            .rows_with_rowid(key)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    fn rows_with_rowid(&self, key: TableKey) -> Result<Vec<(i64, AddonRecord)>, AddonError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM {} ORDER BY rowid",
            key.table_name()
        ))?;
        let rows = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Row with the given identity.
    pub fn find_by_id(&self, key: TableKey, id: &str) -> Result<Option<AddonRecord>, AddonError> {
        if id.is_empty() {
            return Ok(None);
        }
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM {} WHERE AddonId = ?1 ORDER BY rowid DESC LIMIT 1",
                    key.table_name()
                ),
                [id],
                record_from_row,
            )
            .optional()?;
        Ok(record.map(|(_, r)| r))
    }

    /// Installed row matching an identity, a name or a file path.
    pub fn find_installed(
        &self,
        kind: AddonKind,
        name_or_id: &str,
    ) -> Result<Option<AddonRecord>, AddonError> {
        if let Some(record) = self.find_by_id(TableKey::installed(kind), name_or_id)? {
            return Ok(Some(record));
        }
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM {} WHERE Name = ?1 OR File = ?1 \
                     ORDER BY rowid LIMIT 1",
                    TableKey::installed(kind).table_name()
                ),
                [name_or_id],
                record_from_row,
            )
            .optional()?;
        Ok(record.map(|(_, r)| r))
    }

    /// Checks if an identity is installed.
    pub fn is_installed(&self, kind: AddonKind, id: &str) -> Result<bool, AddonError> {
        Ok(self.installed_ids(kind)?.contains(id))
    }

    fn installed_ids(&self, kind: AddonKind) -> Result<HashSet<String>, AddonError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT AddonId FROM {} WHERE AddonId != ''",
            TableKey::installed(kind).table_name()
        ))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Installed add-ons that list `id` as a dependency.
    ///
    /// The builtin utility identity and its alias are treated as equal.
    pub fn dependents(&self, kind: AddonKind, id: &str) -> Result<Vec<AddonRecord>, AddonError> {
        if id.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = resolve_dependency_alias(id);
        Ok(self
            .rows(TableKey::installed(kind))?
            .into_iter()
            .filter(|record| record.id != id)
            .filter(|record| {
                record
                    .dependencies
                    .iter()
                    .any(|dep| resolve_dependency_alias(dep) == wanted)
            })
            .collect())
    }

    /// Adds or removes the installed marker on the remote row for `id`.
    pub fn set_remote_installed(
        &self,
        kind: AddonKind,
        id: &str,
        installed: bool,
    ) -> Result<(), AddonError> {
        let remote = TableKey::remote(kind);
        let Some(record) = self.find_by_id(remote, id)? else {
            return Ok(());
        };
        let name = if installed {
            format!("{INSTALLED_MARKER}{}", record.display_name())
        } else {
            record.display_name().to_string()
        };
        self.conn.execute(
            &format!("UPDATE {} SET Name = ?1 WHERE AddonId = ?2", remote.table_name()),
            params![name, id],
        )?;
        Ok(())
    }

    /// Strips every updated marker from a remote table.
    pub fn clear_updated_markers(&self, kind: AddonKind) -> Result<usize, AddonError> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET Version = substr(Version, length(?1) + 1) \
                 WHERE substr(Version, 1, length(?1)) = ?1",
                TableKey::remote(kind).table_name()
            ),
            [UPDATED_MARKER],
        )?;
        Ok(changed)
    }

    /// Installed add-ons carrying the outdated marker.
    pub fn outdated(&self, kind: AddonKind) -> Result<Vec<AddonRecord>, AddonError> {
        Ok(self
            .rows(TableKey::installed(kind))?
            .into_iter()
            .filter(|r| r.is_managed() && r.version.starts_with(OUTDATED_MARKER))
            .collect())
    }

    /// Checks if the installed add-on `id` is marked outdated.
    pub fn has_update(&self, kind: AddonKind, id: &str) -> Result<bool, AddonError> {
        Ok(self
            .find_by_id(TableKey::installed(kind), id)?
            .is_some_and(|r| r.version.starts_with(OUTDATED_MARKER)))
    }
}

/// Checks if `name` is one of the tables FTS5 creates behind a catalog table.
fn is_shadow_table(name: &str) -> bool {
    TableKey::ALL.iter().any(|key| {
        name.strip_prefix(key.table_name())
            .is_some_and(|suffix| FTS_SHADOW_SUFFIXES.contains(&suffix))
    })
}

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        COLUMNS.join(", ")
    )
}

fn record_params(record: &AddonRecord) -> [String; 9] {
    [
        record.name.clone(),
        record.category.clone(),
        record.version.clone(),
        record.author.clone(),
        record.latest_release.clone(),
        record.file.clone(),
        record.id.clone(),
        record.dependencies.join(","),
        record.startup_script.clone(),
    ]
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, AddonRecord)> {
    let dependencies: String = row.get(8)?;
    Ok((
        row.get(0)?,
        AddonRecord {
            name: row.get(1)?,
            category: row.get(2)?,
            version: row.get(3)?,
            author: row.get(4)?,
            latest_release: row.get(5)?,
            file: row.get(6)?,
            download_url: String::new(),
            id: row.get(7)?,
            dependencies: split_dependencies(&dependencies),
            startup_script: row.get(9)?,
        },
    ))
}

fn split_dependencies(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn remote(id: &str, name: &str, version: &str) -> AddonRecord {
        AddonRecord {
            id: id.to_string(),
            name: name.to_string(),
            category: "Unit Frames".to_string(),
            version: version.to_string(),
            author: "Garan".to_string(),
            latest_release: "2024-03-01".to_string(),
            file: format!("https://www.lotrointerface.com/downloads/download{id}-x"),
            ..AddonRecord::default()
        }
    }

    fn installed(id: &str, name: &str, version: &str) -> AddonRecord {
        AddonRecord {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            file: format!("/plugins/{name}.plugincompendium"),
            ..AddonRecord::default()
        }
    }

    #[test]
    fn test_reconcile_marks_outdated() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store
            .upsert_local_scan(AddonKind::Plugin, &[installed("42", "Thing", "1.0")])
            .unwrap();
        store
            .upsert_remote_feed(AddonKind::Plugin, &[remote("42", "Thing", "1.1")])
            .unwrap();

        assert_eq!(store.reconcile_versions().unwrap(), 1);

        let local = store
            .find_by_id(TableKey::installed(AddonKind::Plugin), "42")
            .unwrap()
            .unwrap();
        let online = store
            .find_by_id(TableKey::remote(AddonKind::Plugin), "42")
            .unwrap()
            .unwrap();
        assert_eq!(local.version, "(Outdated) 1.0");
        assert_eq!(online.version, "(Updated) 1.1");
        assert_eq!(online.name, "(Installed) Thing");

        // Second pass leaves the markers as they are
        store.reconcile_versions().unwrap();
        let local = store
            .find_by_id(TableKey::installed(AddonKind::Plugin), "42")
            .unwrap()
            .unwrap();
        assert_eq!(local.version, "(Outdated) 1.0");

        assert!(store.has_update(AddonKind::Plugin, "42").unwrap());
        assert_eq!(store.outdated(AddonKind::Plugin).unwrap().len(), 1);
    }

    #[test]
    fn test_reconcile_matching_versions_untouched() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store
            .upsert_local_scan(AddonKind::Skin, &[installed("7", "Dark", "2.0")])
            .unwrap();
        store
            .upsert_remote_feed(AddonKind::Skin, &[remote("7", "Dark", "2.0")])
            .unwrap();

        assert_eq!(store.reconcile_versions().unwrap(), 0);
        let local = store
            .find_by_id(TableKey::installed(AddonKind::Skin), "7")
            .unwrap()
            .unwrap();
        assert_eq!(local.version, "2.0");
    }

    #[test]
    fn test_reconcile_ignores_unknown_remote() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store
            .upsert_local_scan(AddonKind::Music, &[installed("9", "Songs", "1")])
            .unwrap();

        assert_eq!(store.reconcile_versions().unwrap(), 0);
        let local = store.rows(TableKey::installed(AddonKind::Music)).unwrap();
        assert_eq!(local[0].version, "1");
        assert_eq!(local[0].category, UNMANAGED_CATEGORY);
    }

    #[test]
    fn test_local_scan_takes_remote_category() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store
            .upsert_remote_feed(AddonKind::Plugin, &[remote("42", "Thing", "1.1")])
            .unwrap();
        store
            .upsert_local_scan(
                AddonKind::Plugin,
                &[
                    installed("42", "Thing", "1.1"),
                    AddonRecord::unmanaged("Loose", "/plugins/Loose.plugin"),
                ],
            )
            .unwrap();

        let rows = store.rows(TableKey::installed(AddonKind::Plugin)).unwrap();
        assert_eq!(rows[0].category, "Unit Frames");
        assert_eq!(rows[0].latest_release, "2024-03-01");
        assert_eq!(rows[1].category, UNMANAGED_CATEGORY);
    }

    #[test]
    fn test_remote_feed_backfills_installed_rows() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store
            .upsert_local_scan(AddonKind::Plugin, &[installed("42", "Thing", "1.0")])
            .unwrap();
        assert_eq!(
            store.rows(TableKey::installed(AddonKind::Plugin)).unwrap()[0].category,
            UNMANAGED_CATEGORY
        );

        store
            .upsert_remote_feed(AddonKind::Plugin, &[remote("42", "Thing", "1.0")])
            .unwrap();
        let local = &store.rows(TableKey::installed(AddonKind::Plugin)).unwrap()[0];
        assert_eq!(local.category, "Unit Frames");
        assert_eq!(local.latest_release, "2024-03-01");
    }

    #[test]
    fn test_dependency_targets_resolve_alias() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let mut thing = installed("42", "Thing", "1.0");
        thing.dependencies = vec!["0".to_string(), "55".to_string(), "77".to_string()];
        store
            .upsert_local_scan(
                AddonKind::Plugin,
                &[thing, installed("55", "Already", "1")],
            )
            .unwrap();
        store
            .upsert_remote_feed(
                AddonKind::Plugin,
                &[
                    remote("1064", "Turbine Utilities", "1.0"),
                    remote("55", "Already", "1"),
                ],
            )
            .unwrap();

        let targets = store.dependency_targets(AddonKind::Plugin, "42").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, "1064");
        assert_eq!(targets[0].name, "Turbine Utilities");

        assert!(store.dependency_targets(AddonKind::Plugin, "").unwrap().is_empty());
    }

    #[test]
    fn test_search_and_semantics() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let mut other = remote("2", "Bag Manager", "1");
        other.category = "Bags".to_string();
        other.author = "Someone".to_string();
        store
            .upsert_remote_feed(
                AddonKind::Plugin,
                &[remote("1", "Vital Target", "1"), other],
            )
            .unwrap();
        let key = TableKey::remote(AddonKind::Plugin);

        assert_eq!(store.search(key, "").unwrap().len(), 2);
        assert_eq!(store.search(key, "garan vital").unwrap().len(), 1);
        assert_eq!(store.search(key, "BAGS").unwrap()[0].id, "2");
        assert!(store.search(key, "garan bags").unwrap().is_empty());
        assert!(store.search(key, "100%").unwrap().is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let mut elan = remote("3", "Élan Meter", "1");
        elan.author = "Ørjan".to_string();
        store
            .upsert_remote_feed(
                AddonKind::Plugin,
                &[remote("1", "Vital Target", "1"), elan],
            )
            .unwrap();
        let key = TableKey::remote(AddonKind::Plugin);

        assert_eq!(store.search(key, "élan").unwrap()[0].id, "3");
        assert_eq!(store.search(key, "ÉLAN").unwrap().len(), 1);
        assert_eq!(store.search(key, "ørjan meter").unwrap().len(), 1);
        assert!(store.search(key, "élan garan").unwrap().is_empty());
    }

    #[test]
    fn test_dependents_alias_aware() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let mut a = installed("42", "Thing", "1");
        a.dependencies = vec!["0".to_string()];
        store
            .upsert_local_scan(AddonKind::Plugin, &[a, installed("1064", "Utils", "1")])
            .unwrap();

        let dependents = store.dependents(AddonKind::Plugin, "1064").unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].id, "42");
    }

    #[test]
    fn test_markers_cleared() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store
            .upsert_local_scan(AddonKind::Plugin, &[installed("42", "Thing", "1.0")])
            .unwrap();
        store
            .upsert_remote_feed(AddonKind::Plugin, &[remote("42", "Thing", "1.1")])
            .unwrap();
        store.reconcile_versions().unwrap();

        assert_eq!(store.clear_updated_markers(AddonKind::Plugin).unwrap(), 1);
        store
            .set_remote_installed(AddonKind::Plugin, "42", false)
            .unwrap();

        let online = store
            .find_by_id(TableKey::remote(AddonKind::Plugin), "42")
            .unwrap()
            .unwrap();
        assert_eq!(online.version, "1.1");
        assert_eq!(online.name, "Thing");
    }

    #[test]
    fn test_schema_rebuilt_on_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addons_cache.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE VIRTUAL TABLE plugins_installed USING fts5(Name, Version);
                 CREATE TABLE leftovers (x);",
            )
            .unwrap();
        }

        let mut store = CatalogStore::open(&path).unwrap();
        store
            .upsert_local_scan(AddonKind::Plugin, &[installed("1", "A", "1")])
            .unwrap();
        store.close().unwrap();

        // Reopening an up-to-date cache keeps its rows
        let store = CatalogStore::open(&path).unwrap();
        assert_eq!(
            store.rows(TableKey::installed(AddonKind::Plugin)).unwrap().len(),
            1
        );
        assert!(!store.user_tables().unwrap().contains(&"leftovers".to_string()));
    }

    #[test]
    fn test_foreign_table_with_shadow_suffix_triggers_rebuild() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addons_cache.sqlite");

        let mut store = CatalogStore::open(&path).unwrap();
        store
            .upsert_local_scan(AddonKind::Plugin, &[installed("1", "A", "1")])
            .unwrap();
        store.close().unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE leftover_data (x);").unwrap();
        }

        let store = CatalogStore::open(&path).unwrap();
        let tables = store.user_tables().unwrap();
        assert!(!tables.contains(&"leftover_data".to_string()));
        assert!(tables.contains(&"plugins_installed_data".to_string()));
        assert!(
            store
                .rows(TableKey::installed(AddonKind::Plugin))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_shadow_table_names() {
        assert!(is_shadow_table("plugins_installed_data"));
        assert!(is_shadow_table("music_remote_config"));
        assert!(!is_shadow_table("leftover_data"));
        assert!(!is_shadow_table("plugins_installed"));
        assert!(!is_shadow_table("plugins_installed_extra_idx"));
    }
}
