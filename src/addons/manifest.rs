//! Compendium manifest codec.
//!
//! Reads and writes the `*.{kind}compendium` sidecar files that describe a
//! managed add-on, and reads the `.plugin` descriptor files shipped by
//! plugin authors.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use super::types::{AddonError, AddonKind, AddonRecord};
use super::xml::{XmlElement, parse_document};

/// Root tag of the metadata section in `.plugin` files.
pub const PLUGIN_INFO_TAG: &str = "Information";

/// Root tag of `.plugin` files.
pub const PLUGIN_TAG: &str = "Plugin";

/// Reads `path` and returns the element named `root_tag`.
fn load_element(path: &Path, root_tag: &str) -> Result<XmlElement, AddonError> {
    let content = fs::read_to_string(path)?;
    let doc = parse_document(&content).map_err(|reason| malformed(path, reason))?;
    doc.find(root_tag)
        .cloned()
        .ok_or_else(|| malformed(path, format!("missing <{root_tag}> element")))
}

fn malformed(path: &Path, reason: impl Into<String>) -> AddonError {
    AddonError::MalformedManifest {
        source_name: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Parses a manifest or `.plugin` file into a partial record.
///
/// Reads `Id`, `Name`, `Version`, `Author`, `DownloadUrl`, `Dependencies`
/// and `StartupScript`. `InfoUrl` is derived from `DownloadUrl` so it is
/// not kept. `file` is set to `path`.
pub fn parse_manifest(path: &Path, root_tag: &str) -> Result<AddonRecord, AddonError> {
    let root = load_element(path, root_tag)?;

    let mut record = AddonRecord {
        file: path.display().to_string(),
        ..AddonRecord::default()
    };
    for node in &root.children {
        let text = node.text.trim();
        match node.name.as_str() {
            "Id" => record.id = text.to_string(),
            "Name" => record.name = text.to_string(),
            "Version" => record.version = text.to_string(),
            "Author" => record.author = text.to_string(),
            "DownloadUrl" => record.download_url = text.to_string(),
            "StartupScript" => record.startup_script = text.to_string(),
            "Dependencies" => {
                record.dependencies = node
                    .children
                    .iter()
                    .filter(|d| d.name == "dependency")
                    .map(|d| d.text.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .collect();
            }
            _ => {}
        }
    }
    Ok(record)
}

/// Reads the descriptor paths of a plugin manifest.
///
/// Paths are relative to the plugins folder, with `\` turned into `/`.
pub fn parse_descriptors(path: &Path) -> Result<Vec<String>, AddonError> {
    let root = load_element(path, AddonKind::Plugin.root_tag())?;
    Ok(root
        .child("Descriptors")
        .map(|descriptors| {
            descriptors
                .children
                .iter()
                .filter(|d| d.name == "descriptor")
                .map(|d| d.text.trim().replace('\\', "/"))
                .filter(|d| !d.is_empty())
                .collect()
        })
        .unwrap_or_default())
}

/// Returns the package folder of a `.plugin` file, relative to the plugins
/// folder.
///
/// `Author.Plugin.Main` maps to `Author/Plugin`.
pub fn plugin_package_folder(plugin_file: &Path) -> Result<Option<PathBuf>, AddonError> {
    let root = load_element(plugin_file, PLUGIN_TAG)?;
    let Some(package) = root.child_text("Package") else {
        return Ok(None);
    };
    let parts: Vec<&str> = package.split('.').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(parts.iter().take(2).collect()))
}

/// Derives the info page URL from a download URL.
#[must_use]
pub fn info_url(download_url: &str) -> String {
    download_url.replace("/downloads/download", "/downloads/info")
}

/// Returns the single manifest directly inside `dir`, if any.
///
/// More than one manifest makes the add-on ambiguous and is an error.
pub fn get_existing_manifest(dir: &Path) -> Result<Option<PathBuf>, AddonError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_manifest = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.ends_with("compendium"));
        if is_manifest && path.is_file() {
            found.push(path);
        }
    }

    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(AddonError::MultipleManifestsFound {
            dir: dir.to_path_buf(),
        }),
    }
}

/// Writes a manifest for `record` into `target_dir`.
///
/// Descriptors are only written for plugins. Returns the path of
/// `{Name}.{kind}compendium`; a record without a name falls back to its id,
/// then to the name of `target_dir`.
pub fn write_manifest(
    target_dir: &Path,
    kind: AddonKind,
    record: &AddonRecord,
    descriptors: &[String],
) -> Result<PathBuf, AddonError> {
    let path = target_dir.join(format!(
        "{}.{}",
        manifest_stem(target_dir, record),
        kind.manifest_extension()
    ));
    let xml = render_manifest(kind, record, descriptors).map_err(|e| malformed(&path, e))?;
    fs::write(&path, xml)?;
    debug!("[ADDON-MANIFEST] Wrote {}", path.display());
    Ok(path)
}

fn manifest_stem(target_dir: &Path, record: &AddonRecord) -> String {
    [record.display_name().trim(), record.id.trim()]
        .into_iter()
        .find(|stem| !stem.is_empty())
        .map(str::to_string)
        .or_else(|| {
            target_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "addon".to_string())
}

fn render_manifest(
    kind: AddonKind,
    record: &AddonRecord,
    descriptors: &[String],
) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    let root = kind.root_tag();

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write(&mut writer, Event::Start(BytesStart::new(root)))?;

    let download_url = record.download_url.as_str();
    let info = info_url(download_url);
    for (tag, value) in [
        ("Id", record.id.as_str()),
        ("Name", record.display_name()),
        ("Version", record.plain_version()),
        ("Author", record.author.as_str()),
        ("InfoUrl", info.as_str()),
        ("DownloadUrl", download_url),
    ] {
        write_text_element(&mut writer, tag, value)?;
    }

    if kind == AddonKind::Plugin {
        write_list(&mut writer, "Descriptors", "descriptor", descriptors)?;
    }
    write_list(&mut writer, "Dependencies", "dependency", &record.dependencies)?;
    write_text_element(&mut writer, "StartupScript", &record.startup_script)?;

    write(&mut writer, Event::End(BytesEnd::new(root)))?;

    let mut xml = writer.into_inner();
    xml.push(b'\n');
    Ok(xml)
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), String> {
    writer.write_event(event).map_err(|e| e.to_string())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return write(writer, Event::Empty(BytesStart::new(tag)));
    }
    write(writer, Event::Start(BytesStart::new(tag)))?;
    write(writer, Event::Text(BytesText::new(value)))?;
    write(writer, Event::End(BytesEnd::new(tag)))
}

fn write_list(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    item_tag: &str,
    items: &[String],
) -> Result<(), String> {
    if items.is_empty() {
        return write(writer, Event::Empty(BytesStart::new(tag)));
    }
    write(writer, Event::Start(BytesStart::new(tag)))?;
    for item in items {
        write_text_element(writer, item_tag, item)?;
    }
    write(writer, Event::End(BytesEnd::new(tag)))
}
