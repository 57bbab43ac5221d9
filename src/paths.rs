//! Case-insensitive path lookup.
//!
//! Add-on metadata is written on Windows, where `Author\Plugin.plugin` and
//! `author\plugin.plugin` name the same file. On case-sensitive filesystems
//! each component is matched against the directory listing instead.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolves `relative` below `base`, matching each component
/// case-insensitively when no exact match exists.
///
/// When several entries differ only in case, the lexicographically first one
/// is used. Components that cannot be matched are appended unchanged, so the
/// result may not exist.
pub fn resolve_case_insensitive(base: &Path, relative: &Path) -> PathBuf {
    let mut resolved = base.to_path_buf();
    let mut matching = true;

    for component in relative.components() {
        let Component::Normal(name) = component else {
            continue;
        };

        let exact = resolved.join(name);
        if !matching || exact.exists() {
            resolved = exact;
            continue;
        }

        match find_case_variant(&resolved, &name.to_string_lossy()) {
            Some(found) => resolved = found,
            None => {
                matching = false;
                resolved = exact;
            }
        }
    }

    resolved
}

fn find_case_variant(dir: &Path, name: &str) -> Option<PathBuf> {
    let wanted = name.to_lowercase();
    let mut variants: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
        .map(|entry| entry.path())
        .collect();
    variants.sort();
    variants.into_iter().next()
}

/// Converts a Windows-style relative path to the native form.
///
/// Returns `None` for paths that could leave the folder they are relative
/// to: rooted paths, drive prefixes and `..` components. `.` components are
/// dropped.
pub fn from_windows_relative(path: &str) -> Option<PathBuf> {
    if path.starts_with(['\\', '/']) {
        return None;
    }
    let mut out = PathBuf::new();
    for part in path.split(['\\', '/']).filter(|p| !p.is_empty() && *p != ".") {
        if part == ".." || part.contains(':') {
            return None;
        }
        out.push(part);
    }
    let contained = out
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    (contained && !out.as_os_str().is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exact_match() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Garan/VitalTarget")).unwrap();

        let resolved = resolve_case_insensitive(tmp.path(), Path::new("Garan/VitalTarget"));
        assert_eq!(resolved, tmp.path().join("Garan/VitalTarget"));
    }

    #[test]
    fn test_case_variant_match() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Garan/VitalTarget")).unwrap();

        let resolved = resolve_case_insensitive(tmp.path(), Path::new("garan/vitaltarget"));
        assert_eq!(resolved, tmp.path().join("Garan/VitalTarget"));
    }

    #[test]
    fn test_multiple_variants_pick_first() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("author")).unwrap();
        fs::create_dir_all(tmp.path().join("Author")).unwrap();

        let resolved = resolve_case_insensitive(tmp.path(), Path::new("AUTHOR"));
        assert_eq!(resolved, tmp.path().join("Author"));
    }

    #[test]
    fn test_missing_component_kept() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Garan")).unwrap();

        let resolved = resolve_case_insensitive(tmp.path(), Path::new("garan/Missing/x.plugin"));
        assert_eq!(resolved, tmp.path().join("Garan/Missing/x.plugin"));
        assert!(!resolved.exists());
    }

    #[test]
    fn test_from_windows_relative() {
        assert_eq!(
            from_windows_relative("Garan\\VitalTarget.plugin"),
            Some(PathBuf::from("Garan").join("VitalTarget.plugin"))
        );
        assert_eq!(
            from_windows_relative("Garan\\.\\run.py"),
            Some(PathBuf::from("Garan").join("run.py"))
        );
    }

    #[test]
    fn test_from_windows_relative_rejects_escapes() {
        assert_eq!(from_windows_relative("Evil\\..\\..\\tmp\\payload.py"), None);
        assert_eq!(from_windows_relative("../payload.py"), None);
        assert_eq!(from_windows_relative("\\tmp\\payload.py"), None);
        assert_eq!(from_windows_relative("/tmp/payload.py"), None);
        assert_eq!(from_windows_relative("C:\\Windows\\payload.py"), None);
        assert_eq!(from_windows_relative(""), None);
    }
}
