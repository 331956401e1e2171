//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write bytes to a file only if they differ from its current contents.
///
/// Creates parent directories if needed. An unchanged file keeps its
/// modification time. Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == contents {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(true)
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Relative path from `base` to `path` using `/` separators.
pub fn relative_slash_path(base: &Path, path: &Path) -> String {
    to_slash(&relative_path(base, path))
}

/// Render a relative path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lexically normalize a path, resolving `.` and `..` without touching disk.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check if `path` is strictly inside `parent`, after lexical normalization.
pub fn is_strictly_inside(path: &Path, parent: &Path) -> bool {
    let path = normalize_lexically(path);
    let parent = normalize_lexically(parent);
    path != parent && path.starts_with(&parent)
}

/// List every file below `dir` as sorted `/`-separated relative paths.
///
/// Hidden directories (`.git`, `.settings`, ...) are skipped. A missing
/// directory yields an empty list.
pub fn list_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_hidden(e.file_name())));

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(relative_slash_path(dir, entry.path()));
        }
    }

    files.sort();
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_if_changed_keeps_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/file.txt");

        assert!(write_if_changed(&path, b"one").unwrap());
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        assert!(!write_if_changed(&path, b"one").unwrap());
        let after = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(before, after);

        assert!(write_if_changed(&path, b"two").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn test_list_files_skips_hidden_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/org")).unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join("src/org/A.java"), "").unwrap();
        fs::write(tmp.path().join("plugin.xml"), "").unwrap();
        fs::write(tmp.path().join(".git/HEAD"), "").unwrap();

        let files = list_files(tmp.path()).unwrap();
        assert_eq!(files, vec!["plugin.xml", "src/org/A.java"]);
        assert!(list_files(&tmp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_is_strictly_inside() {
        let project = Path::new("/ws/projects/p");
        assert!(is_strictly_inside(Path::new("/ws/projects/p/bin/1"), project));
        assert!(!is_strictly_inside(project, project));
        assert!(!is_strictly_inside(
            Path::new("/ws/projects/p/bin/../../q"),
            project
        ));
    }
}
