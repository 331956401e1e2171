//! Removal of stale output partitions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::workspace::OUTPUT_DIR;
use crate::util::fs::{
    is_strictly_inside, normalize_lexically, relative_slash_path, remove_dir_all_if_exists,
};
use crate::util::SynthError;

/// Remove every directory under `bin/` that no produced output path needs.
///
/// `produced` holds project-relative output paths such as
/// `bin/1/plugins/org.example_1.0.0`. A directory survives when it is an
/// ancestor of a produced path or lies at or below one. Returns the removed
/// directories.
pub fn prune_outputs(project_dir: &Path, produced: &[String]) -> Result<Vec<PathBuf>> {
    let output_dir = project_dir.join(OUTPUT_DIR);
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut stale = Vec::new();
    let mut walker = WalkDir::new(&output_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.with_context(|| format!("failed to walk {}", output_dir.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let rel = relative_slash_path(project_dir, entry.path());
        if produced.iter().any(|p| is_ancestor(&rel, p)) {
            continue;
        }

        if !produced.iter().any(|p| rel == *p || is_ancestor(p, &rel)) {
            stale.push(entry.path().to_path_buf());
        }
        walker.skip_current_dir();
    }

    let project_dir = normalize_lexically(project_dir);
    for dir in &stale {
        if !is_strictly_inside(dir, &project_dir) {
            return Err(SynthError::PathEscape {
                path: dir.clone(),
                project: project_dir,
            }
            .into());
        }
    }

    for dir in &stale {
        tracing::debug!("removing stale output {}", dir.display());
        remove_dir_all_if_exists(dir)?;
    }

    Ok(stale)
}

/// Whether `ancestor` is a strict path prefix of `path`.
fn is_ancestor(ancestor: &str, path: &str) -> bool {
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Fail if a produced output path would leave the project folder.
pub fn check_contained(project_dir: &Path, produced: &[String]) -> Result<(), SynthError> {
    for path in produced {
        let full = project_dir.join(path);
        if !is_strictly_inside(&full, project_dir) {
            return Err(SynthError::PathEscape {
                path: normalize_lexically(&full),
                project: project_dir.to_path_buf(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mkdirs(root: &Path, dirs: &[&str]) {
        for d in dirs {
            std::fs::create_dir_all(root.join(d)).unwrap();
        }
    }

    #[test]
    fn test_prune_keeps_produced_tree() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("projects/p");
        mkdirs(
            &project,
            &[
                "bin/0",
                "bin/1/plugins/b_1.0.0/org/x",
                "bin/1/plugins/b_0.9.0",
                "bin/2/plugins/b_1.0.0",
                "bin/3",
            ],
        );

        let produced = vec![
            "bin/0".to_string(),
            "bin/1/plugins/b_1.0.0".to_string(),
            "bin/2/plugins/b_1.0.0/os/linux".to_string(),
        ];
        let removed = prune_outputs(&project, &produced).unwrap();

        assert!(project.join("bin/1/plugins/b_1.0.0/org/x").is_dir());
        assert!(project.join("bin/2/plugins/b_1.0.0").is_dir());
        assert!(!project.join("bin/1/plugins/b_0.9.0").exists());
        assert!(!project.join("bin/3").exists());
        assert_eq!(removed.len(), 2);
    }

    #[test]
    fn test_prune_without_output_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(prune_outputs(tmp.path(), &["bin/0".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_escaping_output_path_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("projects/p");

        let err = check_contained(&project, &["bin/../../other".to_string()]).unwrap_err();
        assert!(matches!(err, SynthError::PathEscape { .. }));
        assert!(check_contained(&project, &["bin/1/plugins/b_1".to_string()]).is_ok());
    }
}
