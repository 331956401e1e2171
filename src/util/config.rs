//! Configuration file support for srclink.
//!
//! Configuration comes from two layers:
//! - Built-in: `builtin_overrides.toml`, compiled into the binary. It holds
//!   the per-bundle corrections known to be needed for the distribution.
//! - Project: `srclink.toml` at the workspace root.
//!
//! Project config takes precedence over the built-in table. Per-bundle
//! corrections are data; the synthesizer never branches on bundle ids.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "srclink.toml";

const BUILTIN_OVERRIDES: &str = include_str!("builtin_overrides.toml");

/// Default project name prefix.
pub const DEFAULT_PREFIX: &str = "ide";

/// Default maximum edit distance for nearest-name source lookup.
pub const DEFAULT_FUZZY_DISTANCE: usize = 2;

/// Default depth of the bundle directory scan below `libraries/`.
pub const DEFAULT_SCAN_DEPTH: usize = 6;

/// srclink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace settings
    pub workspace: WorkspaceSettings,

    /// Explicit source roots per bundle id
    pub sources: BTreeMap<String, SourceOverride>,

    /// Per-bundle corrections
    pub bundles: BTreeMap<String, BundleOverride>,
}

/// Workspace-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Project name prefix (`<prefix>-<family>-<bundle>`)
    pub prefix: Option<String>,

    /// Plugin folder holding the deployed bundles
    pub plugins_dir: Option<PathBuf>,

    /// Maximum edit distance accepted by the nearest-name lookup
    pub fuzzy_distance: Option<usize>,

    /// How deep to look for bundle directories below `libraries/`
    pub scan_depth: Option<usize>,
}

/// Explicit source roots for one bundle, relative to `libraries/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverride {
    pub roots: Vec<String>,
}

/// Corrections applied to one bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleOverride {
    /// Globs (relative to a source root) never treated as bundle content
    pub exclude: Vec<String>,

    /// Dependencies the manifests do not declare
    pub extra_dependencies: Vec<String>,

    /// Declared dependencies to drop
    pub removed_dependencies: Vec<String>,

    /// Target paths to add to the bundle's file set
    pub extra_files: Vec<String>,

    /// Target paths to drop from the bundle's file set
    pub removed_files: Vec<String>,
}

impl BundleOverride {
    /// Union another override into this one.
    pub fn merge(&mut self, other: BundleOverride) {
        extend_unique(&mut self.exclude, other.exclude);
        extend_unique(&mut self.extra_dependencies, other.extra_dependencies);
        extend_unique(&mut self.removed_dependencies, other.removed_dependencies);
        extend_unique(&mut self.extra_files, other.extra_files);
        extend_unique(&mut self.removed_files, other.removed_files);
    }
}

fn extend_unique(into: &mut Vec<String>, from: Vec<String>) {
    for item in from {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

impl WorkspaceSettings {
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    pub fn fuzzy_distance(&self) -> usize {
        self.fuzzy_distance.unwrap_or(DEFAULT_FUZZY_DISTANCE)
    }

    pub fn scan_depth(&self) -> usize {
        self.scan_depth.unwrap_or(DEFAULT_SCAN_DEPTH)
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// The built-in override table.
    pub fn builtin() -> Result<Self> {
        toml::from_str(BUILTIN_OVERRIDES).context("failed to parse built-in overrides")
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Explicit source roots are replaced per bundle; bundle corrections are
    /// unioned.
    pub fn merge(&mut self, other: Config) {
        if other.workspace.prefix.is_some() {
            self.workspace.prefix = other.workspace.prefix;
        }
        if other.workspace.plugins_dir.is_some() {
            self.workspace.plugins_dir = other.workspace.plugins_dir;
        }
        if other.workspace.fuzzy_distance.is_some() {
            self.workspace.fuzzy_distance = other.workspace.fuzzy_distance;
        }
        if other.workspace.scan_depth.is_some() {
            self.workspace.scan_depth = other.workspace.scan_depth;
        }

        self.sources.extend(other.sources);

        for (id, correction) in other.bundles {
            self.bundles.entry(id).or_default().merge(correction);
        }
    }

    /// Corrections for a bundle (empty when none are configured).
    pub fn bundle(&self, id: &str) -> BundleOverride {
        self.bundles.get(id).cloned().unwrap_or_default()
    }

    /// Explicit source roots for a bundle, if configured.
    pub fn source_roots(&self, id: &str) -> Option<&[String]> {
        self.sources.get(id).map(|s| s.roots.as_slice())
    }
}

/// Load the built-in table merged with the project's `srclink.toml`.
pub fn load_config(workspace_root: &Path) -> Result<Config> {
    let mut config = Config::builtin()?;

    let project_path = workspace_root.join(CONFIG_FILE);
    if project_path.exists() {
        config.merge(Config::load(&project_path)?);
    } else {
        tracing::debug!("no {} in {}", CONFIG_FILE, workspace_root.display());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.workspace.prefix(), "ide");
        assert_eq!(config.workspace.fuzzy_distance(), 2);
        assert!(config.bundle("anything").exclude.is_empty());
    }

    #[test]
    fn test_builtin_overrides_parse() {
        let config = Config::builtin().unwrap();
        assert!(!config.bundles.is_empty());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[workspace]
prefix = "ws"
plugins_dir = "/opt/ide/plugins"

[sources."org.example.core"]
roots = ["example/bundles/org.example.core"]

[bundles."org.example.core"]
exclude = ["**/*.orig"]
removed_dependencies = ["org.legacy"]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.workspace.prefix(), "ws");
        assert_eq!(
            config.workspace.plugins_dir,
            Some(PathBuf::from("/opt/ide/plugins"))
        );
        assert_eq!(
            config.source_roots("org.example.core"),
            Some(&["example/bundles/org.example.core".to_string()][..])
        );
        assert_eq!(config.bundle("org.example.core").exclude, vec!["**/*.orig"]);
    }

    #[test]
    fn test_config_merge_unions_corrections() {
        let mut base = Config::default();
        base.bundles.insert(
            "a".into(),
            BundleOverride {
                exclude: vec!["x/**".into()],
                ..Default::default()
            },
        );

        let mut other = Config::default();
        other.bundles.insert(
            "a".into(),
            BundleOverride {
                exclude: vec!["x/**".into(), "y/**".into()],
                extra_dependencies: vec!["b".into()],
                ..Default::default()
            },
        );

        base.merge(other);
        let merged = base.bundle("a");
        assert_eq!(merged.exclude, vec!["x/**", "y/**"]);
        assert_eq!(merged.extra_dependencies, vec!["b"]);
    }

    #[test]
    fn test_invalid_project_config_is_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "[workspace\nprefix=").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }
}
