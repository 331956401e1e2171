//! Plugin folder index - bundles deployed as expanded directories.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use crate::core::manifest::parse_manifest;
use crate::core::{Bundle, BundleSet};
use crate::sources::BundleIndex;
use crate::util::fs::relative_slash_path;

/// Location of the manifest inside a bundle.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// An index over a plugin folder of `<id>_<version>/` directories.
///
/// Packed `.jar` bundles are skipped: unpacking archives belongs to the
/// distribution packager.
pub struct PluginDirIndex {
    /// The plugin folder
    path: PathBuf,

    /// Selected bundles
    bundles: BundleSet,
}

impl PluginDirIndex {
    /// Scan a plugin folder.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            bail!("plugin folder does not exist: {}", path.display());
        }

        let mut entries: Vec<_> = std::fs::read_dir(path)
            .with_context(|| format!("failed to read plugin folder: {}", path.display()))?
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        let mut bundles = BundleSet::new();
        for entry in entries {
            let bundle_dir = entry.path();
            if !bundle_dir.is_dir() {
                tracing::debug!("skipping packed bundle {}", bundle_dir.display());
                continue;
            }
            match load_bundle_dir(&bundle_dir)? {
                Some(bundle) => bundles.insert(bundle),
                None => tracing::debug!("no manifest in {}", bundle_dir.display()),
            }
        }

        Ok(PluginDirIndex {
            path: path.to_path_buf(),
            bundles,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Load one expanded bundle directory. Returns `None` without a manifest.
pub fn load_bundle_dir(dir: &Path) -> Result<Option<Bundle>> {
    let manifest_path = dir.join(MANIFEST_PATH);
    if !manifest_path.is_file() {
        return Ok(None);
    }

    let text = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read manifest: {}", manifest_path.display()))?;
    let attrs = parse_manifest(&text);

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(relative_slash_path(dir, entry.path()));
        }
    }

    let bundle = Bundle::from_manifest(attrs, files);
    if bundle.is_none() {
        tracing::warn!("manifest without symbolic name: {}", manifest_path.display());
    }
    Ok(bundle)
}

impl BundleIndex for PluginDirIndex {
    fn ids(&self) -> Vec<String> {
        self.bundles.ids().map(str::to_string).collect()
    }

    fn get(&self, id: &str) -> Option<&Bundle> {
        self.bundles.get(id)
    }
}
