//! Source root catalog.
//!
//! Maps a bundle id to the directories under `libraries/` that plausibly
//! hold its source. An explicit `[sources]` entry in the configuration wins;
//! otherwise the catalog looks for bundle directories (those containing a
//! manifest) whose bundle name is nearest to the id.
//!
//! All roots are workspace-relative `/` paths such as
//! `libraries/platform/bundles/org.example.core`.

pub mod distance;

pub use distance::DistanceCache;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::manifest::{parse_manifest, symbolic_name};
use crate::core::workspace::{Workspace, LIBRARIES_DIR};
use crate::sources::plugins::MANIFEST_PATH;
use crate::util::fs::{list_files, relative_slash_path};

/// Directories never searched for bundle sources.
const SKIPPED_DIRS: &[&str] = &["bin", "target", "node_modules", "build"];

/// Where a catalog entry's roots came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootOrigin {
    /// Configured in `[sources]`
    Explicit,
    /// Found by bundle name, with the edit distance of the match
    NearestName(usize),
    /// Nothing found
    None,
}

/// Candidate source roots for one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub bundle: String,
    /// Existing roots, in preference order
    pub roots: Vec<String>,
    pub origin: RootOrigin,
    /// Configured roots that do not exist on disk
    pub missing: Vec<String>,
}

impl CatalogEntry {
    /// Repository family of the first root (`libraries/<family>/...`).
    pub fn family(&self) -> Option<&str> {
        self.roots.first().and_then(|r| family_of(r))
    }
}

/// The repository directory a root belongs to.
pub fn family_of(root: &str) -> Option<&str> {
    let mut parts = root.split('/');
    match (parts.next(), parts.next()) {
        (Some(LIBRARIES_DIR), Some(family)) if !family.is_empty() => Some(family),
        _ => None,
    }
}

/// Catalog of bundle source directories for one run.
#[derive(Debug)]
pub struct SourceRootCatalog {
    /// Workspace root
    root: PathBuf,

    /// Explicit roots per bundle id
    explicit: BTreeMap<String, Vec<String>>,

    /// Bundle source directories keyed by bundle name
    bundle_dirs: BTreeMap<String, Vec<String>>,

    /// Largest accepted nearest-name distance
    max_distance: usize,

    /// Memoized name distances
    distances: DistanceCache,

    /// Cached file listings per root
    listings: HashMap<String, Vec<String>>,

    /// Every entry handed out, for the unused-root report
    handed_out: BTreeMap<String, CatalogEntry>,
}

impl SourceRootCatalog {
    /// Scan `libraries/` for bundle directories.
    pub fn scan(ws: &Workspace) -> Result<Self> {
        let settings = &ws.config().workspace;
        let libraries = ws.libraries_dir();
        let mut bundle_dirs: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if libraries.is_dir() {
            let walker = WalkDir::new(&libraries)
                .min_depth(1)
                .max_depth(settings.scan_depth())
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    let name = e.file_name().to_string_lossy();
                    !(e.file_type().is_dir()
                        && (name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())))
                });

            for entry in walker {
                let entry = entry
                    .with_context(|| format!("failed to scan {}", libraries.display()))?;
                if !entry.file_type().is_dir() {
                    continue;
                }
                let manifest = entry.path().join(MANIFEST_PATH);
                if !manifest.is_file() {
                    continue;
                }

                let dir_name = entry.file_name().to_string_lossy().into_owned();
                let name = std::fs::read_to_string(&manifest)
                    .ok()
                    .and_then(|text| symbolic_name(&parse_manifest(&text)))
                    .unwrap_or(dir_name);
                let rel = relative_slash_path(ws.root(), entry.path());
                bundle_dirs.entry(name).or_default().push(rel);
            }
        } else {
            tracing::warn!("no libraries folder at {}", libraries.display());
        }

        let config = ws.config();
        let explicit = config
            .sources
            .keys()
            .filter_map(|id| {
                let roots = config
                    .source_roots(id)?
                    .iter()
                    .map(|r| format!("{}/{}", LIBRARIES_DIR, r.trim_matches('/')))
                    .collect();
                Some((id.clone(), roots))
            })
            .collect();

        tracing::info!(
            "Catalogued {} bundle source directories",
            bundle_dirs.values().map(Vec::len).sum::<usize>()
        );

        Ok(SourceRootCatalog {
            root: ws.root().to_path_buf(),
            explicit,
            bundle_dirs,
            max_distance: settings.fuzzy_distance(),
            distances: DistanceCache::new(),
            listings: HashMap::new(),
            handed_out: BTreeMap::new(),
        })
    }

    /// Look up the source roots of a bundle.
    pub fn lookup(&mut self, bundle: &str) -> CatalogEntry {
        let entry = match self.explicit.get(bundle) {
            Some(configured) => {
                let (roots, missing): (Vec<String>, Vec<String>) = configured
                    .iter()
                    .cloned()
                    .partition(|r| self.resolve(r).is_dir());
                CatalogEntry {
                    bundle: bundle.to_string(),
                    roots,
                    origin: RootOrigin::Explicit,
                    missing,
                }
            }
            None => self.nearest(bundle),
        };

        tracing::debug!("{}: roots {:?} ({:?})", bundle, entry.roots, entry.origin);
        self.handed_out.insert(bundle.to_string(), entry.clone());
        entry
    }

    fn nearest(&mut self, bundle: &str) -> CatalogEntry {
        let mut best: Option<usize> = None;
        let mut roots = Vec::new();

        // Short ids would match almost anything at a fixed distance.
        let limit = self.max_distance.min(bundle.len() / 4);

        for (name, dirs) in &self.bundle_dirs {
            let d = self.distances.distance(bundle, name);
            if d > limit {
                continue;
            }
            match best {
                Some(b) if d > b => continue,
                Some(b) if d == b => roots.extend(dirs.iter().cloned()),
                _ => {
                    best = Some(d);
                    roots = dirs.clone();
                }
            }
        }

        roots.sort();
        roots.dedup();
        CatalogEntry {
            bundle: bundle.to_string(),
            roots,
            origin: best.map_or(RootOrigin::None, RootOrigin::NearestName),
            missing: Vec::new(),
        }
    }

    fn resolve(&self, root: &str) -> PathBuf {
        root.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |p, s| p.join(s))
    }

    /// Files below a root, relative to it and sorted.
    pub fn files(&mut self, root: &str) -> Result<&[String]> {
        if !self.listings.contains_key(root) {
            let files = list_files(&self.resolve(root))?;
            self.listings.insert(root.to_string(), files);
        }
        Ok(self.listings.get(root).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Entries handed out so far, by bundle id.
    pub fn entries(&self) -> &BTreeMap<String, CatalogEntry> {
        &self.handed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::{Config, SourceOverride};
    use tempfile::TempDir;

    fn bundle_dir(root: &std::path::Path, rel: &str, symbolic_name: Option<&str>) {
        let dir = root.join(rel);
        std::fs::create_dir_all(dir.join("META-INF")).unwrap();
        let manifest = match symbolic_name {
            Some(name) => format!("Bundle-SymbolicName: {}\n", name),
            None => "Manifest-Version: 1.0\n".to_string(),
        };
        std::fs::write(dir.join(MANIFEST_PATH), manifest).unwrap();
    }

    fn workspace(tmp: &TempDir, config: Config) -> Workspace {
        Workspace::new(tmp.path().to_path_buf(), config)
    }

    #[test]
    fn test_lookup_by_symbolic_name_and_dir_name() {
        let tmp = TempDir::new().unwrap();
        bundle_dir(tmp.path(), "libraries/plat/bundles/core", Some("org.example.core"));
        bundle_dir(tmp.path(), "libraries/plat/bundles/org.example.ui", None);

        let mut catalog = SourceRootCatalog::scan(&workspace(&tmp, Config::default())).unwrap();

        let core = catalog.lookup("org.example.core");
        assert_eq!(core.roots, vec!["libraries/plat/bundles/core"]);
        assert_eq!(core.origin, RootOrigin::NearestName(0));
        assert_eq!(core.family(), Some("plat"));

        let ui = catalog.lookup("org.example.ui");
        assert_eq!(ui.roots, vec!["libraries/plat/bundles/org.example.ui"]);
    }

    #[test]
    fn test_nearest_name_fallback() {
        let tmp = TempDir::new().unwrap();
        bundle_dir(tmp.path(), "libraries/r/org.example.tools", None);

        let mut catalog = SourceRootCatalog::scan(&workspace(&tmp, Config::default())).unwrap();

        let near = catalog.lookup("org.example.tool");
        assert_eq!(near.origin, RootOrigin::NearestName(1));
        assert_eq!(near.roots, vec!["libraries/r/org.example.tools"]);

        let far = catalog.lookup("com.other.thing");
        assert_eq!(far.origin, RootOrigin::None);
        assert!(far.roots.is_empty());
    }

    #[test]
    fn test_explicit_override_wins() {
        let tmp = TempDir::new().unwrap();
        bundle_dir(tmp.path(), "libraries/r/org.example.core", None);
        std::fs::create_dir_all(tmp.path().join("libraries/other/src-core")).unwrap();

        let mut config = Config::default();
        config.sources.insert(
            "org.example.core".into(),
            SourceOverride {
                roots: vec!["other/src-core".into(), "other/gone".into()],
            },
        );

        let mut catalog = SourceRootCatalog::scan(&workspace(&tmp, config)).unwrap();
        let entry = catalog.lookup("org.example.core");

        assert_eq!(entry.origin, RootOrigin::Explicit);
        assert_eq!(entry.roots, vec!["libraries/other/src-core"]);
        assert_eq!(entry.missing, vec!["libraries/other/gone"]);
        assert!(catalog.entries().contains_key("org.example.core"));
    }

    #[test]
    fn test_files_listing_is_relative() {
        let tmp = TempDir::new().unwrap();
        bundle_dir(tmp.path(), "libraries/r/b", Some("b.bundle"));
        std::fs::create_dir_all(tmp.path().join("libraries/r/b/src/b")).unwrap();
        std::fs::write(tmp.path().join("libraries/r/b/src/b/B.java"), "").unwrap();

        let mut catalog = SourceRootCatalog::scan(&workspace(&tmp, Config::default())).unwrap();
        let files = catalog.files("libraries/r/b").unwrap().to_vec();
        assert_eq!(files, vec!["META-INF/MANIFEST.MF", "src/b/B.java"]);
    }

    #[test]
    fn test_family_of() {
        assert_eq!(family_of("libraries/jdt/core"), Some("jdt"));
        assert_eq!(family_of("projects/x/src"), None);
    }
}
