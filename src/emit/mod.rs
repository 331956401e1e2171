//! Project descriptor emission.
//!
//! A bundle's mappings become one `src` classpath entry each. Entries
//! compile into `bin/<partition>/plugins/<id>_<version>/<output>`; each
//! distinct output path gets its own partition, numbered from 1 in the
//! order the sorted mappings first use it. `bin/0` is the default output.

pub mod prune;
pub mod xml;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::workspace::{
    Workspace, CLASSPATH_FILE, LIBRARIES_DIR, MANUAL_OVERRIDE_FILE, OUTPUT_DIR, PROJECTS_DIR,
    PROJECT_FILE,
};
use crate::core::Bundle;
use crate::graph::DependencyGraph;
use crate::reconcile::{Filters, MappingKey, Reconciliation};
use crate::util::config::BundleOverride;
use crate::util::fs::write_if_changed;
use crate::util::Diagnostic;

/// Default output folder of every generated project.
pub const DEFAULT_OUTPUT: &str = "bin/0";

/// Linked folders are resolved against the workspace root, two levels up.
const LINK_BASE: &str = "PARENT-2-PROJECT_LOC";

/// A linked source folder in `.project`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedFolder {
    pub name: String,
    pub location: String,
}

/// A `src` classpath entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Folder inside the project (a link name or a local path)
    pub path: String,
    pub output: String,
    pub including: Vec<String>,
    pub excluding: Vec<String>,
}

/// A dependency on another generated project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectDependency {
    pub project: String,
    pub exported: bool,
}

/// Everything written for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub name: String,
    pub links: Vec<LinkedFolder>,
    pub sources: Vec<SourceEntry>,
    /// Target files without source, emitted commented out
    pub missing: Vec<String>,
    pub dependencies: Vec<ProjectDependency>,
}

impl ProjectDescriptor {
    /// Project-relative output folders this descriptor compiles into.
    pub fn output_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.sources.iter().map(|s| s.output.clone()).collect();
        paths.push(DEFAULT_OUTPUT.to_string());
        paths.sort();
        paths.dedup();
        paths
    }
}

/// Result of writing one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emitted {
    /// Descriptor files whose bytes changed
    pub written: Vec<PathBuf>,
    /// Removed stale output folders
    pub pruned: Vec<PathBuf>,
}

/// Writes project descriptors into the workspace.
#[derive(Debug)]
pub struct ProjectFileEmitter<'a> {
    ws: &'a Workspace,
}

impl<'a> ProjectFileEmitter<'a> {
    pub fn new(ws: &'a Workspace) -> Self {
        ProjectFileEmitter { ws }
    }

    /// Build the descriptor of one bundle's project.
    pub fn describe(
        &self,
        bundle: &Bundle,
        project: &str,
        reconciliation: &Reconciliation,
        filters: &BTreeMap<MappingKey, Filters>,
        dependencies: Vec<ProjectDependency>,
    ) -> ProjectDescriptor {
        let local_prefix = format!("{}/{}", PROJECTS_DIR, project);
        let deployed = format!("plugins/{}", bundle.deployed_name());

        let mut partitions: BTreeMap<String, usize> = BTreeMap::new();
        let mut link_uses: BTreeMap<String, usize> = BTreeMap::new();
        let mut links = Vec::new();
        let mut sources = Vec::new();

        for (key, _) in reconciliation.real() {
            let output_path = if key.output.is_empty() {
                deployed.clone()
            } else {
                format!("{}/{}", deployed, key.output)
            };
            let next = partitions.len() + 1;
            let partition = *partitions.entry(output_path.clone()).or_insert(next);

            let local = local_path(&key.root, &local_prefix);
            let base = match local {
                Some(rel) if !rel.is_empty() => rel.to_string(),
                Some(_) => ".".to_string(),
                None => link_name(&key.root),
            };
            let uses = link_uses.entry(base.clone()).or_insert(0);
            *uses += 1;

            // A folder may be listed once; later mappings of the same root
            // get their own link.
            let path = match (local, *uses) {
                (Some(_), 1) => base,
                (None, 1) => {
                    links.push(LinkedFolder {
                        name: base.clone(),
                        location: format!("{}/{}", LINK_BASE, key.root),
                    });
                    base
                }
                (_, n) => {
                    let name = format!("{}_{}", base.replace(['/', '.'], "_"), n);
                    links.push(LinkedFolder {
                        name: name.clone(),
                        location: format!("{}/{}", LINK_BASE, key.root),
                    });
                    name
                }
            };

            let filter = filters.get(key).cloned().unwrap_or_default();
            sources.push(SourceEntry {
                path,
                output: format!("{}/{}/{}", OUTPUT_DIR, partition, output_path),
                including: filter.including,
                excluding: filter.excluding,
            });
        }

        links.sort_by(|a, b| a.name.cmp(&b.name));

        ProjectDescriptor {
            name: project.to_string(),
            links,
            sources,
            missing: reconciliation
                .missing()
                .map(|m| m.iter().cloned().collect())
                .unwrap_or_default(),
            dependencies,
        }
    }

    /// Write the descriptors and prune stale outputs.
    pub fn emit(&self, descriptor: &ProjectDescriptor) -> Result<Emitted> {
        let dir = self.ws.project_dir(&descriptor.name);
        let outputs = descriptor.output_paths();
        prune::check_contained(&dir, &outputs)?;

        let mut emitted = Emitted::default();
        for (file, contents) in [
            (PROJECT_FILE, xml::render_project(descriptor)?),
            (CLASSPATH_FILE, xml::render_classpath(descriptor)?),
        ] {
            let path = dir.join(file);
            if write_if_changed(&path, contents.as_bytes())? {
                tracing::debug!("wrote {}", path.display());
                emitted.written.push(path);
            }
        }

        emitted.pruned = prune::prune_outputs(&dir, &outputs)?;
        Ok(emitted)
    }
}

/// Path of `root` inside the project folder, if it is local.
fn local_path<'r>(root: &'r str, project_prefix: &str) -> Option<&'r str> {
    let rest = root.strip_prefix(project_prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

/// Link name of an external root: `libraries/r/b/src` -> `r_b_src`.
pub fn link_name(root: &str) -> String {
    let trimmed = root
        .strip_prefix(LIBRARIES_DIR)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap_or(root);
    trimmed.replace('/', "_")
}

/// Project dependencies of a bundle.
///
/// Starts from the merged dependency relation, applies the bundle's
/// corrections and keeps the dependencies that have a project. The rest are
/// reported.
pub fn resolve_dependencies(
    bundle: &str,
    graph: &DependencyGraph,
    correction: &BundleOverride,
    projects: &BTreeMap<String, String>,
) -> (Vec<ProjectDependency>, Vec<Diagnostic>) {
    let mut wanted: BTreeSet<&str> = graph
        .merged_dependencies(bundle)
        .iter()
        .map(String::as_str)
        .collect();
    wanted.extend(correction.extra_dependencies.iter().map(String::as_str));
    for removed in &correction.removed_dependencies {
        wanted.remove(removed.as_str());
    }
    wanted.remove(bundle);

    let mut dependencies = Vec::new();
    let mut diagnostics = Vec::new();

    for dep in wanted {
        match projects.get(dep) {
            Some(project) => dependencies.push(ProjectDependency {
                project: project.clone(),
                exported: graph.is_reexported(bundle, dep),
            }),
            None => diagnostics.push(
                Diagnostic::warning(format!("dependency `{}` has no project", dep))
                    .for_bundle(bundle)
                    .logged(),
            ),
        }
    }

    (dependencies, diagnostics)
}

/// Read a project's manual override file.
///
/// Returns the extra target paths it lists, or `None` when the project has
/// no override.
pub fn read_manual_override(project_dir: &Path) -> Result<Option<Vec<String>>> {
    let path = project_dir.join(MANUAL_OVERRIDE_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let text = crate::util::fs::read_to_string(&path)?;
    let files = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    Ok(Some(files))
}
