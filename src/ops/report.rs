//! Whole-run report.
//!
//! Everything here is computed after emission from data the run already
//! holds, and rendered in a fixed order so two runs over the same workspace
//! print the same text.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::catalog::{family_of, CatalogEntry};
use crate::emit::ProjectDependency;
use crate::graph::cycles::find_cycles;
use crate::graph::DependencyGraph;
use crate::util::Diagnostic;

/// Per-bundle line of the dependency listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub bundle: String,
    pub project: String,
    pub dependencies: Vec<ProjectDependency>,
    pub dependents: usize,
    pub transitive_dependents: usize,
    /// Target files without source
    pub missing_files: usize,
    /// Descriptors left to the project's manual override
    pub manual: bool,
}

/// A catalogued source root that no mapping uses completely.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnusedRoot {
    pub root: String,
    pub bundle: String,
    /// Files outside every mapping root; `None` when nothing maps into it
    pub uncovered: Option<usize>,
}

/// Result of one synthesizer run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub bundles: Vec<BundleSummary>,
    pub unused_libraries: Vec<String>,
    pub unused_roots: Vec<UnusedRoot>,
    pub unused_projects: Vec<String>,
    pub cycles: Vec<Vec<String>>,
    pub diagnostics: Vec<Diagnostic>,
    /// Descriptor files rewritten
    pub written: usize,
    /// Stale output folders removed
    pub pruned: usize,
}

impl Report {
    pub fn has_warnings(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

fn section<T>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    items: &[T],
    mut line: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    writeln!(f, "== {} ==", title)?;
    if items.is_empty() {
        writeln!(f, "(none)")?;
    }
    for item in items {
        line(f, item)?;
    }
    writeln!(f)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Dependencies", &self.bundles, |f, b| {
            write!(
                f,
                "{} ({}) <- {} dependents, {} transitive",
                b.project, b.bundle, b.dependents, b.transitive_dependents
            )?;
            if b.missing_files > 0 {
                write!(f, ", {} files without source", b.missing_files)?;
            }
            if b.manual {
                write!(f, " [manual]")?;
            }
            writeln!(f)?;
            for dep in &b.dependencies {
                if dep.exported {
                    writeln!(f, "    {} [exported]", dep.project)?;
                } else {
                    writeln!(f, "    {}", dep.project)?;
                }
            }
            Ok(())
        })?;

        section(f, "Unused libraries", &self.unused_libraries, |f, l| {
            writeln!(f, "{}", l)
        })?;

        section(f, "Unused source roots", &self.unused_roots, |f, r| match r.uncovered {
            None => writeln!(f, "{} ({}): unused", r.root, r.bundle),
            Some(n) => writeln!(f, "{} ({}): {} files outside mappings", r.root, r.bundle, n),
        })?;

        section(f, "Unused projects", &self.unused_projects, |f, p| {
            writeln!(f, "{}", p)
        })?;

        section(f, "Dependency cycles", &self.cycles, |f, c| {
            writeln!(f, "{}", c.join(" -> "))
        })?;

        section(f, "Diagnostics", &self.diagnostics, |f, d| {
            writeln!(f, "{}", d.format(false))
        })?;

        write!(
            f,
            "{} projects, {} descriptors written, {} output folders pruned",
            self.bundles.len(),
            self.written,
            self.pruned
        )
    }
}

/// How much of a catalogued root the bundle's mappings cover.
///
/// `files` are the root's files relative to it. Returns `None` when the
/// root is fully used.
pub fn unused_root<'a>(
    bundle: &str,
    root: &str,
    files: &[String],
    mapping_roots: impl IntoIterator<Item = &'a str>,
) -> Option<UnusedRoot> {
    let mut nested = Vec::new();
    for m in mapping_roots {
        if m == root || is_under(root, m) {
            return None;
        }
        if let Some(rel) = m.strip_prefix(root).and_then(|r| r.strip_prefix('/')) {
            nested.push(rel);
        }
    }

    let uncovered = if nested.is_empty() {
        None
    } else {
        let count = files
            .iter()
            .filter(|f| !nested.iter().any(|n| is_under(f, n)))
            .count();
        if count == 0 {
            return None;
        }
        Some(count)
    };

    Some(UnusedRoot {
        root: root.to_string(),
        bundle: bundle.to_string(),
        uncovered,
    })
}

fn is_under(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Library repositories no catalogued root points into.
pub fn unused_libraries<'a>(
    repos: &[String],
    entries: impl IntoIterator<Item = &'a CatalogEntry>,
) -> Vec<String> {
    let used: BTreeSet<&str> = entries
        .into_iter()
        .flat_map(|e| e.roots.iter())
        .filter_map(|r| family_of(r))
        .collect();

    repos
        .iter()
        .filter(|r| !used.contains(r.as_str()))
        .cloned()
        .collect()
}

/// Project folders on disk this run did not produce.
pub fn unused_projects(existing: &[String], produced: &BTreeSet<String>) -> Vec<String> {
    existing
        .iter()
        .filter(|p| !produced.contains(*p))
        .cloned()
        .collect()
}

/// Cycles among generated projects along `Require-Bundle` edges.
///
/// `projects` maps bundle ids to project names.
pub fn project_cycles(
    graph: &DependencyGraph,
    projects: &BTreeMap<String, String>,
) -> Vec<Vec<String>> {
    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (bundle, project) in projects {
        for required in graph.requires(bundle) {
            if let Some(target) = projects.get(required) {
                edges
                    .entry(project.clone())
                    .or_default()
                    .insert(target.clone());
            }
        }
    }
    find_cycles(&edges)
}
