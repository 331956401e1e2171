//! Bundle dependency graph.
//!
//! Three declaration mechanisms feed one depends-on relation:
//! - `Require-Bundle` names bundles directly (optionally re-exported)
//! - `Import-Package` names packages; every exporter becomes a dependency
//! - `Fragment-Host` attaches a fragment to its host
//!
//! The graph is built once per run and is read-only afterwards. Every view
//! is sorted so downstream output is deterministic.

pub mod cycles;

pub use cycles::find_cycles;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::core::manifest;
use crate::core::Bundle;
use crate::sources::BundleIndex;
use crate::util::Diagnostic;

/// The framework pseudo-bundle. It never takes part in package wiring and
/// never shows up as a dependent.
pub const SYSTEM_BUNDLE: &str = "system.bundle";

static EMPTY: BTreeSet<String> = BTreeSet::new();

/// How a dependency was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    Require,
    ImportExport,
    FragmentHost,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Require => write!(f, "require"),
            EdgeKind::ImportExport => write!(f, "import"),
            EdgeKind::FragmentHost => write!(f, "fragment-host"),
        }
    }
}

/// One declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub reexported: bool,
}

/// The depends-on graph over bundle ids.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Bundles present in the index
    bundles: BTreeSet<String>,

    /// `Require-Bundle` targets per bundle
    requires: BTreeMap<String, BTreeSet<String>>,

    /// Re-exported subset of `requires`
    reexports: BTreeMap<String, BTreeSet<String>>,

    /// Imported package names per bundle
    imports: BTreeMap<String, BTreeSet<String>>,

    /// Exporting bundles per package name
    exporters: BTreeMap<String, BTreeSet<String>>,

    /// Host per fragment
    hosts: BTreeMap<String, String>,

    /// Fragments per host
    fragments: BTreeMap<String, BTreeSet<String>>,

    /// requires ∪ exporters of imports
    finalized: BTreeMap<String, BTreeSet<String>>,

    /// Inverse of `finalized`
    dependents: BTreeMap<String, BTreeSet<String>>,

    /// `finalized` plus host attachment in both directions
    merged: BTreeMap<String, BTreeSet<String>>,

    /// Inverse of `merged`
    merged_dependents: BTreeMap<String, BTreeSet<String>>,

    /// Referenced ids without a bundle, with their referrers
    missing: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build the graph over every bundle of an index.
    pub fn build(index: &dyn BundleIndex) -> Self {
        Self::from_bundles(index.bundles())
    }

    /// Build the graph over a set of bundles.
    pub fn from_bundles<'a>(bundles: impl IntoIterator<Item = &'a Bundle>) -> Self {
        let mut graph = DependencyGraph::default();

        for bundle in bundles {
            graph.add_bundle(bundle);
        }
        graph.finalize();

        tracing::debug!(
            "dependency graph: {} bundles, {} exported packages",
            graph.bundles.len(),
            graph.exporters.len()
        );
        graph
    }

    fn add_bundle(&mut self, bundle: &Bundle) {
        let id = bundle.id().to_string();
        let attrs = bundle.manifest();

        for req in manifest::required_bundles(attrs) {
            if req.id == id {
                continue;
            }
            if req.reexport {
                self.reexports
                    .entry(id.clone())
                    .or_default()
                    .insert(req.id.clone());
            }
            self.requires.entry(id.clone()).or_default().insert(req.id);
        }

        if id != SYSTEM_BUNDLE {
            for pkg in manifest::imported_packages(attrs) {
                self.imports.entry(id.clone()).or_default().insert(pkg.name);
            }
            for pkg in manifest::exported_packages(attrs) {
                self.exporters.entry(pkg.name).or_default().insert(id.clone());
            }
        }

        if let Some(host) = manifest::fragment_host(attrs) {
            self.fragments
                .entry(host.clone())
                .or_default()
                .insert(id.clone());
            self.hosts.insert(id.clone(), host);
        }

        self.bundles.insert(id);
    }

    fn finalize(&mut self) {
        for id in &self.bundles {
            let mut deps: BTreeSet<String> = self
                .requires
                .get(id)
                .into_iter()
                .flatten()
                .filter(|d| d.as_str() != SYSTEM_BUNDLE)
                .cloned()
                .collect();

            for pkg in self.imports.get(id).into_iter().flatten() {
                for exporter in self.exporters.get(pkg).into_iter().flatten() {
                    if exporter != id {
                        deps.insert(exporter.clone());
                    }
                }
            }

            for dep in &deps {
                self.dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(id.clone());
            }
            self.finalized.insert(id.clone(), deps);
        }

        for id in &self.bundles {
            let mut merged = self.finalized[id].clone();
            if let Some(host) = self.hosts.get(id) {
                merged.insert(host.clone());
            }
            for fragment in self.fragments.get(id).into_iter().flatten() {
                if let Some(deps) = self.finalized.get(fragment) {
                    merged.extend(deps.iter().cloned());
                }
            }
            merged.remove(id);
            merged.remove(SYSTEM_BUNDLE);

            for dep in &merged {
                self.merged_dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(id.clone());
            }
            self.merged.insert(id.clone(), merged);
        }

        // A fragment is reached through its host.
        for (fragment, host) in &self.hosts {
            let inherited: BTreeSet<String> = self
                .merged_dependents
                .get(host)
                .into_iter()
                .flatten()
                .filter(|d| *d != fragment)
                .cloned()
                .collect();
            if !inherited.is_empty() {
                self.merged_dependents
                    .entry(fragment.clone())
                    .or_default()
                    .extend(inherited);
            }
        }

        let referenced = self
            .requires
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from, to)))
            .chain(self.hosts.iter());
        let mut missing: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in referenced {
            if to != SYSTEM_BUNDLE && !self.bundles.contains(to) {
                missing.entry(to.clone()).or_default().insert(from.clone());
            }
        }
        self.missing = missing;
    }

    /// All bundle ids in the graph.
    pub fn bundles(&self) -> impl Iterator<Item = &str> {
        self.bundles.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bundles.contains(id)
    }

    /// Declared `Require-Bundle` targets.
    pub fn requires(&self, id: &str) -> &BTreeSet<String> {
        self.requires.get(id).unwrap_or(&EMPTY)
    }

    /// Re-exported requirements.
    pub fn reexports(&self, id: &str) -> &BTreeSet<String> {
        self.reexports.get(id).unwrap_or(&EMPTY)
    }

    pub fn is_reexported(&self, from: &str, to: &str) -> bool {
        self.reexports(from).contains(to)
    }

    /// Bundles exporting a package.
    pub fn exporters(&self, package: &str) -> &BTreeSet<String> {
        self.exporters.get(package).unwrap_or(&EMPTY)
    }

    /// Host of a fragment.
    pub fn host(&self, id: &str) -> Option<&str> {
        self.hosts.get(id).map(String::as_str)
    }

    /// Fragments attached to a host.
    pub fn fragments(&self, id: &str) -> &BTreeSet<String> {
        self.fragments.get(id).unwrap_or(&EMPTY)
    }

    /// Requirements plus exporters of imported packages.
    pub fn dependencies(&self, id: &str) -> &BTreeSet<String> {
        self.finalized.get(id).unwrap_or(&EMPTY)
    }

    /// Bundles whose finalized dependencies include `id`.
    pub fn dependents(&self, id: &str) -> &BTreeSet<String> {
        if id == SYSTEM_BUNDLE {
            return &EMPTY;
        }
        self.dependents.get(id).unwrap_or(&EMPTY)
    }

    /// Dependencies including host attachment: a fragment depends on its
    /// host, and a host also carries its fragments' dependencies.
    pub fn merged_dependencies(&self, id: &str) -> &BTreeSet<String> {
        self.merged.get(id).unwrap_or(&EMPTY)
    }

    /// Inverse of [`merged_dependencies`](Self::merged_dependencies). A
    /// fragment also lists its host's dependents.
    pub fn merged_dependents(&self, id: &str) -> &BTreeSet<String> {
        if id == SYSTEM_BUNDLE {
            return &EMPTY;
        }
        self.merged_dependents.get(id).unwrap_or(&EMPTY)
    }

    /// Every bundle that reaches `id` through the merged relation.
    pub fn transitive_dependents(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for dependent in self.merged_dependents(current) {
                if dependent != id && seen.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }

        seen
    }

    /// Every declared edge, sorted.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges = Vec::new();

        for (from, tos) in &self.requires {
            for to in tos {
                edges.push(DependencyEdge {
                    from: from.clone(),
                    to: to.clone(),
                    kind: EdgeKind::Require,
                    reexported: self.is_reexported(from, to),
                });
            }
        }

        for (from, packages) in &self.imports {
            let targets: BTreeSet<&String> = packages
                .iter()
                .flat_map(|p| self.exporters(p))
                .filter(|e| *e != from)
                .collect();
            for to in targets {
                edges.push(DependencyEdge {
                    from: from.clone(),
                    to: to.clone(),
                    kind: EdgeKind::ImportExport,
                    reexported: false,
                });
            }
        }

        for (from, to) in &self.hosts {
            edges.push(DependencyEdge {
                from: from.clone(),
                to: to.clone(),
                kind: EdgeKind::FragmentHost,
                reexported: false,
            });
        }

        edges.sort();
        edges
    }

    /// Ids referenced by some bundle but absent from the index.
    pub fn missing(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.missing
    }

    /// Soft diagnostics for referenced bundles without a manifest.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.missing
            .iter()
            .map(|(id, referrers)| {
                Diagnostic::warning(format!("no manifest for referenced bundle `{}`", id))
                    .with_context(format!(
                        "referenced by {}",
                        referrers.iter().cloned().collect::<Vec<_>>().join(", ")
                    ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{
        Attributes, BUNDLE_SYMBOLIC_NAME, EXPORT_PACKAGE, FRAGMENT_HOST, IMPORT_PACKAGE,
        REQUIRE_BUNDLE,
    };

    fn bundle(id: &str, headers: &[(&str, &str)]) -> Bundle {
        let mut attrs = Attributes::new();
        attrs.insert(BUNDLE_SYMBOLIC_NAME.into(), id.into());
        for (k, v) in headers {
            attrs.insert(k.to_string(), v.to_string());
        }
        Bundle::from_manifest(attrs, Vec::new()).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Vec<Bundle> {
        vec![
            bundle("A", &[(REQUIRE_BUNDLE, "B;visibility:=reexport")]),
            bundle("B", &[(EXPORT_PACKAGE, "b.api;version=\"1.0\",b.impl")]),
            bundle("C", &[(IMPORT_PACKAGE, "b.api;version=\"[1.0,2.0)\"")]),
            bundle(
                "D",
                &[(FRAGMENT_HOST, "A"), (REQUIRE_BUNDLE, "E")],
            ),
            bundle("E", &[]),
        ]
    }

    #[test]
    fn test_three_mechanisms() {
        let bundles = sample();
        let graph = DependencyGraph::from_bundles(&bundles);

        assert_eq!(graph.dependencies("A"), &set(&["B"]));
        assert_eq!(graph.dependencies("C"), &set(&["B"]));
        assert_eq!(graph.host("D"), Some("A"));
        assert_eq!(graph.fragments("A"), &set(&["D"]));
        assert!(graph.is_reexported("A", "B"));

        // D's host attachment contributes to A's merged relation
        assert_eq!(graph.merged_dependencies("A"), &set(&["B", "E"]));
        assert_eq!(graph.merged_dependencies("D"), &set(&["A", "E"]));
    }

    #[test]
    fn test_inverse_views() {
        let bundles = sample();
        let graph = DependencyGraph::from_bundles(&bundles);

        assert_eq!(graph.dependents("B"), &set(&["A", "C"]));
        assert_eq!(graph.transitive_dependents("B"), set(&["A", "C", "D"]));
        assert!(graph.dependents("A").is_empty());
        assert_eq!(graph.merged_dependents("A"), &set(&["D"]));
    }

    #[test]
    fn test_fragment_inherits_host_dependents() {
        let bundles = vec![
            bundle("A", &[]),
            bundle("D", &[(FRAGMENT_HOST, "A")]),
            bundle("X", &[(REQUIRE_BUNDLE, "A")]),
        ];
        let graph = DependencyGraph::from_bundles(&bundles);

        assert_eq!(graph.merged_dependents("A"), &set(&["D", "X"]));
        assert_eq!(graph.merged_dependents("D"), &set(&["X"]));
        assert_eq!(graph.transitive_dependents("D"), set(&["X"]));
    }

    #[test]
    fn test_edges_sorted_with_kinds() {
        let bundles = sample();
        let graph = DependencyGraph::from_bundles(&bundles);
        let edges: Vec<_> = graph
            .edges()
            .into_iter()
            .map(|e| (e.from, e.to, e.kind, e.reexported))
            .collect();

        assert_eq!(
            edges,
            vec![
                ("A".into(), "B".into(), EdgeKind::Require, true),
                ("C".into(), "B".into(), EdgeKind::ImportExport, false),
                ("D".into(), "A".into(), EdgeKind::FragmentHost, false),
                ("D".into(), "E".into(), EdgeKind::Require, false),
            ]
        );
    }

    #[test]
    fn test_system_bundle_excluded() {
        let bundles = vec![
            bundle(SYSTEM_BUNDLE, &[(EXPORT_PACKAGE, "org.osgi.framework")]),
            bundle(
                "A",
                &[
                    (IMPORT_PACKAGE, "org.osgi.framework"),
                    (REQUIRE_BUNDLE, "system.bundle"),
                ],
            ),
        ];
        let graph = DependencyGraph::from_bundles(&bundles);

        assert!(graph.dependencies("A").is_empty());
        assert!(graph.dependents(SYSTEM_BUNDLE).is_empty());
        assert!(graph.missing().is_empty());
    }

    #[test]
    fn test_missing_manifest_reported() {
        let bundles = vec![bundle("A", &[(REQUIRE_BUNDLE, "ghost")])];
        let graph = DependencyGraph::from_bundles(&bundles);

        assert_eq!(graph.dependencies("A"), &set(&["ghost"]));
        let diags = graph.diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("`ghost`"));
        assert!(diags[0].context[0].contains("A"));
    }

    #[test]
    fn test_self_export_not_a_dependency() {
        let bundles = vec![bundle(
            "A",
            &[(EXPORT_PACKAGE, "a.api"), (IMPORT_PACKAGE, "a.api")],
        )];
        let graph = DependencyGraph::from_bundles(&bundles);
        assert!(graph.dependencies("A").is_empty());
    }
}
