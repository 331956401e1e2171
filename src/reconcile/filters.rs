//! Inclusion and exclusion filters for one mapping.
//!
//! A source root usually holds more than the bundle ships. `including`
//! narrows a root to the files actually deployed; `excluding` hides the
//! subtrees that belong to other, nested mappings plus the configured
//! exclusions for the bundle.

use std::collections::{BTreeMap, BTreeSet};

use glob::{MatchOptions, Pattern};

use super::{canonicalize, MappingKey};
use crate::util::Diagnostic;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Filters of one classpath entry. Empty lists mean "no attribute".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub including: Vec<String>,
    pub excluding: Vec<String>,
}

/// Computes filters for the mappings of one bundle.
#[derive(Debug)]
pub struct InclusionExclusionComputer {
    bundle: String,
    excludes: Vec<(String, Pattern)>,
}

impl InclusionExclusionComputer {
    /// Create a computer with the bundle's configured exclusion globs.
    ///
    /// Globs that do not parse are reported and dropped.
    pub fn new(bundle: &str, excludes: &[String]) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut patterns = Vec::new();

        for raw in excludes {
            match Pattern::new(raw) {
                Ok(p) => patterns.push((raw.clone(), p)),
                Err(e) => diagnostics.push(
                    Diagnostic::warning(format!("invalid exclusion `{}`: {}", raw, e))
                        .for_bundle(bundle)
                        .logged(),
                ),
            }
        }

        let computer = InclusionExclusionComputer {
            bundle: bundle.to_string(),
            excludes: patterns,
        };
        (computer, diagnostics)
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes
            .iter()
            .any(|(_, p)| p.matches_with(path, MATCH_OPTIONS))
    }

    /// Filters for mapping `key`.
    ///
    /// `files` lists every file under the mapping's root, relative to it.
    /// `targets` are the original target paths of the mapping and
    /// `roots` every real root of the bundle.
    pub fn compute<'a>(
        &self,
        key: &MappingKey,
        files: &[String],
        targets: &BTreeSet<String>,
        roots: impl IntoIterator<Item = &'a str>,
    ) -> (Filters, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();

        let nested: BTreeSet<String> = roots
            .into_iter()
            .filter_map(|r| r.strip_prefix(key.root.as_str()))
            .filter_map(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
            .collect();

        let all: Vec<&String> = files
            .iter()
            .filter(|f| !nested.iter().any(|n| is_under(f, n)))
            .filter(|f| !self.is_excluded(f))
            .collect();

        let wanted: BTreeSet<String> = targets
            .iter()
            .filter_map(|t| relative_to_output(t, &key.output))
            .map(canonicalize)
            .collect();

        let used: BTreeSet<&str> = all
            .iter()
            .filter(|f| wanted.contains(&canonicalize(f)))
            .map(|f| f.as_str())
            .collect();

        let including = if !used.is_empty() && used.len() < all.len() {
            let mut tree = Node::default();
            for f in &all {
                tree.insert(f, used.contains(f.as_str()));
            }
            let mut out = Vec::new();
            tree.minimal("", &mut out);
            out
        } else {
            Vec::new()
        };

        let mut excluding: Vec<String> = nested.iter().map(|n| format!("{}/**", n)).collect();
        excluding.extend(self.excludes.iter().map(|(raw, _)| raw.clone()));

        for (raw, pattern) in &self.excludes {
            if !files.iter().any(|f| pattern.matches_with(f, MATCH_OPTIONS)) {
                diagnostics.push(
                    Diagnostic::warning(format!("exclusion `{}` matches nothing", raw))
                        .for_bundle(&self.bundle)
                        .with_context(format!("source root: {}", key.root))
                        .logged(),
                );
            }
        }

        for entry in &including {
            let overlaps = match entry.strip_suffix("/**") {
                Some(dir) => files
                    .iter()
                    .any(|f| is_under(f, dir) && self.is_excluded(f)),
                None => self.is_excluded(entry),
            };
            if overlaps {
                diagnostics.push(
                    Diagnostic::warning(format!("inclusion `{}` overlaps an exclusion", entry))
                        .for_bundle(&self.bundle)
                        .with_context(format!("source root: {}", key.root))
                        .logged(),
                );
            }
        }

        (
            Filters {
                including,
                excluding,
            },
            diagnostics,
        )
    }
}

/// A target path relative to the output folder, if it lies inside it.
fn relative_to_output<'t>(target: &'t str, output: &str) -> Option<&'t str> {
    if output.is_empty() {
        return Some(target);
    }
    target.strip_prefix(output)?.strip_prefix('/')
}

fn is_under(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Directory trie with used/total file counts.
#[derive(Debug, Default)]
struct Node {
    files: BTreeMap<String, bool>,
    dirs: BTreeMap<String, Node>,
    total: usize,
    used: usize,
}

impl Node {
    fn insert(&mut self, path: &str, used: bool) {
        self.total += 1;
        self.used += usize::from(used);
        match path.split_once('/') {
            Some((dir, rest)) => self.dirs.entry(dir.to_string()).or_default().insert(rest, used),
            None => {
                self.files.insert(path.to_string(), used);
            }
        }
    }

    /// Fewest entries naming exactly the used files: fully used directories
    /// collapse to `dir/**`.
    fn minimal(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, node) in &self.dirs {
            let path = format!("{}{}", prefix, name);
            if node.used == 0 {
                continue;
            }
            if node.used == node.total {
                out.push(format!("{}/**", path));
            } else {
                node.minimal(&format!("{}/", path), out);
            }
        }
        for (name, used) in &self.files {
            if *used {
                out.push(format!("{}{}", prefix, name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_including_when_everything_used() {
        let (computer, _) = InclusionExclusionComputer::new("b", &[]);
        let key = MappingKey::new("libraries/r/b/src", "");
        let files = strings(&["org/x/A.java", "org/x/B.java"]);
        let targets = set(&["org/x/A.class", "org/x/B$1.class", "org/x/B.class"]);

        let (filters, diags) = computer.compute(&key, &files, &targets, ["libraries/r/b/src"]);
        assert!(filters.including.is_empty());
        assert!(filters.excluding.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_minimal_including() {
        let (computer, _) = InclusionExclusionComputer::new("b", &[]);
        let key = MappingKey::new("libraries/r/b", "");
        let files = strings(&[
            "about.html",
            "build.properties",
            "icons/a.png",
            "icons/b.png",
            "plugin.xml",
            "res/keep/x.txt",
            "res/drop/y.txt",
        ]);
        let targets = set(&["about.html", "icons/a.png", "icons/b.png", "plugin.xml", "res/keep/x.txt"]);

        let (filters, _) = computer.compute(&key, &files, &targets, ["libraries/r/b"]);
        assert_eq!(
            filters.including,
            vec!["icons/**", "res/keep/**", "about.html", "plugin.xml"]
        );
    }

    #[test]
    fn test_nested_roots_and_overrides_excluded() {
        let (computer, diags) =
            InclusionExclusionComputer::new("b", &strings(&["**/*.orig", "gone/**"]));
        assert!(diags.is_empty());

        let key = MappingKey::new("libraries/r/b", "");
        let files = strings(&["plugin.xml", "src/org/A.java", "x.orig"]);
        let targets = set(&["plugin.xml"]);

        let (filters, diags) = computer.compute(
            &key,
            &files,
            &targets,
            ["libraries/r/b", "libraries/r/b/src", "libraries/r/bb"],
        );

        assert_eq!(filters.excluding, vec!["src/**", "**/*.orig", "gone/**"]);
        // Nested and excluded files are not part of "all".
        assert!(filters.including.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("gone/**"));
    }

    #[test]
    fn test_including_overlapping_exclusion_is_reported() {
        let (computer, _) = InclusionExclusionComputer::new("b", &strings(&["icons/*.svg"]));
        let key = MappingKey::new("libraries/r/b", "");
        let files = strings(&["icons/a.png", "icons/b.svg", "plugin.xml"]);
        let targets = set(&["icons/a.png"]);

        let (filters, diags) = computer.compute(&key, &files, &targets, ["libraries/r/b"]);
        assert_eq!(filters.including, vec!["icons/**"]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("overlaps"));
    }

    #[test]
    fn test_targets_relative_to_output_folder() {
        let (computer, _) = InclusionExclusionComputer::new("b", &[]);
        let key = MappingKey::new("libraries/r/b/native", "os/linux");
        let files = strings(&["libswt-4956.so", "libswt-old.so.bak"]);
        let targets = set(&["os/linux/libswt-4960.so"]);

        let (filters, _) = computer.compute(&key, &files, &targets, ["libraries/r/b/native"]);
        assert_eq!(filters.including, vec!["libswt-4956.so"]);
    }
}
