//! File reconciliation.
//!
//! Every file of a deployed bundle is traced back to the source directory
//! that produced it. A target path is compared against every candidate
//! source file by the number of trailing path components they share; the
//! candidate's remaining prefix becomes the source root, the target's
//! remaining prefix becomes the output subfolder.
//!
//! ```text
//! target     org/x/Foo.class        -> org/x/Foo.java
//! candidate  libraries/r/b/src/org/x/Foo.java
//! mapping    (libraries/r/b/src, "")
//! ```

pub mod canonical;
pub mod filters;

pub use canonical::{canonicalize, is_ignored};
pub use filters::{Filters, InclusionExclusionComputer};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::util::SynthError;

/// Synthetic source root for target files with no source anywhere.
pub const PLACEHOLDER_ROOT: &str = "x-miss-x";

/// Where a group of target files comes from and where it is compiled to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MappingKey {
    /// Workspace-relative source root
    pub root: String,
    /// Subfolder of the deployed bundle (`""` for the bundle root)
    pub output: String,
}

impl MappingKey {
    pub fn new(root: impl Into<String>, output: impl Into<String>) -> Self {
        MappingKey {
            root: root.into(),
            output: output.into(),
        }
    }

    pub fn placeholder() -> Self {
        MappingKey::new(PLACEHOLDER_ROOT, "")
    }

    pub fn is_placeholder(&self) -> bool {
        self.root == PLACEHOLDER_ROOT
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.output.is_empty() {
            write!(f, "{} -> /", self.root)
        } else {
            write!(f, "{} -> {}", self.root, self.output)
        }
    }
}

/// Outcome of matching one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Best candidate found
    Matched {
        key: MappingKey,
        candidate: String,
        shared: usize,
    },
    /// No candidate shares even the file name
    NotFound,
    /// Several roots hold the file with nothing to tell them apart
    Ambiguous { candidates: Vec<String> },
}

/// Mappings of one bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Original target paths per mapping
    pub mappings: BTreeMap<MappingKey, BTreeSet<String>>,
    /// Target files that never take part
    pub ignored: Vec<String>,
}

impl Reconciliation {
    /// Mappings with a real source root.
    pub fn real(&self) -> impl Iterator<Item = (&MappingKey, &BTreeSet<String>)> {
        self.mappings.iter().filter(|(k, _)| !k.is_placeholder())
    }

    /// Target files without source.
    pub fn missing(&self) -> Option<&BTreeSet<String>> {
        self.mappings.get(&MappingKey::placeholder())
    }

    /// Distinct real source roots, sorted.
    pub fn roots(&self) -> BTreeSet<&str> {
        self.real().map(|(k, _)| k.root.as_str()).collect()
    }
}

#[derive(Debug)]
struct Candidate {
    path: String,
    components: Vec<String>,
}

/// Matches target files of one bundle against a pool of candidate files.
#[derive(Debug)]
pub struct FileReconciler {
    candidates: Vec<Candidate>,
    /// Candidate indices by canonical file name
    by_name: HashMap<String, Vec<usize>>,
}

impl FileReconciler {
    /// Build a reconciler over workspace-relative candidate paths.
    pub fn new<I, S>(pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut paths: Vec<String> = pool.into_iter().map(Into::into).collect();
        paths.sort();
        paths.dedup();

        let mut candidates = Vec::with_capacity(paths.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for path in paths {
            let components: Vec<String> =
                canonicalize(&path).split('/').map(str::to_string).collect();
            if let Some(name) = components.last() {
                by_name
                    .entry(name.clone())
                    .or_default()
                    .push(candidates.len());
            }
            candidates.push(Candidate { path, components });
        }

        FileReconciler {
            candidates,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Find the best candidate for one target file.
    ///
    /// A candidate qualifies at suffix length `k` when it ends with the last
    /// `k` canonical components of the target and still has a root component
    /// left over. The best candidate has the longest `k`, then the fewest
    /// components, then the smallest path.
    pub fn resolve(&self, target: &str) -> Resolution {
        let wanted: Vec<String> = canonicalize(target).split('/').map(str::to_string).collect();
        let Some(indices) = wanted.last().and_then(|name| self.by_name.get(name)) else {
            return Resolution::NotFound;
        };

        let mut ranked: Vec<(usize, &Candidate)> = indices
            .iter()
            .map(|&i| &self.candidates[i])
            .map(|c| (shared_suffix(&wanted, &c.components).min(c.components.len() - 1), c))
            .filter(|(shared, _)| *shared > 0)
            .collect();

        ranked.sort_by(|(sa, a), (sb, b)| {
            sb.cmp(sa)
                .then(a.components.len().cmp(&b.components.len()))
                .then(a.path.cmp(&b.path))
        });

        let Some(&(shared, best)) = ranked.first() else {
            return Resolution::NotFound;
        };

        let root = best.path_prefix(shared);
        let output = wanted[..wanted.len() - shared].join("/");

        if output.is_empty() {
            let tied: Vec<String> = ranked
                .iter()
                .take_while(|(s, c)| *s == shared && c.components.len() == best.components.len())
                .filter(|(_, c)| c.path_prefix(shared) != root)
                .map(|(_, c)| c.path.clone())
                .collect();
            if !tied.is_empty() {
                let mut candidates = vec![best.path.clone()];
                candidates.extend(tied);
                return Resolution::Ambiguous { candidates };
            }
        }

        Resolution::Matched {
            key: MappingKey::new(root, output),
            candidate: best.path.clone(),
            shared,
        }
    }

    /// Map every target file of a bundle.
    ///
    /// Targets are visited in sorted order. A strict descendant of the
    /// previous matched target (the content of a matched nested archive)
    /// joins that target's mapping. Targets without any candidate land in
    /// the placeholder mapping.
    pub fn reconcile<'a, I>(&self, bundle: &str, targets: I) -> Result<Reconciliation, SynthError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut sorted: Vec<&String> = targets.into_iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut result = Reconciliation::default();
        let mut anchor: Option<(&str, MappingKey)> = None;

        for target in sorted {
            if is_ignored(target) {
                result.ignored.push(target.clone());
                continue;
            }

            if let Some((parent, key)) = &anchor {
                if is_descendant(target, parent) {
                    result
                        .mappings
                        .entry(key.clone())
                        .or_default()
                        .insert(target.clone());
                    continue;
                }
            }

            match self.resolve(target) {
                Resolution::Matched { key, .. } => {
                    result
                        .mappings
                        .entry(key.clone())
                        .or_default()
                        .insert(target.clone());
                    anchor = Some((target.as_str(), key));
                }
                Resolution::NotFound => {
                    tracing::debug!("{}: no source for {}", bundle, target);
                    result
                        .mappings
                        .entry(MappingKey::placeholder())
                        .or_default()
                        .insert(target.clone());
                }
                Resolution::Ambiguous { candidates } => {
                    return Err(SynthError::AmbiguousMatch {
                        bundle: bundle.to_string(),
                        target: target.clone(),
                        candidates,
                    });
                }
            }
        }

        Ok(result)
    }
}

impl Candidate {
    /// The original path minus its last `shared` components.
    fn path_prefix(&self, shared: usize) -> String {
        let keep = self.components.len() - shared;
        self.path.split('/').take(keep).collect::<Vec<_>>().join("/")
    }
}

fn shared_suffix(a: &[String], b: &[String]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn is_descendant(path: &str, parent: &str) -> bool {
    path.len() > parent.len() && path.starts_with(parent) && path.as_bytes()[parent.len()] == b'/'
}
