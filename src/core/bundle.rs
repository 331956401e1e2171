//! Bundles - WHAT is deployed (id + version + manifest + files).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::manifest::{self, Attributes};
use crate::core::version::BundleVersion;

/// A deployed binary bundle.
///
/// `files` holds relative paths inside the fully expanded artifact. A nested
/// archive such as `lib/a.jar` appears as `lib/a.jar` followed by its
/// expanded entries `lib/a.jar/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    id: String,
    version: BundleVersion,
    manifest: Attributes,
    files: BTreeSet<String>,
}

impl Bundle {
    pub fn new(
        id: impl Into<String>,
        version: BundleVersion,
        manifest: Attributes,
        files: impl IntoIterator<Item = String>,
    ) -> Self {
        Bundle {
            id: id.into(),
            version,
            manifest,
            files: files.into_iter().collect(),
        }
    }

    /// Build a bundle from manifest attributes alone.
    ///
    /// The id comes from `Bundle-SymbolicName`; a missing `Bundle-Version`
    /// yields the null version.
    pub fn from_manifest(
        manifest: Attributes,
        files: impl IntoIterator<Item = String>,
    ) -> Option<Self> {
        let id = manifest::symbolic_name(&manifest)?;
        let version = manifest
            .get(manifest::BUNDLE_VERSION)
            .map(|v| BundleVersion::parse(v))
            .unwrap_or_else(BundleVersion::null);
        Some(Bundle::new(id, version, manifest, files))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &BundleVersion {
        &self.version
    }

    pub fn manifest(&self) -> &Attributes {
        &self.manifest
    }

    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    /// Directory name of the deployed bundle (`id_version`).
    pub fn deployed_name(&self) -> String {
        format!("{}_{}", self.id, self.version)
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.id, self.version)
    }
}

/// The selected bundle per id: the highest version wins.
#[derive(Debug, Clone, Default)]
pub struct BundleSet {
    bundles: BTreeMap<String, Bundle>,
}

impl BundleSet {
    pub fn new() -> Self {
        BundleSet::default()
    }

    /// Offer a bundle; it replaces the current selection only if newer.
    pub fn insert(&mut self, bundle: Bundle) {
        match self.bundles.get(bundle.id()) {
            Some(existing) if existing.version() >= bundle.version() => {
                tracing::debug!("ignoring {} (have {})", bundle, existing);
            }
            _ => {
                self.bundles.insert(bundle.id().to_string(), bundle);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Bundle> {
        self.bundles.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

impl FromIterator<Bundle> for BundleSet {
    fn from_iter<I: IntoIterator<Item = Bundle>>(iter: I) -> Self {
        let mut set = BundleSet::new();
        for bundle in iter {
            set.insert(bundle);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(id: &str, version: &str) -> Bundle {
        Bundle::new(id, BundleVersion::parse(version), Attributes::new(), Vec::new())
    }

    #[test]
    fn test_highest_version_selected() {
        let set: BundleSet = vec![
            bundle("a", "1.0.0"),
            bundle("a", "1.10.0"),
            bundle("a", "1.9.0"),
            bundle("b", "0.1"),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a").unwrap().version().to_string(), "1.10.0");
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_from_manifest_without_version() {
        let mut attrs = Attributes::new();
        attrs.insert(
            manifest::BUNDLE_SYMBOLIC_NAME.into(),
            "org.example;singleton:=true".into(),
        );
        let b = Bundle::from_manifest(attrs, vec!["plugin.xml".to_string()]).unwrap();
        assert_eq!(b.id(), "org.example");
        assert_eq!(b.version(), &BundleVersion::null());
        assert_eq!(b.deployed_name(), "org.example_0.0.0");
    }
}
