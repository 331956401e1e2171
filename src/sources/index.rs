//! BundleIndex trait - common interface for all bundle providers.

use crate::core::{Bundle, BundleSet};

/// A provider of selected bundles, one per id.
///
/// Implementations have already applied highest-version selection and
/// expanded nested archives into `Bundle::files`.
pub trait BundleIndex {
    /// All bundle ids, sorted.
    fn ids(&self) -> Vec<String>;

    /// The selected bundle for an id.
    fn get(&self, id: &str) -> Option<&Bundle>;

    /// Iterate selected bundles in id order.
    fn bundles(&self) -> Vec<&Bundle> {
        self.ids().iter().filter_map(|id| self.get(id)).collect()
    }
}

impl BundleIndex for BundleSet {
    fn ids(&self) -> Vec<String> {
        BundleSet::ids(self).map(str::to_string).collect()
    }

    fn get(&self, id: &str) -> Option<&Bundle> {
        BundleSet::get(self, id)
    }
}
