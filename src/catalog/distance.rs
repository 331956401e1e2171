//! Edit distance with a per-run memo.

use std::collections::HashMap;

use strsim::levenshtein;

/// Memoized Levenshtein distances, owned by one catalog for one run.
#[derive(Debug, Default)]
pub struct DistanceCache {
    memo: HashMap<(String, String), usize>,
}

impl DistanceCache {
    pub fn new() -> Self {
        DistanceCache::default()
    }

    /// Edit distance between two strings. Symmetric pairs share one entry.
    pub fn distance(&mut self, a: &str, b: &str) -> usize {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };

        if let Some(&d) = self.memo.get(&key) {
            return d;
        }

        let d = levenshtein(&key.0, &key.1);
        self.memo.insert(key, d);
        d
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}
