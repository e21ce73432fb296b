//! Ordered set of root-relative paths

use std::collections::BTreeSet;
use std::collections::btree_set;

use serde::{Deserialize, Serialize};

use crate::path::normalize_relative;

/// A set of normalized, root-relative paths
///
/// Insertion normalizes the path, so `./a//b` and `a/b` are the same member.
/// The bundle root (the empty path) is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet(BTreeSet<String>);

impl PathSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Insert a path, returning whether it was new
    pub fn insert(&mut self, path: &str) -> bool {
        let normalized = normalize_relative(path);
        if normalized.is_empty() {
            return false;
        }
        self.0.insert(normalized)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.0.remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    /// Paths in `self` that are missing from `other`
    pub fn difference(&self, other: &PathSet) -> BTreeSet<String> {
        self.0.difference(&other.0).cloned().collect()
    }

    /// Paths present in both sets
    pub fn intersection(&self, other: &PathSet) -> PathSet {
        PathSet(self.0.intersection(&other.0).cloned().collect())
    }
}

impl<S: AsRef<str>> FromIterator<S> for PathSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PathSet::new();
        set.extend(iter);
        set
    }
}

impl<S: AsRef<str>> Extend<S> for PathSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for path in iter {
            self.insert(path.as_ref());
        }
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for PathSet {
    type Item = String;
    type IntoIter = btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
