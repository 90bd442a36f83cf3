//! Reverse-dependency index.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Maps a resolved path to every path that depends on it, itself included.
///
/// Sets only ever grow: merging two indexes unions the sets per key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependentsIndex {
    sets: HashMap<PathBuf, HashSet<PathBuf>>,
}

impl DependentsIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependents of `path`, if the path is known.
    pub fn get(&self, path: &Path) -> Option<&HashSet<PathBuf>> {
        self.sets.get(path)
    }

    /// Whether `dependent` is recorded as depending on `path`.
    pub fn depends_on(&self, dependent: &Path, path: &Path) -> bool {
        self.sets.get(path).is_some_and(|set| set.contains(dependent))
    }

    /// All paths that have a dependents set.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.sets.keys()
    }

    /// Whether `path` has a dependents set.
    pub fn contains(&self, path: &Path) -> bool {
        self.sets.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Union every set of `other` into this index.
    pub fn merge(&mut self, other: DependentsIndex) {
        for (path, dependents) in other.sets {
            self.sets.entry(path).or_default().extend(dependents);
        }
    }

    /// Ensure `path` has a set containing at least itself.
    pub(crate) fn ensure(&mut self, path: &Path) -> &mut HashSet<PathBuf> {
        self.sets
            .entry(path.to_path_buf())
            .or_insert_with(|| HashSet::from([path.to_path_buf()]))
    }
}
