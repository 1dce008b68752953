//! Artifact mapping: generated file paths and their current contents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from file path to content. Last writer wins on a duplicate path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactMap {
    files: BTreeMap<String, String>,
}

impl ArtifactMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one file, returning the content it replaced.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) -> Option<String> {
        self.files.insert(path.into(), content.into())
    }

    /// Merge a batch of files, overwriting existing paths. Returns the
    /// number of files merged.
    pub fn merge<I, P, C>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let mut merged = 0;
        for (path, content) in files {
            self.files.insert(path.into(), content.into());
            merged += 1;
        }
        merged
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Total content size in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(String::len).sum()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for ArtifactMap {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.merge(iter);
        map
    }
}
