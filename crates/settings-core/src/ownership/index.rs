//! Path → team lookup tables built once per resolver run.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::models::OwnershipManifest;

/// File name of the package marker that lets a whole settings directory
/// inherit its owner.
pub const PACKAGE_MARKER: &str = "__init__.py";

/// Pattern → team, in manifest insertion order.
///
/// Re-inserting an existing pattern keeps its original position and takes
/// the newer team, like plain map insertion.
#[derive(Clone, Debug, Default)]
pub struct PathOwnershipIndex {
    entries: IndexMap<String, String>,
}

impl PathOwnershipIndex {
    pub fn build(manifest: &OwnershipManifest) -> Self {
        let mut entries: IndexMap<String, String> = IndexMap::new();
        for (team, pattern) in manifest.pairs() {
            entries.insert(pattern.to_string(), team.to_string());
            if pattern.ends_with('/') {
                let stripped = pattern.trim_end_matches('/');
                if !stripped.is_empty() {
                    entries.insert(stripped.to_string(), team.to_string());
                }
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    /// Team whose pattern equals `rel_path` exactly.
    pub fn exact(&self, rel_path: &str) -> Option<&str> {
        self.entries.get(rel_path).map(String::as_str)
    }

    /// Team of the first pattern, in insertion order, that is a directory
    /// prefix of `rel_path`. Not a longest-prefix match.
    pub fn first_prefix(&self, rel_path: &str) -> Option<&str> {
        self.iter()
            .find(|(pattern, _)| is_directory_prefix(pattern, rel_path))
            .map(|(_, team)| team)
    }

    /// Team of the longest pattern that is a directory prefix of `rel_path`.
    /// Ties keep the earlier entry.
    pub fn longest_prefix(&self, rel_path: &str) -> Option<&str> {
        let mut best: Option<(usize, &str)> = None;
        for (pattern, team) in self.iter() {
            if !is_directory_prefix(pattern, rel_path) {
                continue;
            }
            let depth = pattern.trim_end_matches('/').len();
            if best.map_or(true, |(best_depth, _)| depth > best_depth) {
                best = Some((depth, team));
            }
        }
        best.map(|(_, team)| team)
    }
}

/// True when `rel_path` lies strictly below the directory named by `pattern`.
///
/// Trailing separators are stripped before comparing, so `a/b/` and `a/b`
/// behave identically.
pub fn is_directory_prefix(pattern: &str, rel_path: &str) -> bool {
    let dir = pattern.trim_end_matches('/');
    if dir.is_empty() {
        return false;
    }
    rel_path
        .strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Settings directory → team, derived from package-marker patterns such as
/// `api/payments/model_settings/__init__.py`.
#[derive(Clone, Debug, Default)]
pub struct DirectoryOwnershipIndex {
    dirs: HashMap<String, String>,
}

impl DirectoryOwnershipIndex {
    pub fn build(index: &PathOwnershipIndex, settings_dir: &str) -> Self {
        let marker_suffix = format!("/{settings_dir}/{PACKAGE_MARKER}");
        let init_suffix = format!("/{PACKAGE_MARKER}");
        let mut dirs = HashMap::new();
        for (pattern, team) in index.iter() {
            if !pattern.ends_with(&marker_suffix) {
                continue;
            }
            if let Some(dir) = pattern.strip_suffix(&init_suffix) {
                dirs.insert(dir.to_string(), team.to_string());
            }
        }
        Self { dirs }
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn get(&self, dir: &str) -> Option<&str> {
        self.dirs.get(dir).map(String::as_str)
    }
}
