//! Discovery of setting-definition files under a code root.

use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use crate::models::SettingFile;
use crate::ownership::index::PACKAGE_MARKER;

const SETTING_EXTENSION: &str = "py";

const IMPLICIT_IGNORED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "build",
    "dist",
    "node_modules",
    ".venv",
    ".mypy_cache",
    ".pytest_cache",
];

/// Exclude-pattern match against a `/`-separated relative path.
///
/// A pattern without `/` is tested against every path component, so
/// `test_*` excludes any file or directory with that prefix. A pattern with
/// `/` is anchored at the code root and matched component by component:
/// `*` and `?` never cross a separator, `**` spans any number of components.
fn matches_pattern(rel_path: &str, pattern: &str) -> bool {
    let pattern = pattern.trim_end_matches('/');
    if pattern.is_empty() {
        return false;
    }
    let components: Vec<&str> = rel_path.split('/').filter(|c| !c.is_empty()).collect();
    if !pattern.contains('/') {
        return components.iter().any(|c| component_match(c, pattern));
    }
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
    path_match(&components, &pattern_parts)
}

fn path_match(components: &[&str], pattern: &[&str]) -> bool {
    match pattern.split_first() {
        None => components.is_empty(),
        Some((&"**", rest)) => {
            (0..=components.len()).any(|skip| path_match(&components[skip..], rest))
        }
        Some((head, rest)) => match components.split_first() {
            Some((component, remaining)) => {
                component_match(component, head) && path_match(remaining, rest)
            }
            None => false,
        },
    }
}

/// `*` / `?` wildcard match within a single path component.
fn component_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

fn relative_path(entry: &DirEntry, root: &Path) -> String {
    entry
        .path()
        .strip_prefix(root)
        .unwrap_or(entry.path())
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_excluded(rel_path: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|pattern| {
        let dir = pattern.trim_end_matches('/');
        matches_pattern(rel_path, pattern)
            || (!dir.is_empty() && (rel_path == dir || rel_path.starts_with(&format!("{dir}/"))))
    })
}

/// Collect setting-definition files below `root`.
///
/// A candidate is a `.py` file with a `settings_dir` component somewhere in
/// its relative path. Package markers, cache/build directories and anything
/// matching `exclude_patterns` are skipped. The result is sorted by path so
/// repeated runs see the same order.
pub fn discover_setting_files(
    root: &Path,
    settings_dir: &str,
    exclude_patterns: &[String],
) -> Vec<SettingFile> {
    let excludes: Vec<String> = exclude_patterns
        .iter()
        .map(|p| p.trim().trim_start_matches("./").to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if IMPLICIT_IGNORED_DIRS.iter().any(|ignored| name == *ignored) {
                return false;
            }
            !is_excluded(&relative_path(entry, root), &excludes)
        });

    let mut files: Vec<SettingFile> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SETTING_EXTENSION) {
                return false;
            }
            if entry.file_name() == PACKAGE_MARKER {
                return false;
            }
            let rel = relative_path(entry, root);
            let in_settings_dir = rel
                .split('/')
                .rev()
                .skip(1)
                .any(|component| component == settings_dir);
            in_settings_dir && !is_excluded(&rel, &excludes)
        })
        .map(|entry| SettingFile::new(entry.into_path()))
        .collect();

    files.sort();
    files
}
