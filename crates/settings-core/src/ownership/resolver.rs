//! Team-ownership resolution for setting-definition files.
//!
//! Each file is relativized against the code root, named by its `name=`
//! assignment (or its stem), and assigned a team through a cascade:
//!
//! 1. exact match of the relative path in the [`PathOwnershipIndex`];
//! 2. directory-prefix match, either the first one in manifest order
//!    ([`ResolutionStrategy::ManifestOrder`]) or the longest one
//!    ([`ResolutionStrategy::LongestPrefix`]);
//! 3. the file's parent directory in the [`DirectoryOwnershipIndex`];
//! 4. [`UNKNOWN_TEAM`].
//!
//! The mapping is keyed by setting name, so when two files yield the same
//! name the one later in the candidate list wins.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::errors::{SettingsError, SettingsResult};
use crate::models::{
    MappingSummary, OwnershipManifest, SettingFile, TeamMapping, TeamSnapshot,
    SNAPSHOT_SCHEMA_VERSION, UNKNOWN_TEAM,
};
use crate::ownership::extractor::{AssignmentExtractor, NameExtractor};
use crate::ownership::index::{DirectoryOwnershipIndex, PathOwnershipIndex};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// First directory-prefix match in manifest order wins.
    #[default]
    ManifestOrder,
    /// The deepest matching directory prefix wins.
    LongestPrefix,
}

impl ResolutionStrategy {
    pub fn parse(value: &str) -> SettingsResult<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "manifest-order" | "first-match" => Ok(ResolutionStrategy::ManifestOrder),
            "longest-prefix" => Ok(ResolutionStrategy::LongestPrefix),
            other => Err(SettingsError::Config(format!(
                "unknown resolution strategy {other:?}; expected manifest-order or longest-prefix"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::ManifestOrder => "manifest-order",
            ResolutionStrategy::LongestPrefix => "longest-prefix",
        }
    }
}

/// Which step of the cascade assigned the team.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
    Directory,
    Unmatched,
}

/// Outcome for a single setting file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub relative_path: String,
    pub name: String,
    pub team: String,
    pub kind: MatchKind,
}

/// Relativize `path` against `root`. The root is treated as a directory
/// (a trailing `/` is added when missing); paths outside it are kept whole.
pub fn relative_to_root(path: &Path, root: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    let mut root = root.to_string_lossy().replace('\\', "/");
    if !root.ends_with('/') {
        root.push('/');
    }
    match path.strip_prefix(&root) {
        Some(rel) => rel.to_string(),
        None => path,
    }
}

pub struct OwnershipResolver<E = AssignmentExtractor> {
    paths: PathOwnershipIndex,
    dirs: DirectoryOwnershipIndex,
    total_teams: usize,
    strategy: ResolutionStrategy,
    workers: usize,
    extractor: E,
}

impl OwnershipResolver<AssignmentExtractor> {
    pub fn new(manifest: &OwnershipManifest, settings_dir: &str) -> Self {
        let paths = PathOwnershipIndex::build(manifest);
        let dirs = DirectoryOwnershipIndex::build(&paths, settings_dir);
        debug!(
            "Built ownership index: {} patterns, {} package directories",
            paths.len(),
            dirs.len()
        );
        Self {
            paths,
            dirs,
            total_teams: manifest.team_count(),
            strategy: ResolutionStrategy::default(),
            workers: 1,
            extractor: AssignmentExtractor,
        }
    }
}

impl<E: NameExtractor> OwnershipResolver<E> {
    pub fn with_extractor<X: NameExtractor>(self, extractor: X) -> OwnershipResolver<X> {
        OwnershipResolver {
            paths: self.paths,
            dirs: self.dirs,
            total_teams: self.total_teams,
            strategy: self.strategy,
            workers: self.workers,
            extractor,
        }
    }

    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Number of threads used to read setting files.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Run the cascade for a path already relative to the code root.
    pub fn resolve_team(&self, rel_path: &str) -> (&str, MatchKind) {
        if let Some(team) = self.paths.exact(rel_path) {
            return (team, MatchKind::Exact);
        }
        let prefix = match self.strategy {
            ResolutionStrategy::ManifestOrder => self.paths.first_prefix(rel_path),
            ResolutionStrategy::LongestPrefix => self.paths.longest_prefix(rel_path),
        };
        if let Some(team) = prefix {
            return (team, MatchKind::Prefix);
        }
        let parent = rel_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        if let Some(team) = self.dirs.get(parent) {
            return (team, MatchKind::Directory);
        }
        (UNKNOWN_TEAM, MatchKind::Unmatched)
    }

    /// Setting name declared by `file`, falling back to its stem when the
    /// file has no recognizable assignment or cannot be read.
    pub fn setting_name(&self, file: &SettingFile) -> String {
        match std::fs::read_to_string(&file.path) {
            Ok(contents) => self
                .extractor
                .extract(&contents)
                .unwrap_or_else(|| file.base_name()),
            Err(e) => {
                debug!(
                    "Cannot read {}; using base name: {e}",
                    file.path.display()
                );
                file.base_name()
            }
        }
    }

    pub fn resolve_file(&self, file: &SettingFile, root: &Path) -> Resolution {
        let relative_path = relative_to_root(&file.path, root);
        let name = self.setting_name(file);
        let (team, kind) = self.resolve_team(&relative_path);
        Resolution {
            team: team.to_string(),
            relative_path,
            name,
            kind,
        }
    }

    /// Resolve every file. Output order equals input order regardless of
    /// how reads are scheduled.
    pub fn resolve_all(&self, files: &[SettingFile], root: &Path) -> Vec<Resolution> {
        if files.is_empty() {
            return vec![];
        }
        if self.workers <= 1 {
            return files.iter().map(|f| self.resolve_file(f, root)).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                files
                    .par_iter()
                    .map(|f| self.resolve_file(f, root))
                    .collect()
            }),
            Err(_) => files.iter().map(|f| self.resolve_file(f, root)).collect(),
        }
    }

    /// Resolve `files` and assemble the snapshot document.
    pub fn run(&self, files: &[SettingFile], root: &Path) -> TeamSnapshot {
        let started = Instant::now();
        let resolutions = self.resolve_all(files, root);
        let snapshot = build_snapshot(&resolutions, self.total_teams, self.strategy);
        info!(
            "Resolved {} setting files into {} settings ({} matched, {} unmatched) in {}ms",
            snapshot.summary.files_scanned,
            snapshot.summary.total_settings,
            snapshot.summary.matched_count,
            snapshot.summary.unmatched_count,
            started.elapsed().as_millis()
        );
        snapshot
    }
}

/// Fold resolutions, in order, into a snapshot. Counts are per file;
/// `total_settings` counts distinct names.
pub fn build_snapshot(
    resolutions: &[Resolution],
    total_teams: usize,
    strategy: ResolutionStrategy,
) -> TeamSnapshot {
    let mut mapping = TeamMapping::new();
    let mut team_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut matched_count = 0usize;
    let mut unmatched_count = 0usize;

    for resolution in resolutions {
        if let Some(previous) = mapping.insert(resolution.name.clone(), resolution.team.clone()) {
            debug!(
                "Setting {} redefined in {}; {} replaces {previous}",
                resolution.name, resolution.relative_path, resolution.team
            );
        }
        *team_counts.entry(resolution.team.clone()).or_default() += 1;
        if resolution.kind == MatchKind::Unmatched {
            unmatched_count += 1;
        } else {
            matched_count += 1;
        }
    }

    let summary = MappingSummary {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        total_settings: mapping.len(),
        total_teams,
        matched_count,
        unmatched_count,
        files_scanned: resolutions.len(),
        team_counts,
        strategy: strategy.as_str().to_string(),
        mapping_sha256: mapping_digest(&mapping),
        generated_at: chrono::Utc::now().to_rfc3339(),
    };
    TeamSnapshot { summary, mapping }
}

/// SHA-256 of the canonical JSON encoding of `mapping`.
pub fn mapping_digest(mapping: &TeamMapping) -> String {
    let encoded = serde_json::to_string(mapping).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    format!("{:x}", hasher.finalize())
}
