//! Shared typed models used across ownership resolution, warehouse access and
//! the service layer.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Contract constants
// ---------------------------------------------------------------------------

/// Team assigned to a setting whose definition file matched no manifest entry.
pub const UNKNOWN_TEAM: &str = "Unknown";

/// Version of the snapshot document layout written by the resolver.
pub const SNAPSHOT_SCHEMA_VERSION: i64 = 1;

/// Setting name → owning team name.
///
/// A `BTreeMap` so that serializing the same mapping twice is byte-identical.
pub type TeamMapping = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Ownership manifest
// ---------------------------------------------------------------------------

/// One team and the path patterns it owns, in manifest order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub patterns: Vec<String>,
}

impl Team {
    pub fn new(name: impl Into<String>, patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            patterns,
        }
    }
}

/// Ordered collection of teams. Order matters: the manifest-order prefix scan
/// resolves overlapping patterns in favour of the earlier entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnershipManifest {
    pub teams: Vec<Team>,
}

impl OwnershipManifest {
    pub fn new(teams: Vec<Team>) -> Self {
        Self { teams }
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Number of distinct team names; a team may be listed more than once.
    pub fn team_count(&self) -> usize {
        self.teams
            .iter()
            .map(|team| team.name.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Flattened `(team, pattern)` pairs in manifest order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.teams.iter().flat_map(|team| {
            team.patterns
                .iter()
                .map(move |pattern| (team.name.as_str(), pattern.as_str()))
        })
    }
}

// ---------------------------------------------------------------------------
// Setting files
// ---------------------------------------------------------------------------

/// A discovered setting-definition file. The setting name is extracted from
/// its contents at resolution time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SettingFile {
    pub path: PathBuf,
}

impl SettingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File name without its extension, used when no name can be extracted.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Aggregate figures for one resolver run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSummary {
    #[serde(default)]
    pub schema_version: i64,
    pub total_settings: usize,
    pub total_teams: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    #[serde(default)]
    pub files_scanned: usize,
    #[serde(default)]
    pub team_counts: BTreeMap<String, usize>,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub mapping_sha256: String,
    #[serde(default)]
    pub generated_at: String,
}

/// The document persisted by the resolver and loaded by the service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub summary: MappingSummary,
    pub mapping: TeamMapping,
}

impl TeamSnapshot {
    /// Owning team for `name`, or [`UNKNOWN_TEAM`] when unmapped.
    pub fn team_for(&self, name: &str) -> &str {
        self.mapping
            .get(name)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TEAM)
    }
}

// ---------------------------------------------------------------------------
// Warehouse rows
// ---------------------------------------------------------------------------

/// One row of the "all settings" query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseSettingRow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_date: String,
}

/// One row of the "unused settings" query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedSettingRow {
    pub name: String,
}

/// A value recorded for a provider, business unit or user that supersedes the
/// default of a setting in one pod.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverrideRow {
    pub name: String,
    pub pod: String,
    pub override_type: String,
    pub target_id: String,
    pub value: String,
    pub percentage: f64,
}

/// The joined view rendered by the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSetting {
    pub name: String,
    pub description: String,
    pub created_date: String,
    pub team: String,
    #[serde(rename = "inUse")]
    pub in_use: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_strips_extension() {
        let file = SettingFile::new("/repo/api/model_settings/foo_flag.py");
        assert_eq!(file.base_name(), "foo_flag");
    }

    #[test]
    fn test_manifest_pairs_preserve_order() {
        let manifest = OwnershipManifest::new(vec![
            Team::new("A", vec!["a/".to_string(), "b.py".to_string()]),
            Team::new("B", vec!["c/".to_string()]),
        ]);
        let pairs: Vec<_> = manifest.pairs().collect();
        assert_eq!(pairs, vec![("A", "a/"), ("A", "b.py"), ("B", "c/")]);
    }

    #[test]
    fn test_team_for_defaults_to_unknown() {
        let mut snapshot = TeamSnapshot::default();
        snapshot
            .mapping
            .insert("foo".to_string(), "Payments".to_string());
        assert_eq!(snapshot.team_for("foo"), "Payments");
        assert_eq!(snapshot.team_for("bar"), UNKNOWN_TEAM);
    }

    #[test]
    fn test_model_setting_serializes_in_use_flag() {
        let setting = ModelSetting {
            name: "foo".to_string(),
            description: String::new(),
            created_date: "2023-01-01".to_string(),
            team: "Payments".to_string(),
            in_use: true,
        };
        let value = serde_json::to_value(&setting).unwrap();
        assert_eq!(value["inUse"], serde_json::json!(true));
        assert_eq!(value["created_date"], serde_json::json!("2023-01-01"));
    }
}
