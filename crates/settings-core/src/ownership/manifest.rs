//! Ownership manifest loading.
//!
//! The manifest lists teams, each with nested systems, each with file
//! entries carrying a `path`. Only the flattened `(team, path)` pairs matter
//! to the resolver.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{SettingsError, SettingsResult};
use crate::models::{OwnershipManifest, Team};

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    #[serde(default)]
    teams: Vec<RawTeam>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTeam {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    systems: Vec<RawSystem>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSystem {
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    path: Option<String>,
}

/// Parse a manifest from YAML text.
///
/// Teams without a name are skipped. Every other entry is kept as written,
/// so a team listed twice appears twice and its patterns keep their place in
/// document order.
pub fn parse_manifest(yaml: &str) -> SettingsResult<OwnershipManifest> {
    if yaml.trim().is_empty() {
        return Ok(OwnershipManifest::default());
    }
    let raw: Option<RawManifest> = serde_yaml::from_str(yaml)?;
    let raw = raw.unwrap_or_default();

    let mut teams: Vec<Team> = Vec::new();
    for raw_team in raw.teams {
        let name = match raw_team.name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => {
                warn!("Skipping manifest team entry without a name");
                continue;
            }
        };
        let patterns: Vec<String> = raw_team
            .systems
            .into_iter()
            .flat_map(|system| system.files)
            .filter_map(|file| file.path)
            .map(|path| normalize_pattern(&path))
            .filter(|path| !path.is_empty())
            .collect();

        teams.push(Team::new(name, patterns));
    }

    Ok(OwnershipManifest::new(teams))
}

/// Read and parse the manifest at `path`. A missing or unreadable manifest
/// is fatal for the resolver run.
pub fn load_manifest(path: &Path) -> SettingsResult<OwnershipManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SettingsError::Manifest(format!("cannot read {}: {e}", path.display()))
    })?;
    let manifest = parse_manifest(&content)?;
    debug!(
        "Loaded ownership manifest {} with {} teams",
        path.display(),
        manifest.team_count()
    );
    Ok(manifest)
}

/// Trim whitespace, unify separators and drop a leading `./`. Trailing
/// separators are kept; the index decides how to treat them.
fn normalize_pattern(path: &str) -> String {
    let normalized = path.trim().replace('\\', "/");
    match normalized.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => normalized,
    }
}
