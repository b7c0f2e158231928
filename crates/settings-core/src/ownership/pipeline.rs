//! End-to-end team mapping generation: manifest → discovery → resolution →
//! snapshot file.

use tracing::info;

use crate::config::DashboardConfig;
use crate::errors::SettingsResult;
use crate::models::TeamSnapshot;
use crate::ownership::discovery::discover_setting_files;
use crate::ownership::manifest::load_manifest;
use crate::ownership::resolver::OwnershipResolver;
use crate::ownership::snapshot::write_snapshot;

/// Build a fresh snapshot from the configured manifest and code root without
/// touching the snapshot file.
pub fn build_team_mapping(config: &DashboardConfig) -> SettingsResult<TeamSnapshot> {
    let manifest = load_manifest(config.require_manifest()?)?;
    let files = discover_setting_files(
        &config.code_root,
        &config.settings_dir,
        &config.exclude_patterns,
    );
    info!(
        "Discovered {} setting files under {}",
        files.len(),
        config.code_root.display()
    );
    let resolver = OwnershipResolver::new(&manifest, &config.settings_dir)
        .with_strategy(config.strategy)
        .with_workers(config.workers);
    Ok(resolver.run(&files, &config.code_root))
}

/// Build a fresh snapshot and overwrite `config.snapshot_path` with it.
/// Nothing is written when the manifest cannot be loaded.
pub fn generate_team_mapping(config: &DashboardConfig) -> SettingsResult<TeamSnapshot> {
    let snapshot = build_team_mapping(config)?;
    write_snapshot(&config.snapshot_path, &snapshot)?;
    info!(
        "Wrote team mapping snapshot to {}",
        config.snapshot_path.display()
    );
    Ok(snapshot)
}
