//! Service layer behind the dashboard endpoints.
//!
//! Holds the team-mapping snapshot and the last joined settings view, each
//! as an immutable value behind a swapped `Arc`.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::errors::SettingsResult;
use crate::models::{MappingSummary, ModelSetting, OverrideRow, TeamSnapshot};
use crate::ownership::pipeline::generate_team_mapping;
use crate::ownership::snapshot::SnapshotStore;
use crate::usage::{fetch_usage, join_settings, ClassifiedSetting};
use crate::warehouse::queries::setting_overrides_sql;
use crate::warehouse::Warehouse;

/// Uniform response wrapper: `{success, data, count, error?}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T, count: usize) -> Self {
        Self {
            success: true,
            data: Some(data),
            count,
            error: None,
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            count: 0,
            error: Some(error.to_string()),
        }
    }
}

impl<T> ApiEnvelope<Vec<T>> {
    pub fn from_list(result: SettingsResult<Vec<T>>) -> Self {
        match result {
            Ok(items) => {
                let count = items.len();
                Self::ok(items, count)
            }
            Err(e) => Self::failure(e),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub mapped_settings: usize,
    pub snapshot_generated_at: String,
    pub cached_settings: Option<usize>,
}

/// Optional filters for [`SettingsService::list_settings`].
#[derive(Clone, Debug, Default)]
pub struct SettingsFilter {
    pub team: Option<String>,
    pub unused_only: bool,
}

impl SettingsFilter {
    fn matches(&self, setting: &ModelSetting) -> bool {
        if self.unused_only && setting.in_use {
            return false;
        }
        match &self.team {
            Some(team) => setting.team.eq_ignore_ascii_case(team),
            None => true,
        }
    }
}

pub struct SettingsService<W> {
    config: DashboardConfig,
    warehouse: W,
    snapshots: SnapshotStore,
    usage: RwLock<Option<Arc<Vec<ClassifiedSetting>>>>,
}

impl<W: Warehouse> SettingsService<W> {
    /// Build the service, loading the snapshot file named in `config`. A
    /// missing or corrupt snapshot yields an empty mapping.
    pub fn new(config: DashboardConfig, warehouse: W) -> Self {
        let snapshots = SnapshotStore::load_or_empty(&config.snapshot_path);
        Self::with_snapshot_store(config, warehouse, snapshots)
    }

    pub fn with_snapshot_store(
        config: DashboardConfig,
        warehouse: W,
        snapshots: SnapshotStore,
    ) -> Self {
        Self {
            config,
            warehouse,
            snapshots,
            usage: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<TeamSnapshot> {
        self.snapshots.current()
    }

    fn cached_usage(&self) -> Option<Arc<Vec<ClassifiedSetting>>> {
        self.usage.read().clone()
    }

    /// Query the warehouse and replace the cached usage. On failure the
    /// previous cache is kept.
    pub fn refresh_settings(&self) -> SettingsResult<usize> {
        let classified = fetch_usage(&self.warehouse, &self.config.tables).map_err(|e| {
            warn!("Settings refresh failed: {e}");
            e
        })?;
        let count = classified.len();
        *self.usage.write() = Some(Arc::new(classified));
        info!("Refreshed {count} settings from the warehouse");
        Ok(count)
    }

    /// The joined settings view, querying the warehouse on first use.
    pub fn list_settings(&self, filter: &SettingsFilter) -> SettingsResult<Vec<ModelSetting>> {
        let usage = match self.cached_usage() {
            Some(usage) => usage,
            None => {
                self.refresh_settings()?;
                self.cached_usage().unwrap_or_default()
            }
        };
        let snapshot = self.snapshots.current();
        Ok(join_settings(&usage, &snapshot)
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    /// Regenerate the ownership snapshot file and install it. On failure the
    /// current snapshot stays in place.
    pub fn refresh_ownership(&self) -> SettingsResult<MappingSummary> {
        let snapshot = generate_team_mapping(&self.config).map_err(|e| {
            warn!("Ownership refresh failed, keeping current snapshot: {e}");
            e
        })?;
        let summary = snapshot.summary.clone();
        self.snapshots.replace(snapshot);
        Ok(summary)
    }

    /// Re-read the snapshot file written by an out-of-process resolver run.
    pub fn reload_snapshot(&self) -> SettingsResult<MappingSummary> {
        let snapshot = self.snapshots.reload(&self.config.snapshot_path)?;
        Ok(snapshot.summary.clone())
    }

    pub fn setting_overrides(&self, name: &str) -> SettingsResult<Vec<OverrideRow>> {
        self.warehouse
            .query(&setting_overrides_sql(&self.config.tables, name))?
            .iter()
            .map(OverrideRow::from_row)
            .collect()
    }

    pub fn health(&self) -> HealthReport {
        let snapshot = self.snapshots.current();
        HealthReport {
            status: "ok",
            mapped_settings: snapshot.mapping.len(),
            snapshot_generated_at: snapshot.summary.generated_at.clone(),
            cached_settings: self.cached_usage().map(|u| u.len()),
        }
    }
}
