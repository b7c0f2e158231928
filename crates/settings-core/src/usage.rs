//! Usage classification and the joined settings view.
//!
//! The warehouse decides which settings are unused; this module only joins
//! that verdict onto the full settings list:
//! `in_use(name) = name ∈ all ∧ name ∉ unused`.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info};

use crate::errors::SettingsResult;
use crate::models::{ModelSetting, TeamSnapshot, UnusedSettingRow, WarehouseSettingRow};
use crate::warehouse::queries::{all_settings_sql, unused_settings_sql, WarehouseTables};
use crate::warehouse::Warehouse;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedSetting {
    pub row: WarehouseSettingRow,
    pub in_use: bool,
}

/// Join the two result sets. One output row per distinct name in `all`, in
/// `all` order; unused names missing from `all` are dropped.
pub fn classify_usage(
    all: &[WarehouseSettingRow],
    unused: &[UnusedSettingRow],
) -> Vec<ClassifiedSetting> {
    let unused: HashSet<&str> = unused.iter().map(|u| u.name.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(all.len());
    let mut out = Vec::with_capacity(all.len());
    for row in all {
        if !seen.insert(row.name.as_str()) {
            debug!("Ignoring duplicate settings row for {}", row.name);
            continue;
        }
        out.push(ClassifiedSetting {
            in_use: !unused.contains(row.name.as_str()),
            row: row.clone(),
        });
    }
    out
}

fn fetch_all<W: Warehouse + ?Sized>(
    warehouse: &W,
    tables: &WarehouseTables,
) -> SettingsResult<Vec<WarehouseSettingRow>> {
    warehouse
        .query(&all_settings_sql(tables))?
        .iter()
        .map(WarehouseSettingRow::from_row)
        .collect()
}

fn fetch_unused<W: Warehouse + ?Sized>(
    warehouse: &W,
    tables: &WarehouseTables,
) -> SettingsResult<Vec<UnusedSettingRow>> {
    warehouse
        .query(&unused_settings_sql(tables))?
        .iter()
        .map(UnusedSettingRow::from_row)
        .collect()
}

/// Run both queries concurrently and classify. Fails, without rows, when
/// either query fails.
pub fn fetch_usage<W: Warehouse + ?Sized>(
    warehouse: &W,
    tables: &WarehouseTables,
) -> SettingsResult<Vec<ClassifiedSetting>> {
    let started = Instant::now();
    let (all, unused) = rayon::join(
        || fetch_all(warehouse, tables),
        || fetch_unused(warehouse, tables),
    );
    let (all, unused) = (all?, unused?);
    let classified = classify_usage(&all, &unused);
    info!(
        "Classified {} settings ({} unused) in {}ms",
        classified.len(),
        classified.iter().filter(|c| !c.in_use).count(),
        started.elapsed().as_millis()
    );
    Ok(classified)
}

/// Attach owning teams from `snapshot` to classified settings.
pub fn join_settings(classified: &[ClassifiedSetting], snapshot: &TeamSnapshot) -> Vec<ModelSetting> {
    classified
        .iter()
        .map(|c| ModelSetting {
            name: c.row.name.clone(),
            description: c.row.description.clone(),
            created_date: c.row.created_date.clone(),
            team: snapshot.team_for(&c.row.name).to_string(),
            in_use: c.in_use,
        })
        .collect()
}
