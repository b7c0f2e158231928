//! Python bindings for the existing dashboard tooling.

use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::wrap_pyfunction;

use crate::config::DashboardConfig;
use crate::models::{UnusedSettingRow, WarehouseSettingRow};
use crate::ownership::pipeline;
use crate::ownership::resolver::ResolutionStrategy;
use crate::usage;
use crate::warehouse::rows::parse_rows;

/// Resolve ownership for every setting file under `code_root` and write the
/// snapshot to `snapshot_path`. Returns the run summary.
#[pyfunction]
#[pyo3(signature = (manifest_path, code_root, snapshot_path, settings_dir="model_settings", strategy="manifest-order", workers=4))]
pub fn generate_team_mapping(
    py: Python<'_>,
    manifest_path: &str,
    code_root: &str,
    snapshot_path: &str,
    settings_dir: &str,
    strategy: &str,
    workers: usize,
) -> PyResult<PyObject> {
    let config = DashboardConfig {
        manifest_path: Some(PathBuf::from(manifest_path)),
        code_root: PathBuf::from(code_root),
        snapshot_path: PathBuf::from(snapshot_path),
        settings_dir: settings_dir.to_string(),
        strategy: ResolutionStrategy::parse(strategy)?,
        workers: workers.max(1),
        ..DashboardConfig::default()
    };
    let snapshot = py.allow_threads(|| pipeline::generate_team_mapping(&config))?;
    let summary = &snapshot.summary;

    let result = PyDict::new(py);
    result.set_item("total_settings", summary.total_settings)?;
    result.set_item("total_teams", summary.total_teams)?;
    result.set_item("matched_count", summary.matched_count)?;
    result.set_item("unmatched_count", summary.unmatched_count)?;
    result.set_item("files_scanned", summary.files_scanned)?;
    result.set_item("team_counts", summary.team_counts.clone())?;
    result.set_item("mapping_sha256", summary.mapping_sha256.as_str())?;
    result.set_item("generated_at", summary.generated_at.as_str())?;
    Ok(result.into())
}

/// Classify warehouse output given as JSON text. Returns `{name: in_use}`.
#[pyfunction]
pub fn classify_usage(py: Python<'_>, all_json: &str, unused_json: &str) -> PyResult<PyObject> {
    let all = parse_rows(all_json)?
        .iter()
        .map(WarehouseSettingRow::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let unused = parse_rows(unused_json)?
        .iter()
        .map(UnusedSettingRow::from_row)
        .collect::<Result<Vec<_>, _>>()?;

    let result = PyDict::new(py);
    for classified in usage::classify_usage(&all, &unused) {
        result.set_item(classified.row.name, classified.in_use)?;
    }
    Ok(result.into())
}

#[pymodule]
fn settings_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("UNKNOWN_TEAM", crate::models::UNKNOWN_TEAM)?;
    m.add_function(wrap_pyfunction!(generate_team_mapping, m)?)?;
    m.add_function(wrap_pyfunction!(classify_usage, m)?)?;
    Ok(())
}
