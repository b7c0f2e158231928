//! Error types for the settings core library.

/// Top-level error enum for the settings core library.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Warehouse query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Malformed query output: {0}")]
    MalformedOutput(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SettingsError {
    /// True for failures of the warehouse round trip itself, as opposed to
    /// local configuration or filesystem problems.
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            SettingsError::Warehouse(_)
                | SettingsError::Timeout { .. }
                | SettingsError::MalformedOutput(_)
                | SettingsError::Sqlite(_)
        )
    }
}

#[cfg(feature = "python")]
impl From<SettingsError> for pyo3::PyErr {
    fn from(err: SettingsError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyTimeoutError, PyValueError};
        match &err {
            SettingsError::Io(_) => PyIOError::new_err(err.to_string()),
            SettingsError::Timeout { .. } => PyTimeoutError::new_err(err.to_string()),
            SettingsError::Manifest(_)
            | SettingsError::Json(_)
            | SettingsError::Yaml(_)
            | SettingsError::Config(_)
            | SettingsError::MalformedOutput(_) => PyValueError::new_err(err.to_string()),
            SettingsError::Warehouse(_)
            | SettingsError::Snapshot(_)
            | SettingsError::Sqlite(_) => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;
