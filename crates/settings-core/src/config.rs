//! Runtime configuration read from `MODEL_SETTINGS_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{SettingsError, SettingsResult};
use crate::ownership::resolver::ResolutionStrategy;
use crate::warehouse::queries::WarehouseTables;

pub const DEFAULT_SNAPSHOT_PATH: &str = "team_mapping.json";
pub const DEFAULT_SETTINGS_DIR: &str = "model_settings";
pub const DEFAULT_WAREHOUSE_COMMAND: &str = "snow sql --format json -q";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_WORKERS: usize = 4;

/// Which warehouse backend queries are sent to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WarehouseBackend {
    /// External command-line client; the SQL text is appended as last argument.
    Cli { program: String, args: Vec<String> },
    /// Local SQLite replica evaluating the same SQL.
    Sqlite { path: PathBuf },
}

impl WarehouseBackend {
    /// Parse `cli`, `sqlite:<path>` or a bare command line.
    pub fn parse(spec: &str, command: &str) -> SettingsResult<Self> {
        let spec = spec.trim();
        if let Some(path) = spec.strip_prefix("sqlite:") {
            if path.trim().is_empty() {
                return Err(SettingsError::Config(
                    "sqlite warehouse requires a path (sqlite:<path>)".to_string(),
                ));
            }
            return Ok(WarehouseBackend::Sqlite {
                path: PathBuf::from(path.trim()),
            });
        }
        if !spec.is_empty() && spec != "cli" {
            return Err(SettingsError::Config(format!(
                "unknown warehouse backend {spec:?}; expected `cli` or `sqlite:<path>`"
            )));
        }
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            SettingsError::Config("warehouse command must not be empty".to_string())
        })?;
        Ok(WarehouseBackend::Cli {
            program,
            args: parts.collect(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub manifest_path: Option<PathBuf>,
    pub code_root: PathBuf,
    pub snapshot_path: PathBuf,
    pub settings_dir: String,
    pub exclude_patterns: Vec<String>,
    pub strategy: ResolutionStrategy,
    pub workers: usize,
    pub warehouse: WarehouseBackend,
    pub query_timeout: Duration,
    pub tables: WarehouseTables,
    pub json_logs: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            code_root: PathBuf::from("."),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            settings_dir: DEFAULT_SETTINGS_DIR.to_string(),
            exclude_patterns: Vec::new(),
            strategy: ResolutionStrategy::ManifestOrder,
            workers: DEFAULT_WORKERS,
            warehouse: WarehouseBackend::Cli {
                program: "snow".to_string(),
                args: vec![
                    "sql".to_string(),
                    "--format".to_string(),
                    "json".to_string(),
                    "-q".to_string(),
                ],
            },
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            tables: WarehouseTables::default(),
            json_logs: false,
        }
    }
}

impl DashboardConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> SettingsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Unset or blank
    /// keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> SettingsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(v) = get("MODEL_SETTINGS_MANIFEST") {
            config.manifest_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MODEL_SETTINGS_CODE_ROOT") {
            config.code_root = PathBuf::from(v);
        }
        if let Some(v) = get("MODEL_SETTINGS_SNAPSHOT") {
            config.snapshot_path = PathBuf::from(v);
        }
        if let Some(v) = get("MODEL_SETTINGS_SETTINGS_DIR") {
            config.settings_dir = v;
        }
        if let Some(v) = get("MODEL_SETTINGS_EXCLUDE") {
            config.exclude_patterns = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("MODEL_SETTINGS_RESOLUTION") {
            config.strategy = ResolutionStrategy::parse(&v)?;
        }
        if let Some(v) = get("MODEL_SETTINGS_WORKERS") {
            config.workers = parse_number::<usize>("MODEL_SETTINGS_WORKERS", &v)?.max(1);
        }
        let command = get("MODEL_SETTINGS_WAREHOUSE_CMD")
            .unwrap_or_else(|| DEFAULT_WAREHOUSE_COMMAND.to_string());
        let backend = get("MODEL_SETTINGS_WAREHOUSE").unwrap_or_else(|| "cli".to_string());
        config.warehouse = WarehouseBackend::parse(&backend, &command)?;
        if let Some(v) = get("MODEL_SETTINGS_QUERY_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("MODEL_SETTINGS_QUERY_TIMEOUT_SECS", &v)?;
            config.query_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(v) = get("MODEL_SETTINGS_SETTINGS_TABLE") {
            config.tables.settings = v;
        }
        if let Some(v) = get("MODEL_SETTINGS_OVERRIDES_TABLE") {
            config.tables.overrides = v;
        }
        config.tables.validate()?;
        if let Some(v) = get("MODEL_SETTINGS_LOG_FORMAT") {
            config.json_logs = v.eq_ignore_ascii_case("json");
        }

        Ok(config)
    }

    /// The manifest path, or a config error when none was configured.
    pub fn require_manifest(&self) -> SettingsResult<&PathBuf> {
        self.manifest_path.as_ref().ok_or_else(|| {
            SettingsError::Config(
                "no ownership manifest configured (set MODEL_SETTINGS_MANIFEST)".to_string(),
            )
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> SettingsResult<T> {
    value
        .parse::<T>()
        .map_err(|_| SettingsError::Config(format!("{key} must be a number, got {value:?}")))
}
