//! SQL texts sent to the warehouse.
//!
//! The same statements run against the production warehouse through its CLI
//! and against a local SQLite replica, so they stick to portable SQL:
//! `CASE`, `COALESCE`, `COUNT(DISTINCT ...)`, no dialect functions.
//! Column aliases are upper case as the production warehouse reports them;
//! rows are normalized to lower-case keys on the way in.

use crate::errors::{SettingsError, SettingsResult};

pub const DEFAULT_SETTINGS_TABLE: &str = "model_settings";
pub const DEFAULT_OVERRIDES_TABLE: &str = "model_setting_overrides";

/// Stand-in for SQL NULL when comparing setting values.
const NULL_VALUE: &str = "<null>";

/// Fully qualified table names. Only `[A-Za-z0-9_.]` is accepted since the
/// names are spliced into SQL text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarehouseTables {
    /// One row per setting per pod: `name, description, created_date, pod,
    /// base_value, conditional_schema`.
    pub settings: String,
    /// One row per override: `name, pod, override_type, target_id, value,
    /// percentage`.
    pub overrides: String,
}

impl Default for WarehouseTables {
    fn default() -> Self {
        Self {
            settings: DEFAULT_SETTINGS_TABLE.to_string(),
            overrides: DEFAULT_OVERRIDES_TABLE.to_string(),
        }
    }
}

impl WarehouseTables {
    pub fn validate(&self) -> SettingsResult<()> {
        for table in [&self.settings, &self.overrides] {
            let valid = !table.is_empty()
                && !table.starts_with('.')
                && !table.ends_with('.')
                && table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            if !valid {
                return Err(SettingsError::Config(format!(
                    "invalid warehouse table name {table:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Quote `value` as a SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Distinct settings with their description and first creation date.
pub fn all_settings_sql(tables: &WarehouseTables) -> String {
    format!(
        "SELECT s.name AS NAME, \
                COALESCE(MAX(s.description), '') AS DESCRIPTION, \
                COALESCE(MIN(s.created_date), '') AS CREATED_DATE \
         FROM {settings} s \
         GROUP BY s.name \
         ORDER BY s.name;",
        settings = tables.settings,
    )
}

/// Settings nobody changes: across every pod there is no conditional schema,
/// exactly one distinct base value, no override with another value and no
/// override at partial activation.
///
/// Overrides join on name only, so an override in a pod without a base row
/// still counts against the setting. A NULL base value or override value is
/// compared as a value of its own: NULL in one pod and `x` in another are two
/// distinct defaults.
pub fn unused_settings_sql(tables: &WarehouseTables) -> String {
    let base = format!("COALESCE(s.base_value, {})", sql_literal(NULL_VALUE));
    let value = format!("COALESCE(o.value, {})", sql_literal(NULL_VALUE));
    format!(
        "SELECT s.name AS NAME \
         FROM {settings} s \
         LEFT JOIN {overrides} o ON o.name = s.name \
         GROUP BY s.name \
         HAVING SUM(CASE WHEN s.conditional_schema IS NOT NULL \
                          AND s.conditional_schema <> '' THEN 1 ELSE 0 END) = 0 \
            AND COUNT(DISTINCT {base}) = 1 \
            AND SUM(CASE WHEN o.name IS NOT NULL \
                          AND {value} <> {base} THEN 1 ELSE 0 END) = 0 \
            AND SUM(CASE WHEN o.name IS NOT NULL \
                          AND COALESCE(o.percentage, 100) <> 100 THEN 1 ELSE 0 END) = 0 \
         ORDER BY s.name;",
        settings = tables.settings,
        overrides = tables.overrides,
    )
}

/// Every override recorded for one setting.
pub fn setting_overrides_sql(tables: &WarehouseTables, name: &str) -> String {
    format!(
        "SELECT o.name AS NAME, o.pod AS POD, o.override_type AS OVERRIDE_TYPE, \
                o.target_id AS TARGET_ID, o.value AS VALUE, \
                COALESCE(o.percentage, 100) AS PERCENTAGE \
         FROM {overrides} o \
         WHERE o.name = {name} \
         ORDER BY o.pod, o.override_type, o.target_id;",
        overrides = tables.overrides,
        name = sql_literal(name),
    )
}
