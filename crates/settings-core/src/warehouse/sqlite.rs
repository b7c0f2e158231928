//! SQLite-backed warehouse replica.
//!
//! Holds the settings and overrides tables in the same shape as the
//! production warehouse and evaluates the very same SQL, which makes it the
//! backend for local runs and for fixtures.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::errors::SettingsResult;
use crate::warehouse::queries::WarehouseTables;
use crate::warehouse::rows::{normalize_row, Row};
use crate::warehouse::Warehouse;

/// DDL for the replica tables, with `{settings}` / `{overrides}` placeholders.
const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS {settings} (
        name TEXT NOT NULL,
        description TEXT,
        created_date TEXT,
        pod TEXT NOT NULL,
        base_value TEXT,
        conditional_schema TEXT,
        PRIMARY KEY(name, pod)
    );",
    "CREATE TABLE IF NOT EXISTS {overrides} (
        name TEXT NOT NULL,
        pod TEXT NOT NULL,
        override_type TEXT NOT NULL,
        target_id TEXT NOT NULL,
        value TEXT,
        percentage REAL DEFAULT 100
    );",
    "CREATE INDEX IF NOT EXISTS idx_{overrides_ident}_name ON {overrides}(name);",
];

/// Build a JSON row from the current row of a statement using column names.
fn row_to_json(row: &rusqlite::Row<'_>, col_names: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (i, name) in col_names.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::from(v),
            ValueRef::Real(v) => serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
            ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
        };
        out.insert(name.clone(), value);
    }
    Ok(out)
}

#[derive(Clone, Debug)]
pub struct SqliteWarehouse {
    db_path: PathBuf,
    tables: WarehouseTables,
}

impl SqliteWarehouse {
    pub fn new(db_path: impl Into<PathBuf>, tables: WarehouseTables) -> Self {
        Self {
            db_path: db_path.into(),
            tables,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> SettingsResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Create the replica tables if they do not exist yet.
    pub fn init_schema(&self) -> SettingsResult<()> {
        let conn = self.connect()?;
        let overrides_ident = self.tables.overrides.replace('.', "_");
        for stmt in SCHEMA_STATEMENTS {
            let sql = stmt
                .replace("{settings}", &self.tables.settings)
                .replace("{overrides_ident}", &overrides_ident)
                .replace("{overrides}", &self.tables.overrides);
            conn.execute_batch(&sql)?;
        }
        Ok(())
    }

    /// Insert or replace the default of `name` in `pod`.
    pub fn upsert_setting(
        &self,
        name: &str,
        pod: &str,
        description: &str,
        created_date: &str,
        base_value: &str,
        conditional_schema: Option<&str>,
    ) -> SettingsResult<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {}(\
                     name, pod, description, created_date, base_value, conditional_schema\
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                self.tables.settings
            ),
            params![name, pod, description, created_date, base_value, conditional_schema],
        )?;
        Ok(())
    }

    pub fn insert_override(
        &self,
        name: &str,
        pod: &str,
        override_type: &str,
        target_id: &str,
        value: &str,
        percentage: f64,
    ) -> SettingsResult<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO {}(name, pod, override_type, target_id, value, percentage) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                self.tables.overrides
            ),
            params![name, pod, override_type, target_id, value, percentage],
        )?;
        Ok(())
    }
}

impl Warehouse for SqliteWarehouse {
    fn query(&self, sql: &str) -> SettingsResult<Vec<Row>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let col_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows_out = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            rows_out.push(normalize_row(row_to_json(row, &col_names)?));
        }
        Ok(rows_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use crate::warehouse::queries::{all_settings_sql, unused_settings_sql};

    fn replica() -> (tempfile::TempDir, SqliteWarehouse) {
        let dir = tempfile::tempdir().unwrap();
        let wh = SqliteWarehouse::new(dir.path().join("replica.db"), WarehouseTables::default());
        wh.init_schema().unwrap();
        (dir, wh)
    }

    fn unused_names(wh: &SqliteWarehouse) -> Vec<String> {
        wh.query(&unused_settings_sql(&WarehouseTables::default()))
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let (_dir, wh) = replica();
        wh.init_schema().unwrap();
    }

    #[test]
    fn test_query_normalizes_upper_case_aliases() {
        let (_dir, wh) = replica();
        wh.upsert_setting("a", "us1", "first", "2023-01-01", "0", None)
            .unwrap();
        let rows = wh.query(&all_settings_sql(&WarehouseTables::default())).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("a"));
        assert_eq!(rows[0]["description"], Value::from("first"));
        assert_eq!(rows[0]["created_date"], Value::from("2023-01-01"));
    }

    #[test]
    fn test_all_settings_collapses_pods() {
        let (_dir, wh) = replica();
        wh.upsert_setting("a", "us1", "desc", "2023-02-01", "0", None)
            .unwrap();
        wh.upsert_setting("a", "eu1", "desc", "2023-01-01", "0", None)
            .unwrap();
        wh.upsert_setting("b", "us1", "", "2024-01-01", "1", None)
            .unwrap();
        let rows = wh.query(&all_settings_sql(&WarehouseTables::default())).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["created_date"], Value::from("2023-01-01"));
    }

    #[test]
    fn test_single_uniform_default_is_unused() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", None)
            .unwrap();
        wh.upsert_setting("flag", "eu1", "", "2023-01-01", "false", None)
            .unwrap();
        assert_eq!(unused_names(&wh), vec!["flag"]);
    }

    #[test]
    fn test_override_with_same_value_at_full_activation_stays_unused() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", None)
            .unwrap();
        wh.insert_override("flag", "us1", "provider", "p1", "false", 100.0)
            .unwrap();
        assert_eq!(unused_names(&wh), vec!["flag"]);
    }

    #[test]
    fn test_override_with_different_value_is_used() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", None)
            .unwrap();
        wh.insert_override("flag", "us1", "provider", "p1", "true", 100.0)
            .unwrap();
        assert!(unused_names(&wh).is_empty());
    }

    #[test]
    fn test_partial_activation_is_used() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", None)
            .unwrap();
        wh.insert_override("flag", "us1", "business_unit", "bu9", "true", 40.0)
            .unwrap();
        assert!(unused_names(&wh).is_empty());

        let (_dir2, same_value) = replica();
        same_value
            .upsert_setting("flag", "us1", "", "2023-01-01", "false", None)
            .unwrap();
        same_value
            .insert_override("flag", "us1", "user", "u1", "false", 40.0)
            .unwrap();
        assert!(unused_names(&same_value).is_empty());
    }

    #[test]
    fn test_conditional_schema_is_used_regardless_of_values() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", Some("{\"if\": \"x\"}"))
            .unwrap();
        wh.upsert_setting("flag", "eu1", "", "2023-01-01", "false", None)
            .unwrap();
        assert!(unused_names(&wh).is_empty());
    }

    #[test]
    fn test_blank_conditional_schema_counts_as_absent() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", Some(""))
            .unwrap();
        assert_eq!(unused_names(&wh), vec!["flag"]);
    }

    #[test]
    fn test_divergent_defaults_are_used() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", None)
            .unwrap();
        wh.upsert_setting("flag", "eu1", "", "2023-01-01", "true", None)
            .unwrap();
        assert!(unused_names(&wh).is_empty());
    }

    fn insert_null_default(wh: &SqliteWarehouse, name: &str, pod: &str) {
        wh.connect()
            .unwrap()
            .execute(
                "INSERT INTO model_settings(name, pod, base_value) VALUES (?1, ?2, NULL);",
                params![name, pod],
            )
            .unwrap();
    }

    #[test]
    fn test_null_default_next_to_value_is_divergent() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "x", None)
            .unwrap();
        insert_null_default(&wh, "flag", "eu1");
        assert!(unused_names(&wh).is_empty());
    }

    #[test]
    fn test_null_default_everywhere_is_unused() {
        let (_dir, wh) = replica();
        insert_null_default(&wh, "flag", "us1");
        insert_null_default(&wh, "flag", "eu1");
        assert_eq!(unused_names(&wh), vec!["flag"]);

        wh.insert_override("flag", "us1", "provider", "p1", "x", 100.0)
            .unwrap();
        assert!(unused_names(&wh).is_empty());
    }

    #[test]
    fn test_override_in_pod_without_default_row_still_counts() {
        let (_dir, wh) = replica();
        wh.upsert_setting("flag", "us1", "", "2023-01-01", "false", None)
            .unwrap();
        wh.insert_override("flag", "ap1", "provider", "p1", "true", 100.0)
            .unwrap();
        assert!(unused_names(&wh).is_empty());
    }

    #[test]
    fn test_bad_sql_is_an_error() {
        let (_dir, wh) = replica();
        let err = wh.query("SELECT * FROM nowhere").unwrap_err();
        assert!(matches!(err, SettingsError::Sqlite(_)));
        assert!(err.is_query_failure());
    }
}
