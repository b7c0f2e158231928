//! Read-only access to the settings warehouse.

pub mod cli;
pub mod queries;
pub mod rows;
pub mod sqlite;

use std::sync::Arc;

use crate::config::{DashboardConfig, WarehouseBackend};
use crate::errors::SettingsResult;
use crate::warehouse::rows::Row;

/// Something that runs one SQL statement and returns its rows keyed by
/// lower-case column name. Implementations bound each call in time and
/// report timeouts as [`crate::errors::SettingsError::Timeout`].
pub trait Warehouse: Send + Sync {
    fn query(&self, sql: &str) -> SettingsResult<Vec<Row>>;
}

impl<W: Warehouse + ?Sized> Warehouse for Arc<W> {
    fn query(&self, sql: &str) -> SettingsResult<Vec<Row>> {
        (**self).query(sql)
    }
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn query(&self, sql: &str) -> SettingsResult<Vec<Row>> {
        (**self).query(sql)
    }
}

/// Instantiate the backend selected by `config`.
pub fn open_warehouse(config: &DashboardConfig) -> Box<dyn Warehouse> {
    match &config.warehouse {
        WarehouseBackend::Cli { program, args } => Box::new(cli::CliWarehouse::new(
            program.clone(),
            args.clone(),
            config.query_timeout,
        )),
        WarehouseBackend::Sqlite { path } => Box::new(sqlite::SqliteWarehouse::new(
            path.clone(),
            config.tables.clone(),
        )),
    }
}
