//! Settings core library: model-setting ownership and usage reporting.
//!
//! Two independent pipelines feed a dashboard of model settings:
//!
//! * [`ownership`] walks the code tree, reads each setting file's declared
//!   name and resolves the owning team from a YAML manifest, then persists
//!   the result as a JSON snapshot.
//! * [`usage`] asks the [`warehouse`] which settings are never changed from
//!   their default and joins that verdict onto the full settings list.
//!
//! [`service::SettingsService`] combines both behind the envelope used by
//! the dashboard endpoints and the `model-settings` binary. With the
//! `python` feature the crate is also a Python extension module
//! (`settings_core`).

pub mod config;
pub mod errors;
pub mod models;
pub mod ownership;
pub mod service;
pub mod usage;
pub mod warehouse;

#[cfg(feature = "python")]
mod python;
