use std::path::PathBuf;
use std::process::ExitCode;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use settings_core::config::{DashboardConfig, WarehouseBackend};
use settings_core::errors::{SettingsError, SettingsResult};
use settings_core::ownership::pipeline::generate_team_mapping;
use settings_core::service::{ApiEnvelope, SettingsFilter, SettingsService};
use settings_core::warehouse::open_warehouse;

fn cli() -> Command {
    Command::new("model-settings")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Model setting ownership and usage reporting")
        .subcommand_required(true)
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Ownership manifest (overrides MODEL_SETTINGS_MANIFEST)"),
        )
        .arg(
            Arg::new("code-root")
                .long("code-root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Code tree scanned for setting files"),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Team mapping snapshot file"),
        )
        .arg(
            Arg::new("warehouse")
                .long("warehouse")
                .global(true)
                .help("Warehouse backend: `cli` or `sqlite:<path>`"),
        )
        .subcommand(
            Command::new("generate-mapping")
                .about("Resolve setting ownership and write the snapshot"),
        )
        .subcommand(
            Command::new("settings")
                .about("List settings with owning team and usage")
                .arg(
                    Arg::new("team")
                        .long("team")
                        .help("Only settings owned by this team"),
                )
                .arg(
                    Arg::new("unused-only")
                        .long("unused-only")
                        .action(ArgAction::SetTrue)
                        .help("Only settings classified as unused"),
                )
                .arg(
                    Arg::new("refresh")
                        .long("refresh")
                        .action(ArgAction::SetTrue)
                        .help("Regenerate the ownership snapshot first"),
                ),
        )
        .subcommand(
            Command::new("overrides")
                .about("Show every override of one setting")
                .arg(Arg::new("name").required(true).help("Setting name")),
        )
        .subcommand(Command::new("health").about("Report snapshot and cache state"))
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn apply_overrides(config: &mut DashboardConfig, matches: &ArgMatches) -> SettingsResult<()> {
    if let Some(path) = matches.get_one::<PathBuf>("manifest") {
        config.manifest_path = Some(path.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>("code-root") {
        config.code_root = path.clone();
    }
    if let Some(path) = matches.get_one::<PathBuf>("snapshot") {
        config.snapshot_path = path.clone();
    }
    if let Some(backend) = matches.get_one::<String>("warehouse") {
        let command = match &config.warehouse {
            WarehouseBackend::Cli { program, args } => {
                std::iter::once(program.clone())
                    .chain(args.iter().cloned())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            WarehouseBackend::Sqlite { .. } => {
                settings_core::config::DEFAULT_WAREHOUSE_COMMAND.to_string()
            }
        };
        config.warehouse = WarehouseBackend::parse(backend, &command)?;
    }
    Ok(())
}

fn emit<T: Serialize>(envelope: &ApiEnvelope<T>) -> SettingsResult<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

fn exit_code(err: &SettingsError) -> ExitCode {
    if err.is_query_failure() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn run(config: DashboardConfig, matches: &ArgMatches) -> SettingsResult<()> {
    match matches.subcommand() {
        Some(("generate-mapping", _)) => {
            let snapshot = generate_team_mapping(&config)?;
            let count = snapshot.summary.total_settings;
            emit(&ApiEnvelope::ok(snapshot.summary, count))
        }
        Some(("settings", args)) => {
            let service = SettingsService::new(config.clone(), open_warehouse(&config));
            if args.get_flag("refresh") {
                service.refresh_ownership()?;
            }
            let filter = SettingsFilter {
                team: args.get_one::<String>("team").cloned(),
                unused_only: args.get_flag("unused-only"),
            };
            let settings = service.list_settings(&filter)?;
            let count = settings.len();
            emit(&ApiEnvelope::ok(settings, count))
        }
        Some(("overrides", args)) => {
            let name = args
                .get_one::<String>("name")
                .ok_or_else(|| SettingsError::Config("missing setting name".to_string()))?;
            let service = SettingsService::new(config.clone(), open_warehouse(&config));
            let overrides = service.setting_overrides(name)?;
            let count = overrides.len();
            emit(&ApiEnvelope::ok(overrides, count))
        }
        Some(("health", _)) => {
            let service = SettingsService::new(config.clone(), open_warehouse(&config));
            emit(&ApiEnvelope::ok(service.health(), 1))
        }
        _ => Err(SettingsError::Config("unknown command".to_string())),
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let mut config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };
    init_tracing(config.json_logs);

    if let Err(e) = apply_overrides(&mut config, &matches) {
        error!("{e}");
        return exit_code(&e);
    }

    match run(config, &matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            let _ = emit(&ApiEnvelope::<()>::failure(&e));
            exit_code(&e)
        }
    }
}
