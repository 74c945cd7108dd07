use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, info, warn};

use fleetbook::cli::{Cli, Commands};
use fleetbook::commands;
use fleetbook::config::Config;
use fleetbook::engine::{Engine, Policy};
use fleetbook::store::CsvStore;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }

    if let Err(e) = fleetbook::observability::init(config.metrics_port) {
        warn!("failed to install Prometheus metrics exporter: {e}");
    }

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = CsvStore::open(
        &config.data_dir,
        &config.reservations_file,
        &config.maintenance_file,
    )?
    .with_revision_check(config.check_revision);
    let policy = Policy {
        allow_maintenance_override: config.allow_maintenance_override,
    };
    let mut engine = Engine::open(store, policy)?;
    info!(
        data_dir = %config.data_dir.display(),
        maintenance_override = policy.allow_maintenance_override,
        revision_check = config.check_revision,
        "session opened"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Shell => {
            let stdin = io::stdin();
            commands::run_shell(&mut engine, cli.format, stdin.lock(), &mut out, &mut io::stderr())?;
        }
        command => commands::execute(&mut engine, command, cli.format, &mut out)?,
    }
    out.flush()?;
    Ok(())
}
