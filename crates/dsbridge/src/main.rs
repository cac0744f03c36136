mod cli;
mod commands;
mod error;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dsbridge_config::{Config, ConfigError, LogSection};
use dsbridge_core::Bridge;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config is loaded up front so `[log]` can shape tracing; errors surface
    // once the command actually needs it.
    let config_path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(dsbridge_config::config_path);
    let loaded = dsbridge_config::load_config(Some(&config_path));

    let log = loaded
        .as_ref()
        .map(|config| config.log.clone())
        .unwrap_or_default();
    init_tracing(cli.global.verbose, cli.global.log_json || log.json, &log);

    if let Err(err) = run(cli, config_path, loaded).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool, log: &LogSection) {
    let directive = match verbosity {
        0 => log.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    // stdout is reserved for command output
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(
    cli: Cli,
    config_path: PathBuf,
    loaded: Result<Config, ConfigError>,
) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a controller connection
        Command::Config(args) => commands::config::handle(&args, &config_path, loaded),

        cmd => {
            let config = loaded?;
            let bridge_config =
                dsbridge_config::to_bridge_config(&config).map_err(|e| match e {
                    ConfigError::NoCredentials => CliError::NoCredentials {
                        path: config_path.display().to_string(),
                    },
                    other => other.into(),
                })?;
            let bridge = Bridge::new(bridge_config)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &bridge).await
        }
    }
}
