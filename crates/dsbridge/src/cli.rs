//! Clap derive structures for the `dsbridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use dsbridge_core::EventKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// dsbridge -- digitalSTROM server bridge
#[derive(Debug, Parser)]
#[command(
    name = "dsbridge",
    version,
    about = "Bridge a digitalSTROM server: stream events, inspect topology, call the JSON API",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "DSBRIDGE_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect, load the topology and log incoming events until Ctrl-C
    Run(RunArgs),

    /// Print every device with its resolved function block
    #[command(alias = "topo")]
    Topology,

    /// Send one request to the controller and print the JSON result
    Call(CallArgs),

    /// Inspect the configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Event kind to subscribe to (repeatable; default: callScene, buttonClick)
    #[arg(long = "kind", short = 'k', value_name = "KIND")]
    pub kinds: Vec<EventKind>,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Endpoint path relative to the controller URL (e.g., json/zone/getName)
    pub endpoint: String,

    /// Query parameters as KEY=VALUE
    #[arg(value_parser = parse_key_val, value_name = "KEY=VALUE")]
    pub params: Vec<(String, String)>,

    /// Use POST instead of GET
    #[arg(long)]
    pub post: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration with secrets masked
    Show,

    /// Print the config file path
    Path,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}
