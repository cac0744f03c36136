//! Command dispatch: CLI args -> bridge operations -> stdout.

pub mod call;
pub mod config;
pub mod run;
pub mod topology;

use dsbridge_core::Bridge;

use crate::cli::Command;
use crate::error::CliError;

/// Dispatch a controller-bound command to its handler.
pub async fn dispatch(cmd: Command, bridge: &Bridge) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(bridge, args).await,
        Command::Topology => topology::handle(bridge).await,
        Command::Call(args) => call::handle(bridge, args).await,
        // Config is handled before a bridge exists
        Command::Config(_) => Err(CliError::Internal(
            "config command reached controller dispatch".into(),
        )),
    }
}
