//! Config subcommand handlers.

use std::path::Path;

use dsbridge_config::{Config, ConfigError};

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

pub fn handle(
    args: &ConfigArgs,
    path: &Path,
    loaded: Result<Config, ConfigError>,
) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Show => {
            let config = loaded?;
            print!("{}", config.redacted().to_toml()?);
            Ok(())
        }
    }
}
