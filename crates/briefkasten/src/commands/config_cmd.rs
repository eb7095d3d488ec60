//! Config subcommand handlers.

use briefkasten_config::{Config, config_path, save_config};

use super::load;
use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);

    match args.command {
        ConfigCommand::Show => {
            let cfg = load(global)?;
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            save_config(&Config::default(), &path)?;
            eprintln!("Wrote default configuration to {}", path.display());
            eprintln!("Set device.serial_number before running `briefkasten device`.");
            Ok(())
        }
    }
}
