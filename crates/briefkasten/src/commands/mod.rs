//! Subcommand handlers.

pub mod client;
pub mod config_cmd;
pub mod device;
pub mod serve;

use briefkasten_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config file named by `--config` (or the platform default)
/// with the `--api-url` override applied.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = briefkasten_config::load_config(global.config.as_deref())?;
    if let Some(url) = &global.api_url {
        cfg.device.api_url.clone_from(url);
    }
    Ok(cfg)
}

/// Pretty-print a response body on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
