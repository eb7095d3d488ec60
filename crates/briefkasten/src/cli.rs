//! Clap derive structures for the `briefkasten` CLI.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// briefkasten -- smart mailbox service, device daemon and client
#[derive(Debug, Parser)]
#[command(
    name = "briefkasten",
    version,
    about = "Smart mailbox: letter notifications and remote flap unlock",
    long_about = "Runs the mailbox HTTP service (`serve`), the Raspberry Pi device \
        daemon (`device`), or talks to a running service from the command line.",
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
    #[arg(long, env = "BRIEFKASTEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Mailbox service URL (overrides device.api_url)
    #[arg(long, short = 'u', global = true)]
    pub api_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the mailbox HTTP service
    Serve(ServeArgs),

    /// Run the device daemon (GPIO, servo, unlock polling)
    Device(DeviceArgs),

    /// Show service status
    Status,

    /// Register a device's MAC address with its serial number
    Register(RegisterArgs),

    /// List letters recorded for a MAC address
    Letters(MacArgs),

    /// Record a letter for a device
    SendLetter(SendLetterArgs),

    /// Request a remote unlock of the flap
    Unlock(DeviceSelector),

    /// Consume a pending unlock, as the device does
    PollUnlock(SerialArgs),

    /// Show the last reported flap state
    FlapState(DeviceSelector),

    /// Inspect or create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Service / device ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address (overrides server.bind)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// JSON persistence file (overrides server.data_file)
    #[arg(long)]
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Device serial number (overrides device.serial_number)
    #[arg(long, short = 's')]
    pub serial: Option<String>,

    /// sysfs GPIO directory (overrides device.gpio_root)
    #[arg(long)]
    pub gpio_root: Option<PathBuf>,

    /// Keep a local copy of the letter log in this JSON file
    #[arg(long)]
    pub letter_log: Option<PathBuf>,
}

// ── Client commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long, short = 'm')]
    pub mac: String,

    #[arg(long, short = 's')]
    pub serial: String,
}

#[derive(Debug, Args)]
pub struct MacArgs {
    #[arg(long, short = 'm')]
    pub mac: String,
}

#[derive(Debug, Args)]
pub struct SerialArgs {
    #[arg(long, short = 's')]
    pub serial: String,
}

#[derive(Debug, Args)]
pub struct SendLetterArgs {
    #[arg(long, short = 's')]
    pub serial: String,

    /// RFC 3339 timestamp; the service uses its own clock when omitted
    #[arg(long, short = 't')]
    pub time: Option<String>,
}

/// Identify a device by serial number or MAC address.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct DeviceSelector {
    #[arg(long, short = 's')]
    pub serial: Option<String>,

    #[arg(long, short = 'm')]
    pub mac: Option<String>,
}

// ── Config / completions ─────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    pub shell: Shell,
}
