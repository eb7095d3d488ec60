//! CLI error types with miette diagnostics.
//!
//! Maps service, configuration and hardware failures into user-facing
//! errors with help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use briefkasten_config::ConfigError;
use briefkasten_core::CoreError;
use briefkasten_server::ServerError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const HARDWARE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the mailbox service at {url}")]
    #[diagnostic(
        code(briefkasten::connection_failed),
        help(
            "Check that `briefkasten serve` is running and reachable.\n\
             Set the URL with --api-url or device.api_url."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: briefkasten_api::Error,
    },

    // ── Service responses ────────────────────────────────────────────
    #[error("Service rejected the request: {message}")]
    #[diagnostic(code(briefkasten::rejected))]
    Rejected { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(briefkasten::not_found),
        help("Register the device first: briefkasten register --mac <MAC> --serial <SERIAL>")
    )]
    NotFound { message: String },

    #[error("Service error: {0}")]
    #[diagnostic(code(briefkasten::api_error))]
    Api(#[source] briefkasten_api::Error),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(briefkasten::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(briefkasten::config),
        help("Inspect the effective settings with: briefkasten config show")
    )]
    Config(#[from] ConfigError),

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(briefkasten::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    // ── Hardware ─────────────────────────────────────────────────────
    #[error("Hardware setup failed: {0}")]
    #[diagnostic(
        code(briefkasten::hardware),
        help(
            "Check the [device.pins] map and that this user may write to the GPIO \
             directory (device.gpio_root)."
        )
    )]
    Hardware(#[source] CoreError),

    #[error("Letter log unavailable: {0}")]
    #[diagnostic(code(briefkasten::storage))]
    Storage(#[source] CoreError),

    // ── Service ──────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(briefkasten::server))]
    Server(#[from] ServerError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode config: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Classify an API error; `url` names the service for connection errors.
    pub fn from_api(err: briefkasten_api::Error, url: &url::Url) -> Self {
        let unreachable = matches!(
            &err,
            briefkasten_api::Error::Transport(e) if e.is_connect() || e.is_timeout()
        );
        if unreachable {
            return Self::ConnectionFailed {
                url: url.to_string(),
                source: err,
            };
        }

        match err {
            briefkasten_api::Error::Status {
                status: 400,
                message,
            } => Self::Rejected { message },
            briefkasten_api::Error::Status {
                status: 404,
                message,
            } => Self::NotFound { message },
            other => Self::Api(other),
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Server(ServerError::Bind { .. }) => {
                exit_code::CONNECTION
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Rejected { .. } => exit_code::USAGE,
            Self::Config(_) | Self::ConfigExists { .. } => exit_code::CONFIG,
            Self::Hardware(_) => exit_code::HARDWARE,
            Self::Api(_)
            | Self::Storage(_)
            | Self::Server(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => exit_code::GENERAL,
        }
    }
}
