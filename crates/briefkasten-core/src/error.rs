// ── Core error types ──
//
// Errors surfaced by the controller, the stores and the device-side
// services. Transport-layer failures from `briefkasten-api` are folded
// into `Remote` so callers never match on HTTP details.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    // ── Hardware ─────────────────────────────────────────────────────
    #[error("GPIO {pin} ({name}): {message}")]
    Hardware {
        pin: u32,
        name: String,
        message: String,
    },

    // ── Storage ──────────────────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    // ── Remote service ───────────────────────────────────────────────
    #[error("Remote call failed: {message}")]
    Remote {
        message: String,
        status: Option<u16>,
        transient: bool,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn hardware(pin: u32, name: &str, message: impl Into<String>) -> Self {
        Self::Hardware {
            pin,
            name: name.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` for failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Remote { transient: true, .. })
    }
}

// Output pins report write failures as `CoreError::Hardware`.
impl embedded_hal::digital::Error for CoreError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<briefkasten_api::Error> for CoreError {
    fn from(err: briefkasten_api::Error) -> Self {
        Self::Remote {
            status: err.status(),
            transient: err.is_transient(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage {
            message: format!("corrupt data file: {err}"),
        }
    }
}
