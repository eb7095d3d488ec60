//! Configuration for the briefkasten service and device.
//!
//! Built-in defaults, then the TOML file, then `BRIEFKASTEN_*` environment
//! variables (nested keys split on `__`). Translates into
//! `briefkasten_core::DeviceConfig` and `briefkasten_server::ServerConfig`,
//! validating identifiers, URLs and the pin map on the way.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use briefkasten_core::{
    ButtonPolarity, CoreError, DebounceConfig, DeviceConfig, PinMap, SerialNumber,
    ServoCalibration,
};
use briefkasten_server::ServerConfig;

const ENV_PREFIX: &str = "BRIEFKASTEN_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub device: DeviceSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSection {
    /// Listen address.
    pub bind: String,

    /// JSON persistence file; omit to keep data in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".into(),
            data_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSection {
    /// Required in device mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    /// Mailbox service root.
    pub api_url: String,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub settle_secs: u64,
    pub letter_signal_ms: u64,
    pub notify_queue: usize,
    pub button_polarity: ButtonPolarity,

    /// sysfs GPIO class directory.
    pub gpio_root: PathBuf,

    pub pins: PinMap,
    pub debounce_ms: DebounceSection,
    pub servo: ServoSection,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            serial_number: None,
            api_url: "http://localhost:5000".into(),
            timeout_secs: 10,
            poll_interval_secs: 5,
            settle_secs: 5,
            letter_signal_ms: 2000,
            notify_queue: 32,
            button_polarity: ButtonPolarity::default(),
            gpio_root: PathBuf::from("/sys/class/gpio"),
            pins: PinMap::default(),
            debounce_ms: DebounceSection::default(),
            servo: ServoSection::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DebounceSection {
    pub button: u64,
    pub light_barrier: u64,
}

impl Default for DebounceSection {
    fn default() -> Self {
        Self {
            button: 50,
            light_barrier: 200,
        }
    }
}

/// Servo calibration in microseconds / milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServoSection {
    pub period_us: u64,
    pub open_width_us: u64,
    pub closed_width_us: u64,
    pub burst_ms: u64,
}

impl Default for ServoSection {
    fn default() -> Self {
        Self {
            period_us: 20_000,
            open_width_us: 2000,
            closed_width_us: 1000,
            burst_ms: 600,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "briefkasten", "briefkasten").map_or_else(
        || PathBuf::from("/etc/briefkasten/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// The provider chain, exposed so callers can add their own layers.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load from `path` (or the platform path) plus the environment. A missing
/// file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    Ok(figment(&path).extract()?)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let bind: SocketAddr = self
            .server
            .bind
            .parse()
            .map_err(|e| ConfigError::validation("server.bind", format!("{e}")))?;
        Ok(ServerConfig {
            bind,
            data_file: self.server.data_file.clone(),
        })
    }

    /// Everything the device controller needs. Fails if the serial number
    /// is missing or invalid, or if the hardware settings don't add up.
    pub fn device_config(&self) -> Result<DeviceConfig, ConfigError> {
        let d = &self.device;

        let raw_serial = d.serial_number.as_deref().ok_or_else(|| {
            ConfigError::validation("device.serial_number", "required for device mode")
        })?;
        let serial_number = SerialNumber::parse(raw_serial)
            .map_err(|e| ConfigError::validation("device.serial_number", e.to_string()))?;

        let api_url = self.api_url()?;

        let mut config = DeviceConfig::new(serial_number, api_url);
        config.timeout = Duration::from_secs(d.timeout_secs);
        config.pins = d.pins;
        config.debounce = DebounceConfig {
            button: Duration::from_millis(d.debounce_ms.button),
            light_barrier: Duration::from_millis(d.debounce_ms.light_barrier),
        };
        config.servo = ServoCalibration {
            period: Duration::from_micros(d.servo.period_us),
            open_width: Duration::from_micros(d.servo.open_width_us),
            closed_width: Duration::from_micros(d.servo.closed_width_us),
            burst: Duration::from_millis(d.servo.burst_ms),
        };
        config.button_polarity = d.button_polarity;
        config.poll_interval = Duration::from_secs(d.poll_interval_secs);
        config.settle_delay = Duration::from_secs(d.settle_secs);
        config.letter_signal = Duration::from_millis(d.letter_signal_ms);
        config.notify_queue = d.notify_queue;

        config.validate().map_err(|e| match e {
            CoreError::Config { message } => ConfigError::validation("device", message),
            other => ConfigError::validation("device", other.to_string()),
        })?;
        Ok(config)
    }

    /// Service URL used by the device and by the client commands.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.device.api_url)
            .map_err(|e| ConfigError::validation("device.api_url", format!("{e}")))
    }
}
