// ── Runtime device configuration ──
//
// These types describe *how* the controller drives its hardware and talks
// to the server. They never touch disk: `briefkasten-config` builds a
// `DeviceConfig` and hands it in.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;
use crate::hal::Edge;
use crate::model::{FlapState, SerialNumber};

/// Fixed BCM pin assignment, configured once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub led_red: u32,
    pub led_yellow: u32,
    pub led_green: u32,
    pub servo: u32,
    pub button: u32,
    pub light_barrier: u32,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            led_red: 17,
            led_yellow: 27,
            led_green: 22,
            servo: 23,
            button: 24,
            light_barrier: 25,
        }
    }
}

impl PinMap {
    fn all(&self) -> [(u32, &'static str); 6] {
        [
            (self.led_red, "led_red"),
            (self.led_yellow, "led_yellow"),
            (self.led_green, "led_green"),
            (self.servo, "servo"),
            (self.button, "button"),
            (self.light_barrier, "light_barrier"),
        ]
    }

    /// Every line must have its own pin.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for (pin, name) in self.all() {
            if !seen.insert(pin) {
                return Err(CoreError::config(format!(
                    "pin {pin} assigned twice (again for {name})"
                )));
            }
        }
        Ok(())
    }
}

/// Per-line debounce windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    pub button: Duration,
    pub light_barrier: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            button: Duration::from_millis(50),
            light_barrier: Duration::from_millis(200),
        }
    }
}

/// Servo pulse calibration.
///
/// The target angle is encoded purely as pulse width. A move is a burst of
/// pulses at a constant carrier period, after which the line returns low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCalibration {
    pub period: Duration,
    pub open_width: Duration,
    pub closed_width: Duration,
    /// Long enough for the horn to finish travelling.
    pub burst: Duration,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20),
            open_width: Duration::from_micros(2000),
            closed_width: Duration::from_micros(1000),
            burst: Duration::from_millis(600),
        }
    }
}

impl ServoCalibration {
    pub fn width_for(&self, state: FlapState) -> Duration {
        match state {
            FlapState::Open => self.open_width,
            FlapState::Closed => self.closed_width,
        }
    }

    /// Number of pulses in one burst (at least one).
    pub fn pulse_count(&self) -> u32 {
        let period = self.period.as_micros().max(1);
        let count = (self.burst.as_micros() / period).max(1);
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.period.is_zero() {
            return Err(CoreError::config("servo period must be non-zero"));
        }
        for (name, width) in [("open", self.open_width), ("closed", self.closed_width)] {
            if width.is_zero() || width >= self.period {
                return Err(CoreError::config(format!(
                    "servo {name} width {width:?} must be within the {:?} period",
                    self.period
                )));
            }
        }
        if self.burst < self.period {
            return Err(CoreError::config("servo burst must cover at least one period"));
        }
        Ok(())
    }
}

/// Which button edge means "lid opened".
///
/// Depends on how the switch is wired; calibrate against the real box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ButtonPolarity {
    #[default]
    OpenOnRising,
    OpenOnFalling,
}

impl ButtonPolarity {
    pub fn flap_state_for(self, edge: Edge) -> FlapState {
        match (self, edge) {
            (Self::OpenOnRising, Edge::Rising) | (Self::OpenOnFalling, Edge::Falling) => {
                FlapState::Open
            }
            _ => FlapState::Closed,
        }
    }
}

/// Everything the device-side controller needs.
///
/// Built by the binary, passed to `HardwareController` -- core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub serial_number: SerialNumber,
    /// Mailbox service root (e.g. `http://192.168.5.1:5000`).
    pub api_url: Url,
    /// Outbound request timeout.
    pub timeout: Duration,
    pub pins: PinMap,
    pub debounce: DebounceConfig,
    pub servo: ServoCalibration,
    pub button_polarity: ButtonPolarity,
    /// Delay between unlock polls.
    pub poll_interval: Duration,
    /// Hold time after an unlock-triggered open before polling resumes.
    pub settle_delay: Duration,
    /// How long the drop LED stays lit after a letter passes.
    pub letter_signal: Duration,
    /// Capacity of the outbound notification queue.
    pub notify_queue: usize,
    /// Capacity of the actuator command queue.
    pub actuator_queue: usize,
}

impl DeviceConfig {
    pub fn new(serial_number: SerialNumber, api_url: Url) -> Self {
        Self {
            serial_number,
            api_url,
            timeout: Duration::from_secs(10),
            pins: PinMap::default(),
            debounce: DebounceConfig::default(),
            servo: ServoCalibration::default(),
            button_polarity: ButtonPolarity::default(),
            poll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(5),
            letter_signal: Duration::from_secs(2),
            notify_queue: 32,
            actuator_queue: 8,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.pins.validate()?;
        self.servo.validate()?;
        if self.notify_queue == 0 || self.actuator_queue == 0 {
            return Err(CoreError::config("queue capacities must be non-zero"));
        }
        Ok(())
    }
}
