// briefkasten-core: Mailbox controller, unlock handshake and device-side services.

pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod flags;
pub mod hal;
pub mod led;
pub mod model;
pub mod notifier;
pub mod poll;
pub mod servo;
pub mod store;

mod actuator;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ButtonPolarity, DebounceConfig, DeviceConfig, PinMap, ServoCalibration};
pub use controller::{EdgeOutcome, HardwareController};
pub use error::CoreError;
pub use flags::FlagStore;
pub use model::{DeviceIdentity, FlapState, Letter, MacAddress, SerialNumber};
pub use notifier::{Notification, Notifier};
pub use poll::{PollLoop, PollOutcome};
pub use store::{DeviceRegistry, LetterLog, MailStore};
