// ── Core identity and record types ──
//
// SerialNumber and MacAddress are validated once at the boundary and are
// the only way an identifier reaches the stores, the flags or the logs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const SERIAL_MAX_LEN: usize = 64;

// ── SerialNumber ────────────────────────────────────────────────────

/// Stable device identity used as the storage key.
///
/// Allow-list: 1 to 64 characters of ASCII letters, digits and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn parse(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        let invalid = |reason| CoreError::InvalidIdentifier {
            kind: "serial number",
            value: raw.clone(),
            reason,
        };

        if raw.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if raw.len() > SERIAL_MAX_LEN {
            return Err(invalid("must be at most 64 characters"));
        }
        if !raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(invalid("use letters, numbers, and underscores only"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SerialNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<SerialNumber> for String {
    fn from(s: SerialNumber) -> Self {
        s.0
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// Link-layer address, normalized to lowercase colon-separated format
/// (aa:bb:cc:dd:ee:ff). Accepts `:` or `-` between octets on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let raw = raw.as_ref();
        let octets: Vec<&str> = raw.split([':', '-']).collect();

        let well_formed = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.bytes().all(|b| b.is_ascii_hexdigit()));

        if !well_formed {
            return Err(CoreError::InvalidIdentifier {
                kind: "MAC address",
                value: raw.to_owned(),
                reason: "expected six hex octets separated by ':' or '-'",
            });
        }
        Ok(Self(octets.join(":").to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<MacAddress> for String {
    fn from(m: MacAddress) -> Self {
        m.0
    }
}

// ── Records ─────────────────────────────────────────────────────────

/// 1:1 mapping from a MAC address to the device's serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub mac_address: MacAddress,
    pub serial_number: SerialNumber,
}

/// One deposited letter. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    /// Position in the device's log, starting at 1.
    pub id: u64,
    pub serial_number: SerialNumber,
    pub time: DateTime<Utc>,
}

impl From<Letter> for briefkasten_api::models::LetterRecord {
    fn from(l: Letter) -> Self {
        Self {
            id: l.id,
            serial_number: l.serial_number.into(),
            time: l.time,
        }
    }
}

// ── FlapState ───────────────────────────────────────────────────────

/// Physical position of the mailbox flap.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlapState {
    #[default]
    Closed,
    Open,
}

impl FlapState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn from_open(is_open: bool) -> Self {
        if is_open { Self::Open } else { Self::Closed }
    }
}
