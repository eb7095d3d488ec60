// Wire types for the mailbox HTTP surface.
//
// These mirror the JSON bodies exactly (including the German field names the
// firmware already speaks) and carry raw strings. Validation into domain
// identifiers happens in `briefkasten-core`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET|POST /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub version: String,
    pub time: DateTime<Utc>,
    pub uptime_seconds: f64,
}

/// `POST /register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub mac_address: String,
    pub serial_number: String,
}

/// `POST /letters`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LettersRequest {
    pub mac_address: String,
}

/// One entry of the append-only letter log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterRecord {
    pub id: u64,
    pub serial_number: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LettersResponse {
    pub letters: Vec<LetterRecord>,
}

/// `POST /new_letter`. The server stamps its own receive time when `time` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLetterRequest {
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Identifies a device either by serial number or by MAC address.
///
/// Used by `/entriegeln` and `/frage_offen`, which historically accepted
/// either field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

impl DeviceRef {
    pub fn serial(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial_number.into()),
            mac_address: None,
        }
    }

    pub fn mac(mac_address: impl Into<String>) -> Self {
        Self {
            serial_number: None,
            mac_address: Some(mac_address.into()),
        }
    }
}

/// `POST /frage_entriegeln`, `/open`, `/close`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialRequest {
    pub serial_number: String,
}

/// Generic `{"status": "..."}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnlockPoll {
    pub entriegeln: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlapPoll {
    pub offen: bool,
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
