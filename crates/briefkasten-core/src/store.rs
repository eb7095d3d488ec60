// ── Device registry and letter log ──
//
// One identity map (MAC -> serial) and one letters collection keyed by
// validated serial number. Optionally mirrored to a JSON file that is
// rewritten atomically after every mutation; a mutation whose snapshot
// cannot be written is rolled back.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{DeviceIdentity, Letter, MacAddress, SerialNumber};

/// Append-only, per-device ordered letter history.
pub trait LetterLog: Send + Sync {
    fn append_letter(&self, device: &SerialNumber, time: DateTime<Utc>)
    -> Result<Letter, CoreError>;

    /// Letters in insertion order. Unknown devices yield an empty list.
    fn list_letters(&self, device: &SerialNumber) -> Result<Vec<Letter>, CoreError>;
}

/// MAC address to serial number lookup.
pub trait DeviceRegistry: Send + Sync {
    /// Register (or re-register) a MAC. The newest mapping wins.
    fn register(&self, mac: &MacAddress, serial: &SerialNumber) -> Result<(), CoreError>;

    fn serial_for_mac(&self, mac: &MacAddress) -> Option<SerialNumber>;
}

/// On-disk layout: flat lists, rebuilt into maps on load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    devices: Vec<DeviceIdentity>,
    letters: Vec<Letter>,
}

/// Concurrent in-memory store with optional JSON persistence.
pub struct MailStore {
    devices: DashMap<MacAddress, SerialNumber>,
    letters: DashMap<SerialNumber, Vec<Letter>>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl MailStore {
    pub fn in_memory() -> Self {
        Self {
            devices: DashMap::new(),
            letters: DashMap::new(),
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open (or start) a store backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let mut store = Self::in_memory();

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&raw)?;
            for identity in snapshot.devices {
                store
                    .devices
                    .insert(identity.mac_address, identity.serial_number);
            }
            for letter in snapshot.letters {
                store
                    .letters
                    .entry(letter.serial_number.clone())
                    .or_default()
                    .push(letter);
            }
            info!(
                path = %path.display(),
                devices = store.devices.len(),
                "loaded mail store"
            );
        }

        store.path = Some(path);
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Held across mutate+persist, so snapshots land in order and a
    /// rollback only ever undoes its own change.
    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the full snapshot to a temp file and rename it into place.
    /// Callers hold the write lock.
    fn persist(&self) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut devices: Vec<DeviceIdentity> = self
            .devices
            .iter()
            .map(|e| DeviceIdentity {
                mac_address: e.key().clone(),
                serial_number: e.value().clone(),
            })
            .collect();
        devices.sort_by(|a, b| a.mac_address.cmp(&b.mac_address));

        let mut letters: Vec<Letter> = self
            .letters
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        letters.sort_by(|a, b| {
            a.serial_number
                .cmp(&b.serial_number)
                .then(a.id.cmp(&b.id))
        });

        let json = serde_json::to_vec_pretty(&Snapshot { devices, letters })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "persisted mail store");
        Ok(())
    }
}

impl Default for MailStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl LetterLog for MailStore {
    fn append_letter(
        &self,
        device: &SerialNumber,
        time: DateTime<Utc>,
    ) -> Result<Letter, CoreError> {
        let _guard = self.lock_writes();
        let letter = {
            let mut log = self.letters.entry(device.clone()).or_default();
            let letter = Letter {
                id: u64::try_from(log.len()).unwrap_or(u64::MAX).saturating_add(1),
                serial_number: device.clone(),
                time,
            };
            log.push(letter.clone());
            letter
        };

        if let Err(e) = self.persist() {
            if let Some(mut log) = self.letters.get_mut(device) {
                log.pop();
            }
            return Err(e);
        }
        Ok(letter)
    }

    fn list_letters(&self, device: &SerialNumber) -> Result<Vec<Letter>, CoreError> {
        Ok(self
            .letters
            .get(device)
            .map(|log| log.value().clone())
            .unwrap_or_default())
    }
}

impl DeviceRegistry for MailStore {
    fn register(&self, mac: &MacAddress, serial: &SerialNumber) -> Result<(), CoreError> {
        let _guard = self.lock_writes();
        let previous = self.devices.insert(mac.clone(), serial.clone());

        if let Err(e) = self.persist() {
            match previous {
                Some(previous) => {
                    self.devices.insert(mac.clone(), previous);
                }
                None => {
                    self.devices.remove(mac);
                }
            }
            return Err(e);
        }
        if let Some(previous) = previous.filter(|p| p != serial) {
            info!(%mac, %previous, %serial, "re-registered MAC to a new serial number");
        }
        Ok(())
    }

    fn serial_for_mac(&self, mac: &MacAddress) -> Option<SerialNumber> {
        self.devices.get(mac).map(|s| s.value().clone())
    }
}
