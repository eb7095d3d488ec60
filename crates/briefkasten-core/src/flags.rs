// ── Unlock handshake flags ──
//
// The only state shared between the unlock-request handler and the
// device's poll. Every operation runs under the per-device shard lock,
// so the unlock signal is delivered at most once.

use dashmap::DashMap;

use crate::model::SerialNumber;

#[derive(Debug, Default, Clone, Copy)]
struct DeviceFlags {
    unlock_requested: bool,
    flap_open: bool,
}

/// Per-device boolean flags with test-and-clear semantics.
///
/// The booleans are private; only the operations below touch them.
#[derive(Debug, Default)]
pub struct FlagStore {
    devices: DashMap<SerialNumber, DeviceFlags>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an unlock as pending. Idempotent: a second request before the
    /// next poll does not queue a second unlock.
    pub fn request_unlock(&self, device: &SerialNumber) {
        self.devices
            .entry(device.clone())
            .or_default()
            .unlock_requested = true;
    }

    /// Consume a pending unlock. Returns `true` exactly once per pending
    /// request; a `false` read has no side effects.
    pub fn poll_and_clear_unlock(&self, device: &SerialNumber) -> bool {
        self.devices
            .get_mut(device)
            .is_some_and(|mut flags| std::mem::take(&mut flags.unlock_requested))
    }

    pub fn set_flap_open(&self, device: &SerialNumber, is_open: bool) {
        self.devices.entry(device.clone()).or_default().flap_open = is_open;
    }

    /// Last reported flap state; `false` for devices that never reported.
    pub fn get_flap_open(&self, device: &SerialNumber) -> bool {
        self.devices.get(device).is_some_and(|flags| flags.flap_open)
    }
}
