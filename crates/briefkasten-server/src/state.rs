use std::sync::Arc;
use std::time::Instant;

use briefkasten_core::{FlagStore, MailStore};

/// Shared handler state. Cloned per request; everything behind it is
/// internally synchronized.
#[derive(Clone)]
pub struct AppState {
    flags: Arc<FlagStore>,
    store: Arc<MailStore>,
    started: Instant,
}

impl AppState {
    pub fn new(store: MailStore) -> Self {
        Self {
            flags: Arc::new(FlagStore::new()),
            store: Arc::new(store),
            started: Instant::now(),
        }
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    pub fn store(&self) -> &MailStore {
        &self.store
    }

    /// Seconds since start, to the millisecond.
    pub fn uptime_seconds(&self) -> f64 {
        (self.started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0
    }
}
