// Per-line contact-bounce filter.

use std::time::{Duration, Instant};

/// Accepts an edge only if more than `window` has passed since the last
/// accepted edge on the same line. Rejected edges do not move the window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` and restarts the window if the edge at `at` is accepted.
    pub fn accept(&mut self, at: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            // Out-of-order timestamps saturate to zero and are rejected.
            if at.saturating_duration_since(last) <= self.window {
                return false;
            }
        }
        self.last_accepted = Some(at);
        true
    }
}
