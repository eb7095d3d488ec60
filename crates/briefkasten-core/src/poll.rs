// ── Unlock poll loop ──
//
// Device side of the unlock handshake: ask the server at a fixed interval
// whether an unlock is pending and open the flap when it is. Closing is
// left to the button.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use briefkasten_api::MailboxClient;

use crate::controller::HardwareController;

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Unlock was pending and the flap was opened.
    Opened,
    /// Unlock was pending but the flap had opened in the meantime.
    AlreadyOpen,
    /// Flap is open; the server was not asked so a pending unlock survives.
    Skipped,
    /// No unlock pending.
    Idle,
    /// The request failed; treated as "no unlock pending".
    Failed,
}

pub struct PollLoop {
    client: MailboxClient,
    controller: HardwareController,
    interval: Duration,
    settle: Duration,
}

impl PollLoop {
    /// Timing comes from the controller's configuration.
    pub fn new(client: MailboxClient, controller: HardwareController) -> Self {
        let config = controller.config();
        let (interval, settle) = (config.poll_interval, config.settle_delay);
        Self {
            client,
            controller,
            interval,
            settle,
        }
    }

    pub fn with_timing(mut self, interval: Duration, settle: Duration) -> Self {
        self.interval = interval;
        self.settle = settle;
        self
    }

    /// One handshake round trip.
    pub async fn poll_once(&self) -> PollOutcome {
        if self.controller.flap_state().is_open() {
            return PollOutcome::Skipped;
        }

        let serial = self.controller.serial_number();
        match self.client.poll_unlock(serial.as_str()).await {
            Ok(true) => {
                if self.controller.open_flap().await {
                    PollOutcome::Opened
                } else {
                    PollOutcome::AlreadyOpen
                }
            }
            Ok(false) => PollOutcome::Idle,
            Err(e) => {
                warn!(%serial, error = %e, "unlock poll failed");
                PollOutcome::Failed
            }
        }
    }

    /// Poll until `cancel` fires. Network failures never end the loop.
    ///
    /// A poll in flight is finished before cancellation is honoured: the
    /// server clears the unlock when it answers, so dropping the response
    /// would lose it.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            serial = %self.controller.serial_number(),
            interval = ?self.interval,
            "unlock polling started"
        );

        while !cancel.is_cancelled() {
            let outcome = self.poll_once().await;
            debug!(?outcome, "poll cycle");

            let delay = if outcome == PollOutcome::Opened {
                self.settle
            } else {
                self.interval
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        info!("unlock polling stopped");
    }
}
