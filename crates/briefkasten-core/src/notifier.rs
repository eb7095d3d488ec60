// ── Remote notifier ──
//
// Letter and flap-state reports leave the edge path through a bounded
// queue. A single worker task drains it and performs the HTTP calls, so a
// slow or dead server never delays debounce timing. Delivery is best
// effort: failures are logged and the notification is discarded.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use briefkasten_api::MailboxClient;

use crate::error::CoreError;
use crate::model::{FlapState, SerialNumber};

/// One outbound report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Letter {
        serial: SerialNumber,
        time: DateTime<Utc>,
    },
    FlapState {
        serial: SerialNumber,
        state: FlapState,
    },
}

/// Producer half of the notification queue. Cheaply cloneable.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// A notifier plus the raw receiving end, for callers that drain the
    /// queue themselves.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// A notifier whose queue is drained by a worker delivering through
    /// `client`. The worker exits when `cancel` fires or every notifier
    /// clone is dropped.
    pub fn spawn(
        client: MailboxClient,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (notifier, rx) = Self::channel(capacity);
        let handle = tokio::spawn(notify_task(client, rx, cancel));
        (notifier, handle)
    }

    pub fn report_letter(&self, serial: &SerialNumber, time: DateTime<Utc>) {
        self.enqueue(Notification::Letter {
            serial: serial.clone(),
            time,
        });
    }

    pub fn report_flap_state(&self, serial: &SerialNumber, is_open: bool) {
        self.enqueue(Notification::FlapState {
            serial: serial.clone(),
            state: FlapState::from_open(is_open),
        });
    }

    /// Never blocks. A full queue drops the notification.
    fn enqueue(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(?dropped, "notification queue full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                debug!(?dropped, "notifier stopped, dropping");
            }
        }
    }
}

/// Perform the HTTP call for one notification.
pub async fn deliver(client: &MailboxClient, notification: &Notification) -> Result<(), CoreError> {
    match notification {
        Notification::Letter { serial, time } => {
            client.new_letter(serial.as_str(), Some(*time)).await?;
        }
        Notification::FlapState { serial, state } => match state {
            FlapState::Open => {
                client.report_open(serial.as_str()).await?;
            }
            FlapState::Closed => {
                client.report_close(serial.as_str()).await?;
            }
        },
    }
    Ok(())
}

// ── Background worker ────────────────────────────────────────────────

async fn notify_task(
    client: MailboxClient,
    mut rx: mpsc::Receiver<Notification>,
    cancel: CancellationToken,
) {
    loop {
        let notification = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(n) => n,
                None => break,
            },
        };

        match deliver(&client, &notification).await {
            Ok(()) => debug!(?notification, "notification delivered"),
            Err(e) => warn!(error = %e, ?notification, "notification failed, discarding"),
        }
    }
    info!("notifier stopped");
}
