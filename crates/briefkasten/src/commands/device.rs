//! `briefkasten device`: the mailbox daemon.
//!
//! Claims the GPIO lines, starts the controller, the notifier worker and
//! the unlock poll loop, and tears everything down on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use briefkasten_api::{MailboxClient, TransportConfig};
use briefkasten_core::hal::SysfsGpio;
use briefkasten_core::{HardwareController, LetterLog, MailStore, Notifier, PollLoop};

use super::load;
use crate::cli::{DeviceArgs, GlobalOpts};
use crate::error::CliError;

/// How often sysfs input lines are sampled for edges.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(5);

pub async fn handle(args: DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = load(global)?;
    if let Some(serial) = args.serial {
        cfg.device.serial_number = Some(serial);
    }
    if let Some(root) = args.gpio_root {
        cfg.device.gpio_root = root;
    }
    let device = cfg.device_config()?;

    let transport = TransportConfig {
        timeout: device.timeout,
        ..TransportConfig::default()
    };
    let client = MailboxClient::new(device.api_url.clone(), &transport)
        .map_err(|e| CliError::from_api(e, &device.api_url))?;

    let letters: Arc<dyn LetterLog> = match &args.letter_log {
        Some(path) => Arc::new(MailStore::open(path).map_err(CliError::Storage)?),
        None => Arc::new(MailStore::in_memory()),
    };

    let cancel = CancellationToken::new();
    let gpio = SysfsGpio::new(&cfg.device.gpio_root, SAMPLE_INTERVAL, cancel.child_token());
    let (notifier, notify_task) =
        Notifier::spawn(client.clone(), device.notify_queue, cancel.child_token());

    let controller = HardwareController::new(device, &gpio, letters, notifier)
        .map_err(CliError::Hardware)?;
    controller.start().await;

    let poll_task = tokio::spawn(PollLoop::new(client, controller.clone()).run(cancel.child_token()));

    info!(serial = %controller.serial_number(), "mailbox device running");
    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    cancel.cancel();
    controller.shutdown().await;
    for (name, task) in [("poll loop", poll_task), ("notifier", notify_task)] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "task ended abnormally");
        }
    }
    Ok(())
}
