//! Client commands against a running mailbox service.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use briefkasten_api::models::{DeviceRef, LettersResponse};
use briefkasten_api::{MailboxClient, TransportConfig};

use super::{load, print_json};
use crate::cli::{Command, DeviceSelector, GlobalOpts};
use crate::error::CliError;

fn build_client(global: &GlobalOpts) -> Result<MailboxClient, CliError> {
    let cfg = load(global)?;
    let url = cfg.api_url()?;
    let transport = TransportConfig {
        timeout: Duration::from_secs(cfg.device.timeout_secs),
        ..TransportConfig::default()
    };
    MailboxClient::new(url.clone(), &transport).map_err(|e| CliError::from_api(e, &url))
}

fn device_ref(selector: DeviceSelector) -> DeviceRef {
    DeviceRef {
        serial_number: selector.serial,
        mac_address: selector.mac,
    }
}

pub async fn handle(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let client = build_client(global)?;
    let api = |e| CliError::from_api(e, client.base_url());

    match cmd {
        Command::Status => print_json(&client.status().await.map_err(api)?),

        Command::Register(args) => {
            let ack = client
                .register(&args.mac, &args.serial)
                .await
                .map_err(api)?;
            print_json(&ack)
        }

        Command::Letters(args) => {
            let letters = client.letters(&args.mac).await.map_err(api)?;
            print_json(&LettersResponse { letters })
        }

        Command::SendLetter(args) => {
            let time = args
                .time
                .as_deref()
                .map(|raw| {
                    DateTime::parse_from_rfc3339(raw)
                        .map(|t| t.with_timezone(&Utc))
                        .map_err(|e| CliError::Validation {
                            field: "--time".into(),
                            reason: e.to_string(),
                        })
                })
                .transpose()?;
            let ack = client.new_letter(&args.serial, time).await.map_err(api)?;
            print_json(&ack)
        }

        Command::Unlock(selector) => {
            let ack = client
                .request_unlock(&device_ref(selector))
                .await
                .map_err(api)?;
            print_json(&ack)
        }

        Command::PollUnlock(args) => {
            let entriegeln = client.poll_unlock(&args.serial).await.map_err(api)?;
            print_json(&json!({ "entriegeln": entriegeln }))
        }

        Command::FlapState(selector) => {
            let offen = client
                .flap_open(&device_ref(selector))
                .await
                .map_err(api)?;
            print_json(&json!({ "offen": offen }))
        }

        other => Err(CliError::Validation {
            field: "command".into(),
            reason: format!("{other:?} is not a client command"),
        }),
    }
}
