#![allow(clippy::unwrap_used)]
// Unlock poll loop and notifier delivery against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use briefkasten_api::{MailboxClient, TransportConfig};
use briefkasten_core::hal::SimGpio;
use briefkasten_core::notifier::deliver;
use briefkasten_core::{
    DeviceConfig, FlapState, HardwareController, MailStore, Notification, Notifier, PollLoop,
    PollOutcome, SerialNumber,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn serial() -> SerialNumber {
    SerialNumber::parse("SN1").unwrap()
}

fn client_for(server: &MockServer) -> MailboxClient {
    let transport = TransportConfig {
        timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(1),
    };
    MailboxClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap()
}

fn controller(api_url: &str) -> HardwareController {
    let config = DeviceConfig::new(serial(), Url::parse(api_url).unwrap());
    let (notifier, _rx) = Notifier::channel(8);
    HardwareController::new(
        config,
        &SimGpio::new(),
        Arc::new(MailStore::in_memory()),
        notifier,
    )
    .unwrap()
}

async fn setup() -> (MockServer, PollLoop, HardwareController) {
    let server = MockServer::start().await;
    let ctrl = controller(&server.uri());
    let poll = PollLoop::new(client_for(&server), ctrl.clone());
    (server, poll, ctrl)
}

fn unlock_reply(pending: bool) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "entriegeln": pending }))
}

// ── poll_once ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_pending_unlock_opens_flap() {
    let (server, poll, ctrl) = setup().await;

    Mock::given(method("POST"))
        .and(path("/frage_entriegeln"))
        .and(body_json(json!({ "serial_number": "SN1" })))
        .respond_with(unlock_reply(true))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(poll.poll_once().await, PollOutcome::Opened);
    assert_eq!(ctrl.flap_state(), FlapState::Open);

    // While open the server is not asked again.
    assert_eq!(poll.poll_once().await, PollOutcome::Skipped);
}

#[tokio::test]
async fn test_no_unlock_is_idle() {
    let (server, poll, ctrl) = setup().await;

    Mock::given(method("POST"))
        .and(path("/frage_entriegeln"))
        .respond_with(unlock_reply(false))
        .mount(&server)
        .await;

    assert_eq!(poll.poll_once().await, PollOutcome::Idle);
    assert_eq!(ctrl.flap_state(), FlapState::Closed);
}

#[tokio::test]
async fn test_server_error_counts_as_no_unlock() {
    let (server, poll, ctrl) = setup().await;

    Mock::given(method("POST"))
        .and(path("/frage_entriegeln"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert_eq!(poll.poll_once().await, PollOutcome::Failed);
    assert_eq!(ctrl.flap_state(), FlapState::Closed);
}

#[tokio::test]
async fn test_unreachable_server_counts_as_no_unlock() {
    let ctrl = controller("http://127.0.0.1:1");
    let client = MailboxClient::new(
        Url::parse("http://127.0.0.1:1").unwrap(),
        &TransportConfig::default(),
    )
    .unwrap();
    let poll = PollLoop::new(client, ctrl.clone());

    assert_eq!(poll.poll_once().await, PollOutcome::Failed);
    assert_eq!(ctrl.flap_state(), FlapState::Closed);
}

// ── run ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_loop_survives_failures_and_stops_on_cancel() {
    let (server, poll, ctrl) = setup().await;

    Mock::given(method("POST"))
        .and(path("/frage_entriegeln"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/frage_entriegeln"))
        .respond_with(unlock_reply(true))
        .with_priority(2)
        .mount(&server)
        .await;

    let mut flap = ctrl.subscribe_flap();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        poll.with_timing(Duration::from_millis(10), Duration::from_millis(10))
            .run(cancel.clone()),
    );

    tokio::time::timeout(Duration::from_secs(5), flap.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*flap.borrow(), FlapState::Open);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_cancel_waits_for_poll_in_flight() {
    let (server, poll, ctrl) = setup().await;

    // The server has already cleared the unlock when it answers.
    Mock::given(method("POST"))
        .and(path("/frage_entriegeln"))
        .respond_with(unlock_reply(true).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        poll.with_timing(Duration::from_secs(60), Duration::from_secs(60))
            .run(cancel.clone()),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctrl.flap_state(), FlapState::Open);
}

// ── Notifier delivery ───────────────────────────────────────────────

#[tokio::test]
async fn test_letter_notification_posts_new_letter() {
    let server = MockServer::start().await;
    let time: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();

    Mock::given(method("POST"))
        .and(path("/new_letter"))
        .and(body_json(json!({
            "serial_number": "SN1",
            "time": "2024-01-01T00:00:00Z"
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "status": "letter added" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    deliver(
        &client_for(&server),
        &Notification::Letter {
            serial: serial(),
            time,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_flap_notifications_hit_open_and_close() {
    let server = MockServer::start().await;

    for (route, status) in [("/open", "klappe opened"), ("/close", "klappe closed")] {
        Mock::given(method("POST"))
            .and(path(route))
            .and(body_json(json!({ "serial_number": "SN1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": status })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    for state in [FlapState::Open, FlapState::Closed] {
        deliver(
            &client,
            &Notification::FlapState {
                serial: serial(),
                state,
            },
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_worker_absorbs_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/new_letter"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "klappe opened" })))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let (notifier, handle) = Notifier::spawn(client_for(&server), 8, cancel.clone());

    notifier.report_letter(&serial(), Utc::now());
    notifier.report_flap_state(&serial(), true);
    drop(notifier);

    // Queue closes once every notifier is gone; the worker drains and exits.
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
