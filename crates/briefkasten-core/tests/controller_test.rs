#![allow(clippy::unwrap_used)]
// Controller scenarios against the simulated GPIO backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use url::Url;

use briefkasten_core::hal::{Edge, EdgeEvent, Level, SimGpio};
use briefkasten_core::{
    ButtonPolarity, CoreError, DeviceConfig, EdgeOutcome, FlapState, HardwareController,
    LetterLog, MailStore, Notification, Notifier, PinMap, SerialNumber, ServoCalibration,
};

// ── Helpers ─────────────────────────────────────────────────────────

const BUTTON: u32 = 24;
const LIGHT_BARRIER: u32 = 25;
const SERVO: u32 = 23;

fn serial() -> SerialNumber {
    SerialNumber::parse("SN1").unwrap()
}

fn config() -> DeviceConfig {
    let mut config = DeviceConfig::new(serial(), Url::parse("http://localhost:5000").unwrap());
    config.servo = ServoCalibration {
        period: Duration::from_millis(2),
        open_width: Duration::from_micros(900),
        closed_width: Duration::from_micros(400),
        burst: Duration::from_millis(10),
    };
    config.letter_signal = Duration::from_millis(5);
    config
}

struct Rig {
    gpio: SimGpio,
    store: Arc<MailStore>,
    controller: HardwareController,
    notifications: mpsc::Receiver<Notification>,
}

fn rig_with(config: DeviceConfig) -> Rig {
    let gpio = SimGpio::new();
    let store = Arc::new(MailStore::in_memory());
    let (notifier, notifications) = Notifier::channel(16);
    let controller =
        HardwareController::new(config, &gpio, Arc::clone(&store) as Arc<dyn LetterLog>, notifier)
            .unwrap();
    Rig {
        gpio,
        store,
        controller,
        notifications,
    }
}

fn rig() -> Rig {
    rig_with(config())
}

fn edge(pin: u32, edge: Edge, at: Instant) -> EdgeEvent {
    EdgeEvent { pin, edge, at }
}

fn servo_burst() -> usize {
    usize::try_from(config().servo.pulse_count()).unwrap()
}

/// Wait until the actuator has lit the drop LED, i.e. it is busy holding
/// a letter signal.
async fn wait_for_drop_signal(gpio: &SimGpio) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while gpio.level(27) != Some(Level::High) {
        assert!(Instant::now() < deadline, "actuator never signalled the letter");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

// ── Construction ────────────────────────────────────────────────────

#[test]
fn test_failed_claim_aborts_construction() {
    let gpio = SimGpio::new();
    gpio.break_pin(SERVO);
    let (notifier, _rx) = Notifier::channel(4);

    let err = HardwareController::new(config(), &gpio, Arc::new(MailStore::in_memory()), notifier)
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::Hardware { pin: SERVO, .. }), "{err}");
}

#[test]
fn test_duplicate_pins_are_a_config_error() {
    let mut config = config();
    config.pins = PinMap {
        button: 17,
        ..PinMap::default()
    };
    let gpio = SimGpio::new();
    let (notifier, _rx) = Notifier::channel(4);

    let err = HardwareController::new(config, &gpio, Arc::new(MailStore::in_memory()), notifier)
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::Config { .. }), "{err}");
}

// ── Button and debounce ─────────────────────────────────────────────

#[test]
fn test_button_edges_drive_state_machine() {
    let mut rig = rig();
    let t0 = Instant::now();

    assert_eq!(rig.controller.flap_state(), FlapState::Closed);
    assert_eq!(
        rig.controller.handle_edge(edge(BUTTON, Edge::Rising, t0)),
        EdgeOutcome::FlapChanged(FlapState::Open)
    );
    assert_eq!(
        rig.controller
            .handle_edge(edge(BUTTON, Edge::Falling, t0 + Duration::from_millis(500))),
        EdgeOutcome::FlapChanged(FlapState::Closed)
    );

    assert_eq!(
        drain(&mut rig.notifications),
        vec![
            Notification::FlapState {
                serial: serial(),
                state: FlapState::Open
            },
            Notification::FlapState {
                serial: serial(),
                state: FlapState::Closed
            },
        ]
    );
}

#[test]
fn test_bounce_inside_window_has_no_effect() {
    let mut rig = rig();
    let t0 = Instant::now();

    rig.controller.handle_edge(edge(BUTTON, Edge::Rising, t0));
    for ms in [5, 20, 49, 50] {
        assert_eq!(
            rig.controller
                .handle_edge(edge(BUTTON, Edge::Falling, t0 + Duration::from_millis(ms))),
            EdgeOutcome::Debounced
        );
    }

    assert_eq!(rig.controller.flap_state(), FlapState::Open);
    assert_eq!(drain(&mut rig.notifications).len(), 1);
}

#[test]
fn test_repeated_button_state_is_unchanged() {
    let mut rig = rig();
    let t0 = Instant::now();

    rig.controller.handle_edge(edge(BUTTON, Edge::Rising, t0));
    assert_eq!(
        rig.controller
            .handle_edge(edge(BUTTON, Edge::Rising, t0 + Duration::from_millis(200))),
        EdgeOutcome::FlapUnchanged
    );
    assert_eq!(drain(&mut rig.notifications).len(), 1);
}

#[test]
fn test_falling_polarity_inverts_mapping() {
    let mut config = config();
    config.button_polarity = ButtonPolarity::OpenOnFalling;
    let rig = rig_with(config);

    assert_eq!(
        rig.controller
            .handle_edge(edge(BUTTON, Edge::Falling, Instant::now())),
        EdgeOutcome::FlapChanged(FlapState::Open)
    );
}

#[test]
fn test_unknown_pin_is_ignored() {
    let rig = rig();
    assert_eq!(
        rig.controller.handle_edge(edge(4, Edge::Rising, Instant::now())),
        EdgeOutcome::Ignored
    );
}

// ── Light barrier ───────────────────────────────────────────────────

#[test]
fn test_letter_detected_while_closed() {
    let mut rig = rig();
    assert_eq!(rig.controller.flap_state(), FlapState::Closed);

    assert_eq!(
        rig.controller
            .handle_edge(edge(LIGHT_BARRIER, Edge::Falling, Instant::now())),
        EdgeOutcome::LetterDetected
    );

    let letters = rig.store.list_letters(&serial()).unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].id, 1);

    let sent = drain(&mut rig.notifications);
    assert_eq!(sent.len(), 1);
    assert!(
        matches!(&sent[0], Notification::Letter { serial: s, time } if *s == serial() && *time == letters[0].time)
    );
    assert_eq!(rig.controller.flap_state(), FlapState::Closed);
}

#[test]
fn test_light_barrier_debounce_and_rising_edge() {
    let rig = rig();
    let t0 = Instant::now();

    assert_eq!(
        rig.controller
            .handle_edge(edge(LIGHT_BARRIER, Edge::Rising, t0)),
        EdgeOutcome::Ignored
    );
    rig.controller
        .handle_edge(edge(LIGHT_BARRIER, Edge::Falling, t0));
    assert_eq!(
        rig.controller
            .handle_edge(edge(LIGHT_BARRIER, Edge::Falling, t0 + Duration::from_millis(150))),
        EdgeOutcome::Debounced
    );
    assert_eq!(
        rig.controller
            .handle_edge(edge(LIGHT_BARRIER, Edge::Falling, t0 + Duration::from_millis(250))),
        EdgeOutcome::LetterDetected
    );
    assert_eq!(rig.store.list_letters(&serial()).unwrap().len(), 2);
}

#[test]
fn test_failed_letter_append_still_notifies() {
    struct BrokenLog;
    impl LetterLog for BrokenLog {
        fn append_letter(
            &self,
            _: &SerialNumber,
            _: chrono::DateTime<chrono::Utc>,
        ) -> Result<briefkasten_core::Letter, CoreError> {
            Err(CoreError::Storage {
                message: "disk full".into(),
            })
        }
        fn list_letters(&self, _: &SerialNumber) -> Result<Vec<briefkasten_core::Letter>, CoreError> {
            Ok(Vec::new())
        }
    }

    let gpio = SimGpio::new();
    let (notifier, mut rx) = Notifier::channel(4);
    let controller = HardwareController::new(config(), &gpio, Arc::new(BrokenLog), notifier).unwrap();

    assert_eq!(
        controller.handle_edge(edge(LIGHT_BARRIER, Edge::Falling, Instant::now())),
        EdgeOutcome::LetterDetected
    );
    assert!(matches!(rx.try_recv().unwrap(), Notification::Letter { .. }));
}

// ── Running controller ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_open_is_idempotent() {
    let rig = rig();
    rig.controller.start().await;

    assert!(rig.controller.open_flap().await);
    assert!(!rig.controller.open_flap().await);
    rig.controller.shutdown().await;

    assert_eq!(rig.gpio.pulse_count(SERVO), servo_burst());
    assert_eq!(rig.controller.flap_state(), FlapState::Open);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_injected_edges_reach_controller() {
    let rig = rig();
    let mut flap = rig.controller.subscribe_flap();
    rig.controller.start().await;

    assert!(rig.gpio.inject(BUTTON, Edge::Rising, Instant::now()));
    tokio::time::timeout(Duration::from_secs(2), flap.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*flap.borrow(), FlapState::Open);

    rig.controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_leaves_outputs_low() {
    let rig = rig();
    rig.controller.start().await;
    rig.controller
        .handle_edge(edge(LIGHT_BARRIER, Edge::Falling, Instant::now()));
    rig.controller.shutdown().await;

    // The drop signal ran before shutdown turned everything off.
    assert_eq!(rig.gpio.pulse_count(27), 1);
    for pin in [17, 27, 22, SERVO] {
        assert_eq!(rig.gpio.level(pin), Some(Level::Low), "pin {pin}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bounce_drives_servo_once() {
    let rig = rig();
    rig.controller.start().await;
    let t0 = Instant::now();

    rig.controller.handle_edge(edge(BUTTON, Edge::Rising, t0));
    for ms in [3, 12, 30] {
        let edge_kind = if ms % 2 == 0 { Edge::Rising } else { Edge::Falling };
        assert_eq!(
            rig.controller
                .handle_edge(edge(BUTTON, edge_kind, t0 + Duration::from_millis(ms))),
            EdgeOutcome::Debounced
        );
    }
    rig.controller.shutdown().await;

    assert_eq!(rig.gpio.pulse_count(SERVO), servo_burst());
    assert_eq!(rig.controller.flap_state(), FlapState::Open);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_busy_actuator_never_strands_flap_state() {
    let mut config = config();
    config.actuator_queue = 1;
    config.letter_signal = Duration::from_millis(300);
    let mut rig = rig_with(config);
    rig.controller.start().await;
    let t0 = Instant::now();

    // First letter occupies the worker, second fills the one-slot queue.
    rig.controller
        .handle_edge(edge(LIGHT_BARRIER, Edge::Falling, t0));
    wait_for_drop_signal(&rig.gpio).await;
    rig.controller
        .handle_edge(edge(LIGHT_BARRIER, Edge::Falling, t0 + Duration::from_millis(250)));

    // A button move that cannot be queued leaves the state alone.
    assert_eq!(
        rig.controller
            .handle_edge(edge(BUTTON, Edge::Rising, Instant::now())),
        EdgeOutcome::ActuatorBusy
    );
    assert_eq!(rig.controller.flap_state(), FlapState::Closed);
    assert!(
        drain(&mut rig.notifications)
            .iter()
            .all(|n| matches!(n, Notification::Letter { .. }))
    );

    // A remote open waits for a slot instead of being lost.
    assert!(rig.controller.open_flap().await);
    assert_eq!(rig.controller.flap_state(), FlapState::Open);
    rig.controller.shutdown().await;

    assert_eq!(rig.gpio.pulse_count(SERVO), servo_burst());
    assert_eq!(
        drain(&mut rig.notifications),
        vec![Notification::FlapState {
            serial: serial(),
            state: FlapState::Open
        }]
    );
}
