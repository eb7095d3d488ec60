// ── Hardware controller ──
//
// Single owner of the mailbox hardware. Claims every GPIO line at
// construction, debounces input edges, runs the flap state machine and
// hands actuation to the actuator worker. Letter and flap reports go out
// through the notifier queue; nothing on the edge path touches the network.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actuator::{Actuator, ActuatorCommand};
use crate::config::DeviceConfig;
use crate::debounce::Debouncer;
use crate::error::CoreError;
use crate::hal::{Edge, EdgeEvent, EdgeReceiver, EdgeSubscription, GpioBackend, GpioLine, Pull};
use crate::led::StatusLeds;
use crate::model::{FlapState, SerialNumber};
use crate::notifier::Notifier;
use crate::servo::Servo;
use crate::store::LetterLog;

// ── EdgeOutcome ─────────────────────────────────────────────────────

/// What the controller did with one input edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Inside the line's debounce window; no side effects.
    Debounced,
    /// Not a line or edge the controller acts on.
    Ignored,
    /// Button edge moved the flap into a new state.
    FlapChanged(FlapState),
    /// Button edge asked for the state the flap is already in.
    FlapUnchanged,
    /// Actuator queue full; the state was left as it was.
    ActuatorBusy,
    /// Light barrier fired: letter logged and reported.
    LetterDetected,
}

// ── HardwareController ──────────────────────────────────────────────

/// Cheaply cloneable handle to the one controller instance.
///
/// Construct with [`new()`](Self::new), then [`start()`](Self::start) the
/// actuator and edge dispatch tasks. [`shutdown()`](Self::shutdown) stops
/// them and leaves every output low.
#[derive(Clone)]
pub struct HardwareController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: DeviceConfig,
    flap: watch::Sender<FlapState>,
    debouncers: DashMap<u32, Debouncer>,
    letters: Arc<dyn LetterLog>,
    notifier: Notifier,
    actuator_tx: mpsc::Sender<ActuatorCommand>,
    actuator: Mutex<Option<(Actuator, mpsc::Receiver<ActuatorCommand>)>>,
    edges_rx: Mutex<Option<EdgeReceiver>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl HardwareController {
    /// Claim every line in the pin map. Any failed claim aborts
    /// construction; the controller never runs with partial hardware.
    pub fn new(
        config: DeviceConfig,
        gpio: &dyn GpioBackend,
        letters: Arc<dyn LetterLog>,
        notifier: Notifier,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let pins = config.pins;

        let leds = StatusLeds::new(
            gpio.claim_output(&GpioLine::output(pins.led_red, "led_red"))?,
            gpio.claim_output(&GpioLine::output(pins.led_yellow, "led_yellow"))?,
            gpio.claim_output(&GpioLine::output(pins.led_green, "led_green"))?,
        );
        let servo = Servo::new(
            gpio.claim_output(&GpioLine::output(pins.servo, "servo"))?,
            config.servo,
        );

        let (edge_tx, edges_rx) = mpsc::unbounded_channel();
        gpio.claim_input(
            &GpioLine::input(pins.button, "button", Pull::Up, EdgeSubscription::Both),
            edge_tx.clone(),
        )?;
        gpio.claim_input(
            &GpioLine::input(
                pins.light_barrier,
                "light_barrier",
                Pull::Up,
                EdgeSubscription::Falling,
            ),
            edge_tx,
        )?;

        let debouncers = DashMap::new();
        debouncers.insert(pins.button, Debouncer::new(config.debounce.button));
        debouncers.insert(
            pins.light_barrier,
            Debouncer::new(config.debounce.light_barrier),
        );

        let (actuator_tx, actuator_rx) = mpsc::channel(config.actuator_queue);
        let (flap, _) = watch::channel(FlapState::Closed);

        info!(serial = %config.serial_number, ?pins, "hardware claimed");

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                flap,
                debouncers,
                letters,
                notifier,
                actuator_tx,
                actuator: Mutex::new(Some((Actuator::new(servo, leds), actuator_rx))),
                edges_rx: Mutex::new(Some(edges_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.inner.config.serial_number
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Spawn the actuator worker and the edge dispatcher. Calling this
    /// again is a no-op.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;

        if let Some((actuator, rx)) = self.inner.actuator.lock().await.take() {
            handles.push(tokio::task::spawn_blocking(move || actuator.run(rx)));
        }

        if let Some(rx) = self.inner.edges_rx.lock().await.take() {
            let ctrl = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(edge_dispatch_task(ctrl, rx, cancel)));
        }

        debug!("controller started");
    }

    /// Stop edge dispatch, let the actuator finish its queue, then join.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        // A never-started actuator would leave the send below waiting forever.
        if self.inner.actuator.lock().await.take().is_some() {
            debug!("actuator was never started");
        } else if self
            .inner
            .actuator_tx
            .send(ActuatorCommand::Shutdown)
            .await
            .is_err()
        {
            debug!("actuator already stopped");
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "controller task ended abnormally");
            }
        }
        info!("controller stopped");
    }

    /// Token cancelled by [`shutdown()`](Self::shutdown).
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    // ── Flap state ──────────────────────────────────────────────────

    pub fn flap_state(&self) -> FlapState {
        *self.inner.flap.borrow()
    }

    pub fn subscribe_flap(&self) -> watch::Receiver<FlapState> {
        self.inner.flap.subscribe()
    }

    /// External open command (remote unlock). Waits for room in the
    /// actuator queue, so an unlock is never dropped. Returns `false` if the
    /// flap was already open or the actuator has stopped; no servo burst is
    /// issued in either case.
    pub async fn open_flap(&self) -> bool {
        if self.flap_state().is_open() {
            return false;
        }
        let Ok(permit) = self.inner.actuator_tx.reserve().await else {
            debug!("actuator stopped, ignoring open command");
            return false;
        };
        let opened = self.commit(FlapState::Open, permit);
        if opened {
            info!(serial = %self.inner.config.serial_number, "flap unlocked remotely");
        }
        opened
    }

    // ── Edge handling ───────────────────────────────────────────────

    /// Apply one input edge. Never fails: downstream problems are logged
    /// and absorbed so later edges are still processed.
    pub fn handle_edge(&self, event: EdgeEvent) -> EdgeOutcome {
        let pins = self.inner.config.pins;
        let is_button = event.pin == pins.button;
        let is_letter = event.pin == pins.light_barrier && event.edge == Edge::Falling;
        if !is_button && !is_letter {
            return EdgeOutcome::Ignored;
        }

        let accepted = self
            .inner
            .debouncers
            .get_mut(&event.pin)
            .is_some_and(|mut d| d.accept(event.at));
        if !accepted {
            debug!(pin = event.pin, edge = ?event.edge, "debounced");
            return EdgeOutcome::Debounced;
        }

        if is_letter {
            self.letter_detected();
            return EdgeOutcome::LetterDetected;
        }

        let target = self.inner.config.button_polarity.flap_state_for(event.edge);
        self.transition(target)
    }

    /// Button-driven move to `target`. The state only changes once the
    /// servo command has a queue slot.
    fn transition(&self, target: FlapState) -> EdgeOutcome {
        if self.flap_state() == target {
            return EdgeOutcome::FlapUnchanged;
        }
        match self.inner.actuator_tx.try_reserve() {
            Ok(permit) => {
                if self.commit(target, permit) {
                    EdgeOutcome::FlapChanged(target)
                } else {
                    EdgeOutcome::FlapUnchanged
                }
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!(state = %target, "actuator busy, flap move refused");
                EdgeOutcome::ActuatorBusy
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!(state = %target, "actuator stopped, flap move ignored");
                EdgeOutcome::FlapUnchanged
            }
        }
    }

    /// Commit `target` and queue its servo move on the reserved slot.
    /// Returns whether the state changed; the slot is released otherwise.
    fn commit(&self, target: FlapState, permit: mpsc::Permit<'_, ActuatorCommand>) -> bool {
        let changed = self.inner.flap.send_if_modified(|state| {
            if *state == target {
                false
            } else {
                *state = target;
                true
            }
        });
        if !changed {
            return false;
        }

        let serial = &self.inner.config.serial_number;
        info!(%serial, state = %target, "flap state changed");
        permit.send(ActuatorCommand::MoveFlap(target));
        self.inner
            .notifier
            .report_flap_state(serial, target.is_open());
        true
    }

    fn letter_detected(&self) {
        let serial = &self.inner.config.serial_number;
        let now = Utc::now();

        self.actuate(ActuatorCommand::SignalLetter {
            hold: self.inner.config.letter_signal,
        });
        match self.inner.letters.append_letter(serial, now) {
            Ok(letter) => info!(%serial, id = letter.id, "letter detected"),
            Err(e) => warn!(%serial, error = %e, "appending letter failed"),
        }
        self.inner.notifier.report_letter(serial, now);
    }

    /// Queue a letter signal. Signals beyond the queue are dropped.
    fn actuate(&self, command: ActuatorCommand) {
        match self.inner.actuator_tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                warn!(?command, "actuator busy, dropping command");
            }
            Err(mpsc::error::TrySendError::Closed(command)) => {
                debug!(?command, "actuator stopped, dropping command");
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn edge_dispatch_task(
    ctrl: HardwareController,
    mut rx: EdgeReceiver,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => {
                    let outcome = ctrl.handle_edge(event);
                    debug!(pin = event.pin, edge = ?event.edge, ?outcome, "edge handled");
                }
                None => break,
            },
        }
    }
    debug!("edge dispatcher stopped");
}
