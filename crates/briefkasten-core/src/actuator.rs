// Actuator worker.
//
// Owns the servo and the status LEDs. Runs on a blocking thread and takes
// one command at a time, so servo bursts and LED changes never interleave.

use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::CoreError;
use crate::hal::OutputLine;
use crate::led::{LedSignal, StatusLeds};
use crate::model::FlapState;
use crate::servo::Servo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActuatorCommand {
    /// Drive the servo to `state` and show its LED.
    MoveFlap(FlapState),
    /// Light the drop LED for `hold`, then restore the flap LED.
    SignalLetter { hold: Duration },
    Shutdown,
}

pub(crate) struct Actuator {
    servo: Servo<OutputLine>,
    leds: StatusLeds<OutputLine>,
    flap: FlapState,
}

impl Actuator {
    pub(crate) fn new(servo: Servo<OutputLine>, leds: StatusLeds<OutputLine>) -> Self {
        Self {
            servo,
            leds,
            flap: FlapState::Closed,
        }
    }

    /// Process commands until `Shutdown` or until every sender is gone.
    /// Commands queued before `Shutdown` are still carried out.
    pub(crate) fn run(mut self, mut commands: mpsc::Receiver<ActuatorCommand>) {
        let shown = self.leds.show(LedSignal::Standby);
        self.report(shown);

        while let Some(command) = commands.blocking_recv() {
            debug!(?command, "actuator command");
            let result = match command {
                ActuatorCommand::MoveFlap(state) => self.move_flap(state),
                ActuatorCommand::SignalLetter { hold } => self.signal_letter(hold),
                ActuatorCommand::Shutdown => break,
            };
            self.report(result);
        }

        if let Err(e) = self.servo.release() {
            error!(error = %e, "releasing servo failed");
        }
        if let Err(e) = self.leds.show(LedSignal::Off) {
            error!(error = %e, "turning LEDs off failed");
        }
        info!("actuator stopped");
    }

    fn move_flap(&mut self, state: FlapState) -> Result<(), CoreError> {
        self.flap = state;
        self.leds.show(LedSignal::for_flap(state))?;
        self.servo.drive(state)
    }

    fn signal_letter(&mut self, hold: Duration) -> Result<(), CoreError> {
        self.leds.show(LedSignal::LetterDrop)?;
        thread::sleep(hold);
        self.leds.show(LedSignal::for_flap(self.flap))
    }

    /// Write failures are absorbed here and shown as the fault pattern.
    fn report(&mut self, result: Result<(), CoreError>) {
        if let Err(e) = result {
            error!(error = %e, "actuation failed");
            if let Err(e) = self.leds.show(LedSignal::Fault) {
                error!(error = %e, "cannot show fault indication");
            }
        }
    }
}
