// Servo actuation by software-timed pulse bursts.

use std::thread;

use embedded_hal::digital::OutputPin;
use tracing::debug;

use crate::config::ServoCalibration;
use crate::model::FlapState;

/// Hobby servo on a single output pin.
///
/// `drive` blocks for the whole burst; callers run it on a worker that owns
/// the servo, so bursts can never interleave.
pub struct Servo<P: OutputPin> {
    pin: P,
    calibration: ServoCalibration,
}

impl<P: OutputPin> Servo<P> {
    pub fn new(pin: P, calibration: ServoCalibration) -> Self {
        Self { pin, calibration }
    }

    pub fn calibration(&self) -> &ServoCalibration {
        &self.calibration
    }

    /// Pulse the pin towards `target`, then leave it low so the servo
    /// stops holding torque.
    pub fn drive(&mut self, target: FlapState) -> Result<(), P::Error> {
        let width = self.calibration.width_for(target);
        let rest = self.calibration.period.saturating_sub(width);
        let pulses = self.calibration.pulse_count();
        debug!(%target, ?width, pulses, "servo burst");

        let result: Result<(), P::Error> = (0..pulses).try_for_each(|_| {
            self.pin.set_high()?;
            thread::sleep(width);
            self.pin.set_low()?;
            thread::sleep(rest);
            Ok(())
        });

        if result.is_err() {
            // Never leave the pin high after a failed burst.
            let _ = self.pin.set_low();
        }
        result
    }

    /// Drive the pin low.
    pub fn release(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()
    }
}
