// In-memory GPIO backend.
//
// Records every output write in order and lets callers inject input edges.
// Used by the test suites and for running the controller without hardware.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use dashmap::{DashMap, DashSet};
use embedded_hal::digital::{ErrorType, OutputPin};

use super::{
    Direction, Edge, EdgeSender, EdgeSubscription, GpioBackend, GpioLine, Level, OutputLine,
};
use crate::error::CoreError;

/// Simulated GPIO chip. Cheaply cloneable; clones share state.
#[derive(Clone, Default)]
pub struct SimGpio {
    inner: Arc<SimInner>,
}

#[derive(Default)]
struct SimInner {
    writes: Mutex<Vec<(u32, Level)>>,
    claimed: DashSet<u32>,
    inputs: DashMap<u32, SimInput>,
    broken: DashSet<u32>,
}

struct SimInput {
    edges: EdgeSubscription,
    events: EdgeSender,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every claim of `pin` fail, as if the line were held elsewhere.
    pub fn break_pin(&self, pin: u32) {
        self.inner.broken.insert(pin);
    }

    /// Fire an edge on an input line. Returns `false` if the line is not
    /// claimed or not subscribed to this edge.
    pub fn inject(&self, pin: u32, edge: Edge, at: Instant) -> bool {
        let Some(input) = self.inner.inputs.get(&pin) else {
            return false;
        };
        if !input.edges.matches(edge) {
            return false;
        }
        input
            .events
            .send(super::EdgeEvent { pin, edge, at })
            .is_ok()
    }

    /// Every output write so far, in order.
    pub fn writes(&self) -> Vec<(u32, Level)> {
        self.lock_writes().clone()
    }

    /// Writes to one pin, in order.
    pub fn writes_for(&self, pin: u32) -> Vec<Level> {
        self.lock_writes()
            .iter()
            .filter(|(p, _)| *p == pin)
            .map(|(_, l)| *l)
            .collect()
    }

    /// Last level written to `pin`.
    pub fn level(&self, pin: u32) -> Option<Level> {
        self.lock_writes()
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, l)| *l)
    }

    /// Number of high pulses written to `pin`.
    pub fn pulse_count(&self, pin: u32) -> usize {
        self.writes_for(pin)
            .into_iter()
            .filter(|l| l.is_high())
            .count()
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, Vec<(u32, Level)>> {
        self.inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, line: &GpioLine) -> Result<(), CoreError> {
        if self.inner.broken.contains(&line.pin) {
            return Err(CoreError::hardware(line.pin, line.name, "line busy"));
        }
        if !self.inner.claimed.insert(line.pin) {
            return Err(CoreError::hardware(line.pin, line.name, "already claimed"));
        }
        Ok(())
    }
}

impl GpioBackend for SimGpio {
    fn claim_output(&self, line: &GpioLine) -> Result<OutputLine, CoreError> {
        line.expect_direction(Direction::Output)?;
        self.claim(line)?;
        Ok(OutputLine::new(
            line.pin,
            SimOutput {
                pin: line.pin,
                gpio: self.clone(),
            },
        ))
    }

    fn claim_input(&self, line: &GpioLine, events: EdgeSender) -> Result<(), CoreError> {
        line.expect_direction(Direction::Input)?;
        let edges = line
            .edges
            .ok_or_else(|| CoreError::hardware(line.pin, line.name, "input without edges"))?;
        self.claim(line)?;
        self.inner.inputs.insert(line.pin, SimInput { edges, events });
        Ok(())
    }
}

struct SimOutput {
    pin: u32,
    gpio: SimGpio,
}

impl SimOutput {
    fn record(&self, level: Level) {
        self.gpio.lock_writes().push((self.pin, level));
    }
}

impl ErrorType for SimOutput {
    type Error = CoreError;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(Level::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(Level::High);
        Ok(())
    }
}
