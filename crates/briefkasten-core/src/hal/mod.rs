// ── GPIO abstraction ──
//
// The controller only sees `GpioBackend` and `OutputLine`, an
// `embedded_hal` output pin erased over the backend. Input lines
// deliver edges by pushing `EdgeEvent`s into a channel, so whatever fires
// the edge (a sampler thread, an interrupt, a test) never waits on the
// controller.

mod sim;
mod sysfs;

use std::time::Instant;

use embedded_hal::digital::{ErrorType, OutputPin};
use tokio::sync::mpsc;

use crate::error::CoreError;

pub use sim::SimGpio;
pub use sysfs::SysfsGpio;

/// Electrical level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Self::High
    }
}

/// Transition direction of an input edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    /// The edge that leads from `from` to `to`, if the level changed.
    pub fn between(from: Level, to: Level) -> Option<Self> {
        match (from, to) {
            (Level::Low, Level::High) => Some(Self::Rising),
            (Level::High, Level::Low) => Some(Self::Falling),
            _ => None,
        }
    }
}

/// Which edges an input line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSubscription {
    Rising,
    Falling,
    Both,
}

impl EdgeSubscription {
    pub fn matches(self, edge: Edge) -> bool {
        matches!(
            (self, edge),
            (Self::Both, _) | (Self::Rising, Edge::Rising) | (Self::Falling, Edge::Falling)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// One physical line as claimed at controller construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioLine {
    pub pin: u32,
    pub name: &'static str,
    pub direction: Direction,
    pub pull: Pull,
    /// `Some` for inputs only.
    pub edges: Option<EdgeSubscription>,
}

impl GpioLine {
    pub fn output(pin: u32, name: &'static str) -> Self {
        Self {
            pin,
            name,
            direction: Direction::Output,
            pull: Pull::None,
            edges: None,
        }
    }

    pub fn input(pin: u32, name: &'static str, pull: Pull, edges: EdgeSubscription) -> Self {
        Self {
            pin,
            name,
            direction: Direction::Input,
            pull,
            edges: Some(edges),
        }
    }

    pub(crate) fn expect_direction(&self, direction: Direction) -> Result<(), CoreError> {
        if self.direction == direction {
            Ok(())
        } else {
            Err(CoreError::hardware(
                self.pin,
                self.name,
                format!("claimed as {direction:?} but configured as {:?}", self.direction),
            ))
        }
    }
}

/// An edge observed on an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub pin: u32,
    pub edge: Edge,
    pub at: Instant,
}

pub type EdgeSender = mpsc::UnboundedSender<EdgeEvent>;
pub type EdgeReceiver = mpsc::UnboundedReceiver<EdgeEvent>;

/// A claimed output line. Drivers take any `OutputPin`; backends hand out
/// this boxed form so the controller does not depend on the chip type.
pub struct OutputLine {
    pin: u32,
    inner: Box<dyn OutputPin<Error = CoreError> + Send>,
}

impl OutputLine {
    pub fn new(pin: u32, inner: impl OutputPin<Error = CoreError> + Send + 'static) -> Self {
        Self {
            pin,
            inner: Box::new(inner),
        }
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl ErrorType for OutputLine {
    type Error = CoreError;
}

impl OutputPin for OutputLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.inner.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.inner.set_high()
    }
}

/// Source of GPIO lines.
///
/// Claims happen once, at controller construction. A failed claim is a
/// configuration error and aborts startup.
pub trait GpioBackend: Send + Sync {
    fn claim_output(&self, line: &GpioLine) -> Result<OutputLine, CoreError>;

    /// Start reporting the line's subscribed edges into `events`.
    fn claim_input(&self, line: &GpioLine, events: EdgeSender) -> Result<(), CoreError>;
}
