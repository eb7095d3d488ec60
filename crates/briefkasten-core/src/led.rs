// Status LEDs.
//
// Three single-color LEDs; each signal lights a fixed combination.

use embedded_hal::digital::{OutputPin, PinState};

use crate::model::FlapState;

/// What the LEDs currently say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum LedSignal {
    /// Flap closed, ready (green).
    Standby,
    /// Flap open (red).
    Open,
    /// A letter just passed the light barrier (yellow).
    LetterDrop,
    /// A hardware write failed (red + yellow).
    Fault,
    Off,
}

impl LedSignal {
    pub fn for_flap(state: FlapState) -> Self {
        match state {
            FlapState::Closed => Self::Standby,
            FlapState::Open => Self::Open,
        }
    }

    /// (red, yellow, green)
    fn states(self) -> (PinState, PinState, PinState) {
        use PinState::{High, Low};
        match self {
            Self::Standby => (Low, Low, High),
            Self::Open => (High, Low, Low),
            Self::LetterDrop => (Low, High, Low),
            Self::Fault => (High, High, Low),
            Self::Off => (Low, Low, Low),
        }
    }
}

pub struct StatusLeds<P: OutputPin> {
    red: P,
    yellow: P,
    green: P,
    current: LedSignal,
}

impl<P: OutputPin> StatusLeds<P> {
    pub fn new(red: P, yellow: P, green: P) -> Self {
        Self {
            red,
            yellow,
            green,
            current: LedSignal::Off,
        }
    }

    pub fn current(&self) -> LedSignal {
        self.current
    }

    pub fn show(&mut self, signal: LedSignal) -> Result<(), P::Error> {
        let (red, yellow, green) = signal.states();
        self.red.set_state(red)?;
        self.yellow.set_state(yellow)?;
        self.green.set_state(green)?;
        self.current = signal;
        Ok(())
    }
}
