// Linux sysfs GPIO backend (`/sys/class/gpio`).
//
// Outputs are written through the line's `value` file. Sysfs cannot deliver
// edges without poll(2), so each input gets a sampler thread that reads the
// level at a fixed interval and synthesizes edges from level changes.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashSet;
use embedded_hal::digital::{ErrorType, OutputPin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    Direction, Edge, EdgeEvent, EdgeSender, EdgeSubscription, GpioBackend, GpioLine, Level,
    OutputLine, Pull,
};
use crate::error::CoreError;

const EXPORT_WAIT: Duration = Duration::from_secs(1);
const EXPORT_POLL: Duration = Duration::from_millis(10);

/// GPIO chip exposed through the sysfs class directory.
pub struct SysfsGpio {
    root: PathBuf,
    sample_interval: Duration,
    cancel: CancellationToken,
    claimed: DashSet<u32>,
}

impl SysfsGpio {
    /// `root` is normally `/sys/class/gpio`. Sampler threads stop when
    /// `cancel` fires or the edge receiver is dropped.
    pub fn new(root: impl Into<PathBuf>, sample_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            root: root.into(),
            sample_interval,
            cancel,
            claimed: DashSet::new(),
        }
    }

    /// Export the pin if needed and return its directory.
    fn export(&self, line: &GpioLine) -> Result<PathBuf, CoreError> {
        if !self.claimed.insert(line.pin) {
            return Err(CoreError::hardware(line.pin, line.name, "already claimed"));
        }

        let dir = self.root.join(format!("gpio{}", line.pin));
        if dir.exists() {
            return Ok(dir);
        }

        fs::write(self.root.join("export"), line.pin.to_string())
            .map_err(|e| CoreError::hardware(line.pin, line.name, format!("export failed: {e}")))?;

        // udev may need a moment to create the directory and fix permissions.
        let deadline = Instant::now() + EXPORT_WAIT;
        while !dir.exists() {
            if Instant::now() >= deadline {
                return Err(CoreError::hardware(
                    line.pin,
                    line.name,
                    format!("{} did not appear after export", dir.display()),
                ));
            }
            thread::sleep(EXPORT_POLL);
        }
        Ok(dir)
    }

    fn set_direction(dir: &Path, line: &GpioLine, value: &str) -> Result<(), CoreError> {
        fs::write(dir.join("direction"), value).map_err(|e| {
            CoreError::hardware(line.pin, line.name, format!("setting direction failed: {e}"))
        })
    }
}

impl GpioBackend for SysfsGpio {
    fn claim_output(&self, line: &GpioLine) -> Result<OutputLine, CoreError> {
        line.expect_direction(Direction::Output)?;
        let dir = self.export(line)?;
        // "low" sets the direction and drives the line low in one step.
        Self::set_direction(&dir, line, "low")?;

        let file = OpenOptions::new()
            .write(true)
            .open(dir.join("value"))
            .map_err(|e| CoreError::hardware(line.pin, line.name, format!("open value: {e}")))?;

        debug!(pin = line.pin, name = line.name, "claimed output");
        Ok(OutputLine::new(
            line.pin,
            SysfsOutput {
                pin: line.pin,
                name: line.name,
                file,
            },
        ))
    }

    fn claim_input(&self, line: &GpioLine, events: EdgeSender) -> Result<(), CoreError> {
        line.expect_direction(Direction::Input)?;
        let edges = line
            .edges
            .ok_or_else(|| CoreError::hardware(line.pin, line.name, "input without edges"))?;
        let dir = self.export(line)?;
        Self::set_direction(&dir, line, "in")?;

        if line.pull != Pull::None {
            debug!(
                pin = line.pin,
                pull = ?line.pull,
                "sysfs cannot set bias; configure the pull in the device tree"
            );
        }

        let mut file = File::open(dir.join("value"))
            .map_err(|e| CoreError::hardware(line.pin, line.name, format!("open value: {e}")))?;
        let initial = read_level(&mut file).ok_or_else(|| {
            CoreError::hardware(line.pin, line.name, "value file is unreadable")
        })?;

        let sampler = Sampler {
            pin: line.pin,
            edges,
            file,
            last: initial,
            interval: self.sample_interval,
            events,
            cancel: self.cancel.clone(),
        };
        thread::Builder::new()
            .name(format!("gpio{}-sampler", line.pin))
            .spawn(move || sampler.run())
            .map_err(|e| CoreError::hardware(line.pin, line.name, format!("spawn sampler: {e}")))?;

        debug!(pin = line.pin, name = line.name, ?initial, "claimed input");
        Ok(())
    }
}

// ── Output ───────────────────────────────────────────────────────────

struct SysfsOutput {
    pin: u32,
    name: &'static str,
    file: File,
}

impl SysfsOutput {
    fn write_value(&mut self, byte: &[u8]) -> Result<(), CoreError> {
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(byte))
            .map_err(|e| CoreError::hardware(self.pin, self.name, format!("write failed: {e}")))
    }
}

impl ErrorType for SysfsOutput {
    type Error = CoreError;
}

impl OutputPin for SysfsOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_value(b"0")
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_value(b"1")
    }
}

// ── Input sampling ───────────────────────────────────────────────────

struct Sampler {
    pin: u32,
    edges: EdgeSubscription,
    file: File,
    last: Level,
    interval: Duration,
    events: EdgeSender,
    cancel: CancellationToken,
}

impl Sampler {
    fn run(mut self) {
        while !self.cancel.is_cancelled() {
            thread::sleep(self.interval);

            // A torn read (file mid-rewrite) is skipped, not treated as a change.
            let Some(level) = read_level(&mut self.file) else {
                continue;
            };
            let Some(edge) = Edge::between(self.last, level) else {
                continue;
            };
            self.last = level;

            if !self.edges.matches(edge) {
                continue;
            }
            let event = EdgeEvent {
                pin: self.pin,
                edge,
                at: Instant::now(),
            };
            if self.events.send(event).is_err() {
                break;
            }
        }
        debug!(pin = self.pin, "sampler stopped");
    }
}

fn read_level(file: &mut File) -> Option<Level> {
    let mut buf = String::new();
    if let Err(e) = file.seek(SeekFrom::Start(0)).and_then(|_| file.read_to_string(&mut buf)) {
        warn!(error = %e, "reading GPIO value failed");
        return None;
    }
    match buf.trim() {
        "0" => Some(Level::Low),
        "1" => Some(Level::High),
        _ => None,
    }
}
