//! Collaborators the control layer drives but does not implement.

use std::time::Duration;

use tracing::info;

use crate::{
    stall::StallSample,
    types::{Button, Direction, StatusSnapshot, TemperatureSample},
};

pub trait TemperatureProbe {
    fn read(&mut self) -> TemperatureSample;
}

pub trait StepperDriver {
    fn enable(&mut self, enabled: bool);
    /// Emits one step pulse. Implementations may busy-wait for the pulse width only.
    fn step(&mut self, direction: Direction, pulse_width: Duration);
}

/// Source of stall evidence: a current monitor or the driver's stall flag/register.
pub trait StallSensor {
    fn sample(&mut self) -> StallSample;
}

/// Raw, undebounced button levels.
pub trait ButtonInputs {
    fn is_asserted(&self, button: Button) -> bool;
}

/// Fire-and-forget send half of the radio link. One task owns it.
pub trait RadioSender {
    fn send(&mut self, payload: &[u8]);
}

/// Non-blocking receive half of the radio link. One task owns it.
pub trait RadioReceiver {
    fn try_receive(&mut self) -> Option<Vec<u8>>;
}

pub trait StatusDisplay {
    fn render(&mut self, snapshot: &StatusSnapshot);
}

/// Display that writes the status line to the log whenever it changes.
#[derive(Debug, Default)]
pub struct LogDisplay {
    last_line: Option<String>,
}

impl LogDisplay {
    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }
}

impl StatusDisplay for LogDisplay {
    fn render(&mut self, snapshot: &StatusSnapshot) {
        let line = snapshot.status_line();
        if self.last_line.as_deref() != Some(line.as_str()) {
            info!("display: {line}");
            self.last_line = Some(line);
        }
    }
}
