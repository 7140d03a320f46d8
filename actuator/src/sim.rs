//! Simulated spindle, driver and current monitor for running the actuator node on a desktop.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::Serialize;

use radiator_common::{
    hal::{StallSensor, StepperDriver},
    Direction, StallSample,
};

const RUNNING_CURRENT_MA: f32 = 350.0;
const JAMMED_CURRENT_MA: f32 = 1_450.0;

/// Physical spindle shared by the simulated driver and current monitor.
///
/// The travel ends at `max_position` like a mechanical end stop. An optional obstruction
/// keeps the spindle from retracting below a given position; pushing against it jams the
/// drive until it steps the other way.
#[derive(Debug)]
struct Spindle {
    position: AtomicU16,
    max_position: u16,
    obstruction: Option<u16>,
    jammed: AtomicBool,
    enabled: AtomicBool,
    pulses: AtomicU64,
}

impl Spindle {
    fn step(&self, direction: Direction) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
        let position = self.position.load(Ordering::Relaxed);
        let next = match direction {
            Direction::Forward => position.saturating_add(1).min(self.max_position),
            Direction::Backward => position.saturating_sub(1),
        };

        if self.obstruction.is_some_and(|limit| next < limit) {
            self.jammed.store(true, Ordering::Relaxed);
            return;
        }
        self.jammed.store(false, Ordering::Relaxed);
        self.position.store(next, Ordering::Relaxed);
    }
}

pub struct SimulatedStepper {
    spindle: Arc<Spindle>,
}

pub struct SimulatedCurrentSensor {
    spindle: Arc<Spindle>,
}

/// Read-only handle on the physical spindle, for comparing it with the open-loop position.
#[derive(Clone)]
pub struct SpindleView {
    spindle: Arc<Spindle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpindleReading {
    pub physical_position: u16,
    pub pulses: u64,
    pub jammed: bool,
    pub enabled: bool,
}

/// Builds the driver, current monitor and view for one simulated spindle starting at `start`.
pub fn simulated_valve(
    start: u16,
    max_position: u16,
    obstruction: Option<u16>,
) -> (SimulatedStepper, SimulatedCurrentSensor, SpindleView) {
    let spindle = Arc::new(Spindle {
        position: AtomicU16::new(start.min(max_position)),
        max_position,
        obstruction,
        jammed: AtomicBool::new(false),
        enabled: AtomicBool::new(false),
        pulses: AtomicU64::new(0),
    });
    (
        SimulatedStepper {
            spindle: Arc::clone(&spindle),
        },
        SimulatedCurrentSensor {
            spindle: Arc::clone(&spindle),
        },
        SpindleView { spindle },
    )
}

impl SpindleView {
    pub fn reading(&self) -> SpindleReading {
        SpindleReading {
            physical_position: self.spindle.position.load(Ordering::Relaxed),
            pulses: self.spindle.pulses.load(Ordering::Relaxed),
            jammed: self.spindle.jammed.load(Ordering::Relaxed),
            enabled: self.spindle.enabled.load(Ordering::Relaxed),
        }
    }
}

impl StepperDriver for SimulatedStepper {
    fn enable(&mut self, enabled: bool) {
        self.spindle.enabled.store(enabled, Ordering::Relaxed);
    }

    fn step(&mut self, direction: Direction, _pulse_width: Duration) {
        if self.spindle.enabled.load(Ordering::Relaxed) {
            self.spindle.step(direction);
        }
    }
}

impl StallSensor for SimulatedCurrentSensor {
    fn sample(&mut self) -> StallSample {
        let current_ma = if !self.spindle.enabled.load(Ordering::Relaxed) {
            0.0
        } else if self.spindle.jammed.load(Ordering::Relaxed) {
            JAMMED_CURRENT_MA
        } else {
            RUNNING_CURRENT_MA
        };
        StallSample::CurrentMa(current_ma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PULSE: Duration = Duration::from_micros(1_000);

    #[test]
    fn spindle_stops_at_end_stop() {
        let (mut stepper, _, view) = simulated_valve(98, 100, None);
        stepper.enable(true);
        for _ in 0..5 {
            stepper.step(Direction::Forward, PULSE);
        }

        let reading = view.reading();
        assert_eq!(reading.physical_position, 100);
        assert_eq!(reading.pulses, 5);
    }

    #[test]
    fn disabled_driver_does_not_move() {
        let (mut stepper, mut sensor, view) = simulated_valve(50, 100, None);
        stepper.step(Direction::Backward, PULSE);

        assert_eq!(view.reading().physical_position, 50);
        assert_eq!(view.reading().pulses, 0);
        assert_eq!(sensor.sample(), StallSample::CurrentMa(0.0));
    }

    #[test]
    fn obstruction_jams_until_reversed() {
        let (mut stepper, mut sensor, view) = simulated_valve(62, 100, Some(60));
        stepper.enable(true);
        for _ in 0..5 {
            stepper.step(Direction::Backward, PULSE);
        }

        assert_eq!(view.reading().physical_position, 60);
        assert!(view.reading().jammed);
        assert_eq!(sensor.sample(), StallSample::CurrentMa(JAMMED_CURRENT_MA));

        stepper.step(Direction::Forward, PULSE);
        assert_eq!(view.reading().physical_position, 61);
        assert_eq!(sensor.sample(), StallSample::CurrentMa(RUNNING_CURRENT_MA));
    }
}
