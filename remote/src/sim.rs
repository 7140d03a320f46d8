//! Simulated hardware for running the remote node on a desktop.

use std::sync::atomic::{AtomicBool, Ordering};

use radiator_common::{
    hal::{ButtonInputs, TemperatureProbe},
    types::PROBE_DISCONNECTED_C,
    Button, TemperatureSample,
};

/// Probe that drifts in a small sawtooth and drops out every `disconnect_every` reads.
pub struct SimulatedProbe {
    tick: u64,
    base_c: f32,
    disconnect_every: u64,
}

impl SimulatedProbe {
    pub fn new(base_c: f32, disconnect_every: u64) -> Self {
        Self {
            tick: 0,
            base_c,
            disconnect_every,
        }
    }

    fn raw_reading(&self) -> f32 {
        if self.disconnect_every > 0 && self.tick % self.disconnect_every == 0 {
            return PROBE_DISCONNECTED_C;
        }
        self.base_c + (self.tick % 8) as f32 * 0.2
    }
}

impl TemperatureProbe for SimulatedProbe {
    fn read(&mut self) -> TemperatureSample {
        self.tick = self.tick.saturating_add(1);
        TemperatureSample::from_raw_celsius(self.raw_reading())
    }
}

/// Raw button levels, written by the HTTP surface and sampled like GPIO pins.
#[derive(Default)]
pub struct ButtonLevels {
    levels: [AtomicBool; 2],
}

impl ButtonLevels {
    pub fn set(&self, button: Button, asserted: bool) {
        self.levels[button.index()].store(asserted, Ordering::Relaxed);
    }
}

impl ButtonInputs for ButtonLevels {
    fn is_asserted(&self, button: Button) -> bool {
        self.levels[button.index()].load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn probe_reports_periodic_disconnects() {
        let mut probe = SimulatedProbe::new(19.0, 4);
        let samples: Vec<_> = (0..8).map(|_| probe.read()).collect();

        assert!(
            matches!(samples[0], TemperatureSample::Celsius(c) if (c - 19.2).abs() < 1e-4),
            "{:?}",
            samples[0]
        );
        assert_eq!(samples[3], TemperatureSample::Disconnected);
        assert_eq!(samples[7], TemperatureSample::Disconnected);
        assert_eq!(
            samples.iter().filter(|sample| sample.is_connected()).count(),
            6
        );
    }

    #[test]
    fn button_levels_are_independent() {
        let levels = ButtonLevels::default();
        levels.set(Button::Down, true);

        assert!(levels.is_asserted(Button::Down));
        assert!(!levels.is_asserted(Button::Up));
    }
}
