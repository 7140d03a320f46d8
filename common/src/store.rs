use tracing::info;

use crate::{config::TargetLimits, types::TemperatureSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOutcome {
    /// First valid reading: the target was seeded from it.
    Seeded,
    Updated,
    /// Disconnected probe; nothing changed except the connection flag.
    Skipped,
}

/// Current and target temperature shared by the sensor, control, input and radio tasks.
///
/// The target is unset until the first valid reading arrives. That reading seeds the target
/// once; after it, adjustments are accepted for the rest of the process lifetime.
#[derive(Debug, Clone)]
pub struct TemperatureStore {
    limits: TargetLimits,
    current_c: i32,
    target_c: i32,
    initialized: bool,
    sensor_connected: bool,
    last_reading_c: Option<f32>,
    reading_seq: u64,
}

impl TemperatureStore {
    pub fn new(limits: TargetLimits) -> Self {
        Self {
            limits,
            current_c: 0,
            target_c: 0,
            initialized: false,
            sensor_connected: false,
            last_reading_c: None,
            reading_seq: 0,
        }
    }

    pub fn update(&mut self, sample: TemperatureSample) -> ReadingOutcome {
        let Some(celsius) = sample.celsius() else {
            self.sensor_connected = false;
            return ReadingOutcome::Skipped;
        };

        self.sensor_connected = true;
        self.current_c = celsius.round() as i32;
        self.last_reading_c = Some(celsius);
        self.reading_seq = self.reading_seq.wrapping_add(1);

        if self.initialized {
            return ReadingOutcome::Updated;
        }

        self.target_c = self.current_c;
        self.initialized = true;
        info!(target_c = self.target_c, "target seeded from first valid reading");
        ReadingOutcome::Seeded
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_sensor_connected(&self) -> bool {
        self.sensor_connected
    }

    pub fn current(&self) -> Option<i32> {
        self.initialized.then_some(self.current_c)
    }

    pub fn target(&self) -> Option<i32> {
        self.initialized.then_some(self.target_c)
    }

    /// Latest raw reading in Celsius and its sequence number.
    pub fn last_reading(&self) -> Option<(f32, u64)> {
        self.last_reading_c
            .filter(|_| self.sensor_connected)
            .map(|celsius| (celsius, self.reading_seq))
    }

    pub fn increment_target(&mut self) -> Option<i32> {
        self.adjust_target(1)
    }

    pub fn decrement_target(&mut self) -> Option<i32> {
        self.adjust_target(-1)
    }

    /// Overwrites the target, clamped to the configured limits. Discarded before the first
    /// valid reading.
    pub fn set_target(&mut self, target_c: i32) -> Option<i32> {
        if !self.initialized {
            return None;
        }
        self.target_c = self.limits.clamp(target_c);
        Some(self.target_c)
    }

    fn adjust_target(&mut self, delta: i32) -> Option<i32> {
        self.set_target(self.target_c.saturating_add(delta))
    }
}
