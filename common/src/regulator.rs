use crate::{
    config::RegulatorConfig,
    trend::TrendBuffer,
    types::{TemperatureSample, ValvePosition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulatorDecision {
    WithinDeadBand,
    /// Already fully open while heating, or fully closed while cooling.
    AtLimit,
    Hold,
    Opened,
    Closed,
}

impl RegulatorDecision {
    pub fn moved_valve(self) -> bool {
        matches!(self, Self::Opened | Self::Closed)
    }
}

/// Fixed-step bang-bang valve controller with trend-based correction.
///
/// Every adjustment moves the valve by exactly `small_step` percent. There is no
/// proportional term, so the valve settles near, not exactly at, the opening that holds the
/// room at target.
#[derive(Debug, Clone)]
pub struct ValveRegulator {
    config: RegulatorConfig,
    position: ValvePosition,
    history: TrendBuffer,
}

impl ValveRegulator {
    pub fn new(config: RegulatorConfig) -> Self {
        let history = TrendBuffer::new(config.history_len);
        Self {
            config,
            position: ValvePosition::CLOSED,
            history,
        }
    }

    pub fn config(&self) -> &RegulatorConfig {
        &self.config
    }

    pub fn position(&self) -> ValvePosition {
        self.position
    }

    pub fn set_position(&mut self, percent: i32) {
        self.position = ValvePosition::new(percent);
    }

    pub fn record_temperature(&mut self, sample: TemperatureSample) -> bool {
        self.history.push(sample)
    }

    pub fn trend(&self) -> f32 {
        self.history.trend()
    }

    pub fn history(&self) -> &TrendBuffer {
        &self.history
    }

    pub fn update(&mut self, current_c: f32, target_c: f32) -> RegulatorDecision {
        if (current_c - target_c).abs() <= self.config.dead_band_c {
            return RegulatorDecision::WithinDeadBand;
        }

        let trend = self.trend();

        if target_c > current_c {
            if self.position.is_open() {
                RegulatorDecision::AtLimit
            } else if self.position.is_closed() || trend < self.config.min_warming_rate {
                self.open()
            } else if trend > self.config.max_warming_rate {
                self.close()
            } else {
                RegulatorDecision::Hold
            }
        } else if self.position.is_closed() {
            RegulatorDecision::AtLimit
        } else if self.position.is_open() || trend > self.config.min_cooling_rate {
            self.close()
        } else if trend < self.config.max_cooling_rate {
            self.open()
        } else {
            RegulatorDecision::Hold
        }
    }

    fn open(&mut self) -> RegulatorDecision {
        self.position = self.position.opened_by(self.config.small_step);
        RegulatorDecision::Opened
    }

    fn close(&mut self) -> RegulatorDecision {
        self.position = self.position.closed_by(self.config.small_step);
        RegulatorDecision::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn regulator() -> ValveRegulator {
        ValveRegulator::new(RegulatorConfig::default())
    }

    fn feed(regulator: &mut ValveRegulator, values: &[f32]) {
        for value in values {
            regulator.record_temperature(TemperatureSample::Celsius(*value));
        }
    }

    #[test]
    fn dead_band_leaves_position_unchanged() {
        let mut regulator = regulator();
        regulator.set_position(40);

        for (current, target) in [(21.0, 21.0), (21.0, 21.1), (21.15, 21.0), (20.85, 21.0)] {
            assert_eq!(
                regulator.update(current, target),
                RegulatorDecision::WithinDeadBand
            );
            assert_eq!(regulator.position().get(), 40);
        }
    }

    #[test]
    fn closed_valve_opens_one_step_when_heating() {
        let mut regulator = regulator();
        feed(&mut regulator, &[18.0, 19.0, 20.0]);

        assert_eq!(regulator.update(18.0, 22.0), RegulatorDecision::Opened);
        assert_eq!(regulator.position().get(), 5);
    }

    #[test]
    fn warming_too_fast_closes_slightly() {
        let mut regulator = regulator();
        regulator.set_position(50);
        feed(&mut regulator, &[18.0, 18.5, 19.0]);

        assert_eq!(regulator.update(19.0, 22.0), RegulatorDecision::Closed);
        assert_eq!(regulator.position().get(), 45);
    }

    #[test]
    fn adequate_warming_holds() {
        let mut regulator = regulator();
        regulator.set_position(50);
        feed(&mut regulator, &[18.0, 18.1, 18.2]);

        assert_eq!(regulator.update(18.2, 22.0), RegulatorDecision::Hold);
        assert_eq!(regulator.position().get(), 50);
    }

    #[test]
    fn fully_open_valve_is_left_alone_while_heating() {
        let mut regulator = regulator();
        regulator.set_position(100);
        feed(&mut regulator, &[18.0, 19.0]);

        assert_eq!(regulator.update(18.0, 22.0), RegulatorDecision::AtLimit);
        assert_eq!(regulator.position(), ValvePosition::OPEN);
    }

    #[test]
    fn cooling_branch_mirrors_heating() {
        let mut regulator = regulator();

        regulator.set_position(0);
        assert_eq!(regulator.update(24.0, 21.0), RegulatorDecision::AtLimit);

        regulator.set_position(100);
        assert_eq!(regulator.update(24.0, 21.0), RegulatorDecision::Closed);
        assert_eq!(regulator.position().get(), 95);

        // Falling slowly: close further.
        feed(&mut regulator, &[24.0, 23.98]);
        assert_eq!(regulator.update(23.98, 21.0), RegulatorDecision::Closed);
        assert_eq!(regulator.position().get(), 90);

        // Falling fast: open back up.
        regulator.history.clear();
        feed(&mut regulator, &[24.0, 23.5]);
        assert_eq!(regulator.update(23.5, 21.0), RegulatorDecision::Opened);
        assert_eq!(regulator.position().get(), 95);

        // Falling at a comfortable rate: hold.
        regulator.history.clear();
        feed(&mut regulator, &[24.0, 23.9]);
        assert_eq!(regulator.update(23.9, 21.0), RegulatorDecision::Hold);
    }

    #[test]
    fn position_stays_in_range_under_stress() {
        let mut regulator = regulator();
        let mut temp = 15.0_f32;

        for i in 0..1_000 {
            let target = if (i / 37) % 2 == 0 { 25.0 } else { 10.0 };
            temp += if i % 3 == 0 { 0.7 } else { -0.4 };
            regulator.record_temperature(TemperatureSample::Celsius(temp));
            regulator.update(temp, target);

            let position = regulator.position().get();
            assert!(position <= 100, "position {position} escaped range");
        }
    }

    #[test]
    fn slow_warmup_opens_step_by_step_until_fully_open() {
        let mut regulator = regulator();

        assert_eq!(regulator.update(18.0, 22.0), RegulatorDecision::Opened);
        assert_eq!(regulator.position().get(), 5);

        let mut temp = 18.0_f32;
        regulator.record_temperature(TemperatureSample::Celsius(temp));
        for _ in 0..5 {
            temp += 0.02;
            regulator.record_temperature(TemperatureSample::Celsius(temp));
        }
        assert!((regulator.trend() - 0.02).abs() < 1e-4);

        let mut expected = 5;
        while expected < 100 {
            temp += 0.02;
            regulator.record_temperature(TemperatureSample::Celsius(temp));
            assert_eq!(regulator.update(temp, 22.0), RegulatorDecision::Opened);
            expected += 5;
            assert_eq!(i32::from(regulator.position().get()), expected);
        }

        for _ in 0..3 {
            assert_eq!(regulator.update(temp, 22.0), RegulatorDecision::AtLimit);
            assert_eq!(regulator.position(), ValvePosition::OPEN);
        }
    }
}
