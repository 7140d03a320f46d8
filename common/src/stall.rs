use crate::config::StallConfig;

/// One reading from the actuator's stall source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StallSample {
    /// Motor supply current from a shunt monitor.
    CurrentMa(f32),
    /// Driver DIAG / stall flag pin.
    DriverFlag(bool),
    /// Driver StallGuard register value; lower means more load.
    StallGuardResult(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StallState {
    pub latched: bool,
    pub consecutive: u8,
}

/// Latches after `sample_limit` consecutive over-threshold samples. The latch is sticky: only
/// [`StallGuard::clear`] releases it.
#[derive(Debug, Clone)]
pub struct StallGuard {
    config: StallConfig,
    state: StallState,
}

impl StallGuard {
    pub fn new(config: StallConfig) -> Self {
        Self {
            config,
            state: StallState::default(),
        }
    }

    pub fn sample(&mut self, sample: StallSample) -> StallState {
        if self.is_over_threshold(sample) {
            self.state.consecutive = self.state.consecutive.saturating_add(1);
        } else {
            self.state.consecutive = 0;
        }

        if self.state.consecutive >= self.config.sample_limit {
            self.state.latched = true;
            self.state.consecutive = 0;
        }

        self.state
    }

    pub fn is_over_threshold(&self, sample: StallSample) -> bool {
        match sample {
            StallSample::CurrentMa(current) => {
                // An unreadable shunt is treated as a load spike.
                !current.is_finite() || current > self.config.current_threshold_ma
            }
            StallSample::DriverFlag(asserted) => asserted,
            StallSample::StallGuardResult(result) => result <= self.config.stall_guard_threshold,
        }
    }

    pub fn state(&self) -> StallState {
        self.state
    }

    pub fn is_latched(&self) -> bool {
        self.state.latched
    }

    pub fn clear(&mut self) {
        self.state = StallState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn guard() -> StallGuard {
        StallGuard::new(StallConfig::default())
    }

    #[test]
    fn four_high_then_low_never_latches() {
        let mut guard = guard();
        for _ in 0..4 {
            assert!(!guard.sample(StallSample::CurrentMa(1_500.0)).latched);
        }
        let state = guard.sample(StallSample::CurrentMa(300.0));

        assert_eq!(
            state,
            StallState {
                latched: false,
                consecutive: 0
            }
        );
    }

    #[test]
    fn five_consecutive_high_samples_latch() {
        let mut guard = guard();
        for _ in 0..4 {
            guard.sample(StallSample::CurrentMa(1_200.0));
        }
        assert!(guard.sample(StallSample::CurrentMa(1_200.0)).latched);
    }

    #[test]
    fn latch_survives_quiet_samples_until_cleared() {
        let mut guard = guard();
        for _ in 0..5 {
            guard.sample(StallSample::DriverFlag(true));
        }
        for _ in 0..100 {
            assert!(guard.sample(StallSample::DriverFlag(false)).latched);
        }

        guard.clear();
        assert!(!guard.is_latched());
    }

    #[test]
    fn threshold_is_exclusive_for_current() {
        let guard = guard();
        assert!(!guard.is_over_threshold(StallSample::CurrentMa(1_000.0)));
        assert!(guard.is_over_threshold(StallSample::CurrentMa(1_000.5)));
        assert!(guard.is_over_threshold(StallSample::CurrentMa(f32::NAN)));
    }

    #[test]
    fn stall_guard_register_counts_low_results() {
        let mut guard = guard();
        assert!(guard.is_over_threshold(StallSample::StallGuardResult(50)));
        assert!(!guard.is_over_threshold(StallSample::StallGuardResult(51)));

        for _ in 0..5 {
            guard.sample(StallSample::StallGuardResult(12));
        }
        assert!(guard.is_latched());
    }
}
