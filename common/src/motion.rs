use crate::{
    config::{ActuatorConfig, StallConfig},
    error::CommandError,
    stall::{StallGuard, StallSample, StallState},
    types::{Direction, ValvePolarity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Step(Direction),
    /// Gate open and position at target.
    Idle,
    /// No command received yet, or the stall latch is set.
    Gated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Target set and gate opened; `cleared_stall` if this released a latch.
    Accepted { target: u16, cleared_stall: bool },
    /// Same target as the one the stall latched on. The latch stays set.
    Repeated { target: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSnapshot {
    pub current_position: u16,
    pub target_position: u16,
    pub command_received: bool,
    pub stall_latched: bool,
    pub homed: bool,
    pub percent_open: f32,
}

/// Hand-off between the radio receive, stall monitor and motor tasks on the actuator node.
///
/// The motor task asks for one step at a time, so a stall or a new command takes effect
/// within one step period.
#[derive(Debug, Clone)]
pub struct MotionState {
    max_position: u16,
    polarity: ValvePolarity,
    current_position: u16,
    target_position: u16,
    command_received: bool,
    homed: bool,
    stall: StallGuard,
}

impl MotionState {
    pub fn new(actuator: &ActuatorConfig, stall: StallConfig) -> Self {
        Self {
            max_position: actuator.max_position,
            polarity: actuator.polarity,
            current_position: 0,
            target_position: 0,
            command_received: false,
            homed: false,
            stall: StallGuard::new(stall),
        }
    }

    /// Marks the spindle as fully pressed after the boot homing run. Motion stays gated
    /// until the first command.
    pub fn finish_homing(&mut self) {
        self.current_position = self.max_position;
        self.target_position = self.max_position;
        self.command_received = false;
        self.homed = true;
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    /// Validates a percent-open command, retargets the spindle and clears any stall latch.
    ///
    /// Commands are refused until homing has finished. While latched, a command for the
    /// target the stall happened on does not count as new: the link resends the last
    /// position periodically, and that must not release the latch.
    pub fn accept_command(&mut self, percent_open: f32) -> Result<CommandOutcome, CommandError> {
        if !percent_open.is_finite() || !(0.0..=100.0).contains(&percent_open) {
            return Err(CommandError::InvalidPercent(percent_open));
        }
        if !self.homed {
            return Err(CommandError::NotHomed);
        }

        let target = self.polarity.stepper_target(percent_open, self.max_position);
        let latched = self.stall.is_latched();
        if latched && target == self.target_position {
            return Ok(CommandOutcome::Repeated { target });
        }

        self.target_position = target;
        self.stall.clear();
        self.command_received = true;
        Ok(CommandOutcome::Accepted {
            target,
            cleared_stall: latched,
        })
    }

    /// Feeds the stall guard. Returns `true` when this sample set the latch, which also closes
    /// the command gate.
    pub fn record_stall_sample(&mut self, sample: StallSample) -> bool {
        let was_latched = self.stall.is_latched();
        let state = self.stall.sample(sample);
        if state.latched {
            self.command_received = false;
        }
        state.latched && !was_latched
    }

    pub fn next_step(&self) -> StepDecision {
        if !self.command_received || self.stall.is_latched() {
            return StepDecision::Gated;
        }

        match self.target_position.cmp(&self.current_position) {
            std::cmp::Ordering::Greater => StepDecision::Step(Direction::Forward),
            std::cmp::Ordering::Less => StepDecision::Step(Direction::Backward),
            std::cmp::Ordering::Equal => StepDecision::Idle,
        }
    }

    pub fn complete_step(&mut self, direction: Direction) -> u16 {
        self.current_position = match direction {
            Direction::Forward => self
                .current_position
                .saturating_add(1)
                .min(self.max_position),
            Direction::Backward => self.current_position.saturating_sub(1),
        };
        self.current_position
    }

    pub fn stall_state(&self) -> StallState {
        self.stall.state()
    }

    pub fn percent_open(&self) -> f32 {
        self.polarity
            .percent_open(self.current_position, self.max_position)
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            current_position: self.current_position,
            target_position: self.target_position,
            command_received: self.command_received,
            stall_latched: self.stall.is_latched(),
            homed: self.homed,
            percent_open: self.percent_open(),
        }
    }
}
