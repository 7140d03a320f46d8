use serde::{Deserialize, Serialize};

/// Raw reading the one-wire probe driver reports when no device answers.
pub const PROBE_DISCONNECTED_C: f32 = -127.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureSample {
    Celsius(f32),
    Disconnected,
}

impl TemperatureSample {
    /// Maps a raw driver reading, treating the driver sentinel and non-finite values as a
    /// missing probe.
    pub fn from_raw_celsius(raw: f32) -> Self {
        if !raw.is_finite() || raw <= PROBE_DISCONNECTED_C {
            Self::Disconnected
        } else {
            Self::Celsius(raw)
        }
    }

    pub fn celsius(self) -> Option<f32> {
        match self {
            Self::Celsius(value) => Some(value),
            Self::Disconnected => None,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Celsius(_))
    }
}

/// Valve opening in percent, clamped to `0..=100` on every construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct ValvePosition(u8);

impl ValvePosition {
    pub const CLOSED: Self = Self(0);
    pub const OPEN: Self = Self(100);

    pub fn new(percent: i32) -> Self {
        Self(percent.clamp(0, 100) as u8)
    }

    pub fn from_percent(percent: f32) -> Self {
        if percent.is_finite() {
            Self::new(percent.round() as i32)
        } else {
            Self::CLOSED
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_percent(self) -> f32 {
        f32::from(self.0)
    }

    pub fn is_open(self) -> bool {
        self == Self::OPEN
    }

    pub fn is_closed(self) -> bool {
        self == Self::CLOSED
    }

    pub fn opened_by(self, step: u8) -> Self {
        Self::new(i32::from(self.0) + i32::from(step))
    }

    pub fn closed_by(self, step: u8) -> Self {
        Self::new(i32::from(self.0) - i32::from(step))
    }
}

/// Spindle travel direction. `Forward` moves toward the fully pressed end, which is the
/// highest step position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// How a percent-open value maps onto the stepper position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValvePolarity {
    /// Position grows with opening: `0` steps is closed.
    Direct,
    /// Position grows with closing: the fully pressed home position is closed.
    Inverted,
}

impl ValvePolarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Inverted => "inverted",
        }
    }

    pub fn stepper_target(self, percent_open: f32, max_position: u16) -> u16 {
        let fraction = percent_open.clamp(0.0, 100.0) / 100.0;
        let steps = (fraction * f32::from(max_position)).round() as u16;
        let steps = steps.min(max_position);
        match self {
            Self::Direct => steps,
            Self::Inverted => max_position - steps,
        }
    }

    pub fn percent_open(self, position: u16, max_position: u16) -> f32 {
        if max_position == 0 {
            return 0.0;
        }
        let percent = f32::from(position.min(max_position)) * 100.0 / f32::from(max_position);
        match self {
            Self::Direct => percent,
            Self::Inverted => 100.0 - percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Up,
    Down,
}

impl Button {
    pub fn other(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiMode {
    Monitor,
    SetTarget,
}

impl UiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "MONITOR",
            Self::SetTarget => "SET_TARGET",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Monitor => Self::SetTarget,
            Self::SetTarget => Self::Monitor,
        }
    }
}

/// Read-only view handed to the display each cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<i32>,
    #[serde(rename = "targetTemp")]
    pub target_temp: Option<i32>,
    #[serde(rename = "valvePosition")]
    pub valve_position: ValvePosition,
    /// `None` on a node that cannot observe the actuator's latch.
    #[serde(rename = "stallLatched", skip_serializing_if = "Option::is_none")]
    pub stall_latched: Option<bool>,
    #[serde(rename = "sensorConnected")]
    pub sensor_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<UiMode>,
}

impl StatusSnapshot {
    pub fn status_line(&self) -> String {
        let current = match self.current_temp {
            Some(temp) if self.sensor_connected => format!("{temp}C"),
            _ => "Err".to_string(),
        };
        let target = self
            .target_temp
            .map(|temp| format!("{temp}C"))
            .unwrap_or_else(|| "--".to_string());
        let mut line = format!(
            "temp {current} target {target} valve {}%",
            self.valve_position.get()
        );
        if let Some(mode) = self.mode {
            line.push_str(" [");
            line.push_str(mode.as_str());
            line.push(']');
        }
        if self.stall_latched == Some(true) {
            line.push_str(" STALL");
        }
        line
    }
}
