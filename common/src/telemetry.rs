//! Text grammar carried over the radio link.
//!
//! One message per packet: `VALVE:<percent, 2 decimals>`, `current:<int>` or `target:<int>`.
//! Labels match case-insensitively and surrounding whitespace is ignored, but the numeric
//! payload must match the fixed grammar exactly. There is no checksum, sequence number or
//! acknowledgment; a rejected packet is simply dropped.

use std::{fmt, ops::RangeInclusive};

use crate::error::TelemetryError;

pub const VALVE_LABEL: &str = "VALVE";
pub const CURRENT_LABEL: &str = "current";
pub const TARGET_LABEL: &str = "target";

/// Upper bound on an accepted packet; the longest valid message is well under this.
pub const MAX_PACKET_BYTES: usize = 64;

pub const VALVE_RANGE: RangeInclusive<f32> = 0.0..=100.0;
/// Span of the one-wire probe, used to reject corrupted temperature values.
pub const TEMPERATURE_RANGE_C: RangeInclusive<i32> = -55..=125;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryMessage {
    /// Valve opening in percent.
    Valve(f32),
    Current(i32),
    Target(i32),
}

impl TelemetryMessage {
    /// Valve message with the percentage clamped into range.
    pub fn valve(percent_open: f32) -> Self {
        let percent = if percent_open.is_finite() {
            percent_open.clamp(*VALVE_RANGE.start(), *VALVE_RANGE.end())
        } else {
            0.0
        };
        Self::Valve(percent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Valve(_) => VALVE_LABEL,
            Self::Current(_) => CURRENT_LABEL,
            Self::Target(_) => TARGET_LABEL,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(packet: &[u8]) -> Result<Self, TelemetryError> {
        if packet.len() > MAX_PACKET_BYTES {
            return Err(TelemetryError::TooLong {
                len: packet.len(),
                max: MAX_PACKET_BYTES,
            });
        }
        let text = std::str::from_utf8(packet).map_err(|_| TelemetryError::NotUtf8)?;
        Self::parse(text)
    }

    pub fn parse(text: &str) -> Result<Self, TelemetryError> {
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if text.is_empty() {
            return Err(TelemetryError::Empty);
        }

        let (label, payload) = text
            .split_once(':')
            .ok_or(TelemetryError::MissingSeparator)?;
        let label = label.trim();
        let payload = payload.trim();

        if label.eq_ignore_ascii_case(VALVE_LABEL) {
            parse_valve(payload).map(Self::Valve)
        } else if label.eq_ignore_ascii_case(CURRENT_LABEL) {
            parse_temperature(CURRENT_LABEL, payload).map(Self::Current)
        } else if label.eq_ignore_ascii_case(TARGET_LABEL) {
            parse_temperature(TARGET_LABEL, payload).map(Self::Target)
        } else {
            Err(TelemetryError::UnknownLabel(label.to_string()))
        }
    }
}

impl fmt::Display for TelemetryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valve(percent) => write!(f, "{VALVE_LABEL}:{percent:.2}"),
            Self::Current(temp) => write!(f, "{CURRENT_LABEL}:{temp}"),
            Self::Target(temp) => write!(f, "{TARGET_LABEL}:{temp}"),
        }
    }
}

fn parse_valve(payload: &str) -> Result<f32, TelemetryError> {
    if !is_decimal(payload) {
        return Err(TelemetryError::InvalidNumber(payload.to_string()));
    }
    let value = payload
        .parse::<f32>()
        .map_err(|_| TelemetryError::InvalidNumber(payload.to_string()))?;

    if !VALVE_RANGE.contains(&value) {
        return Err(TelemetryError::OutOfRange {
            label: VALVE_LABEL,
            value,
            min: *VALVE_RANGE.start(),
            max: *VALVE_RANGE.end(),
        });
    }
    Ok(value)
}

fn parse_temperature(label: &'static str, payload: &str) -> Result<i32, TelemetryError> {
    if !is_integer(payload) {
        return Err(TelemetryError::InvalidNumber(payload.to_string()));
    }
    let value = payload
        .parse::<i32>()
        .map_err(|_| TelemetryError::InvalidNumber(payload.to_string()))?;

    if !TEMPERATURE_RANGE_C.contains(&value) {
        return Err(TelemetryError::OutOfRange {
            label,
            value: value as f32,
            min: *TEMPERATURE_RANGE_C.start() as f32,
            max: *TEMPERATURE_RANGE_C.end() as f32,
        });
    }
    Ok(value)
}

/// `-?digits`
fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `-?digits` optionally followed by `.digits`
fn is_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    match unsigned.split_once('.') {
        Some((whole, fraction)) => {
            !whole.is_empty()
                && !fraction.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && fraction.bytes().all(|b| b.is_ascii_digit())
        }
        None => !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()),
    }
}
