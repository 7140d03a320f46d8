use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Why an inbound radio packet was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("empty packet")]
    Empty,
    #[error("packet is not valid utf-8")]
    NotUtf8,
    #[error("packet of {len} bytes exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },
    #[error("missing ':' separator")]
    MissingSeparator,
    #[error("unknown label `{0}`")]
    UnknownLabel(String),
    #[error("invalid numeric payload `{0}`")]
    InvalidNumber(String),
    #[error("{label} value {value} outside {min}..={max}")]
    OutOfRange {
        label: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("valve command {0} outside 0..=100 percent")]
    InvalidPercent(f32),
    #[error("actuator is still homing")]
    NotHomed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("radio transport failed to initialize: {0}")]
    InitFailed(String),
    #[error("radio transport did not come up within {0:?}")]
    Timeout(Duration),
    #[error("radio subscribe failed: {0}")]
    Subscribe(String),
}
