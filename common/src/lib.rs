pub mod config;
pub mod error;
pub mod hal;
pub mod input;
pub mod motion;
#[cfg(feature = "mqtt")]
pub mod mqtt_radio;
pub mod regulator;
pub mod shared;
pub mod stall;
pub mod store;
pub mod telemetry;
pub mod topics;
pub mod trend;
pub mod types;

pub use config::{
    ActuatorConfig, InputConfig, RadioConfig, RegulatorConfig, RemoteTimings, RuntimeConfig,
    StallConfig, TargetLimits,
};
pub use error::{CommandError, ConfigError, RadioError, TelemetryError};
pub use input::{ButtonEvent, ButtonPanel, Debouncer, HoldDetector};
pub use motion::{CommandOutcome, MotionSnapshot, MotionState, StepDecision};
pub use regulator::{RegulatorDecision, ValveRegulator};
pub use shared::Shared;
pub use stall::{StallGuard, StallSample, StallState};
pub use store::{ReadingOutcome, TemperatureStore};
pub use telemetry::TelemetryMessage;
pub use topics::*;
pub use trend::TrendBuffer;
pub use types::{
    Button, Direction, StatusSnapshot, TemperatureSample, UiMode, ValvePolarity, ValvePosition,
};
