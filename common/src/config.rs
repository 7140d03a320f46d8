use std::{io::ErrorKind, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    topics::{TOPIC_RADIO_DOWNLINK, TOPIC_RADIO_UPLINK},
    types::ValvePolarity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatorConfig {
    pub dead_band_c: f32,
    pub small_step: u8,
    pub history_len: usize,
    pub min_warming_rate: f32,
    pub max_warming_rate: f32,
    pub min_cooling_rate: f32,
    pub max_cooling_rate: f32,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            dead_band_c: 0.2,
            small_step: 5,
            history_len: 5,
            min_warming_rate: 0.05,
            max_warming_rate: 0.3,
            min_cooling_rate: -0.05,
            max_cooling_rate: -0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StallConfig {
    pub current_threshold_ma: f32,
    /// StallGuard results at or below this value count as over threshold.
    pub stall_guard_threshold: u16,
    pub sample_limit: u8,
    pub sample_interval_ms: u64,
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            current_threshold_ma: 1_000.0,
            stall_guard_threshold: 50,
            sample_limit: 5,
            sample_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub debounce_ms: u64,
    pub combo_window_ms: u64,
    pub hold_duration_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            combo_window_ms: 200,
            hold_duration_ms: 1_000,
            poll_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetLimits {
    pub min_c: i32,
    pub max_c: i32,
}

impl Default for TargetLimits {
    fn default() -> Self {
        Self { min_c: 5, max_c: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Steps between the fully retracted and fully pressed spindle.
    pub max_position: u16,
    pub polarity: ValvePolarity,
    pub pulse_width_us: u64,
    pub step_interval_ms: u64,
    pub idle_poll_ms: u64,
    pub gated_poll_ms: u64,
    pub report_interval_ms: u64,
    pub display_period_ms: u64,
    pub radio_poll_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            max_position: 100,
            polarity: ValvePolarity::Inverted,
            pulse_width_us: 1_000,
            step_interval_ms: 1,
            idle_poll_ms: 10,
            gated_poll_ms: 20,
            report_interval_ms: 10_000,
            display_period_ms: 1_000,
            radio_poll_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteTimings {
    pub sensor_period_ms: u64,
    pub control_period_ms: u64,
    pub telemetry_period_ms: u64,
    pub display_period_ms: u64,
    pub radio_poll_ms: u64,
}

impl Default for RemoteTimings {
    fn default() -> Self {
        Self {
            sensor_period_ms: 5_000,
            control_period_ms: 10_000,
            telemetry_period_ms: 10_000,
            display_period_ms: 1_000,
            radio_poll_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub broker_user: String,
    pub broker_pass: String,
    /// Overrides the node's built-in MQTT client id.
    pub client_id: Option<String>,
    pub uplink_topic: String,
    pub downlink_topic: String,
    pub max_payload_bytes: usize,
    pub rx_queue_len: usize,
    pub init_timeout_ms: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1883,
            broker_user: String::new(),
            broker_pass: String::new(),
            client_id: None,
            uplink_topic: TOPIC_RADIO_UPLINK.to_string(),
            downlink_topic: TOPIC_RADIO_DOWNLINK.to_string(),
            max_payload_bytes: 64,
            rx_queue_len: 16,
            init_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub regulator: RegulatorConfig,
    pub stall: StallConfig,
    pub input: InputConfig,
    pub target: TargetLimits,
    pub actuator: ActuatorConfig,
    pub remote: RemoteTimings,
    pub radio: RadioConfig,
}

impl RuntimeConfig {
    /// Loads the config at `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read(path) {
            Ok(raw) => serde_json::from_slice::<Self>(&raw).map_err(|source| {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        self.regulator.sanitize();
        self.stall.sanitize();
        self.input.sanitize();
        self.target.sanitize();
        self.actuator.sanitize();
        self.remote.sanitize();
        self.radio.sanitize();
    }

    /// Applies the `MQTT_*` broker overrides from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("MQTT_HOST").filter(|host| !host.is_empty()) {
            self.radio.broker_host = host;
        }
        if let Some(port) = lookup("MQTT_PORT").and_then(|port| port.parse::<u16>().ok()) {
            self.radio.broker_port = port;
        }
        if let Some(user) = lookup("MQTT_USER") {
            self.radio.broker_user = user;
            self.radio.broker_pass = lookup("MQTT_PASS").unwrap_or_default();
        }
        self.radio.sanitize();
    }
}

impl RegulatorConfig {
    pub fn sanitize(&mut self) {
        if !self.dead_band_c.is_finite() || self.dead_band_c < 0.0 {
            self.dead_band_c = 0.2;
        }
        self.small_step = self.small_step.clamp(1, 100);
        self.history_len = self.history_len.max(2);
        if self.max_warming_rate < self.min_warming_rate {
            std::mem::swap(&mut self.max_warming_rate, &mut self.min_warming_rate);
        }
        // Cooling rates are negative; the "max" one is the steeper fall.
        if self.max_cooling_rate > self.min_cooling_rate {
            std::mem::swap(&mut self.max_cooling_rate, &mut self.min_cooling_rate);
        }
    }
}

impl StallConfig {
    pub fn sanitize(&mut self) {
        self.sample_limit = self.sample_limit.max(1);
        self.sample_interval_ms = self.sample_interval_ms.max(10);
    }
}

impl InputConfig {
    pub fn sanitize(&mut self) {
        self.poll_interval_ms = self.poll_interval_ms.clamp(1, self.debounce_ms.max(1));
        if self.combo_window_ms < self.debounce_ms {
            self.combo_window_ms = self.debounce_ms;
        }
    }
}

impl TargetLimits {
    pub fn sanitize(&mut self) {
        if self.min_c > self.max_c {
            std::mem::swap(&mut self.min_c, &mut self.max_c);
        }
    }

    pub fn clamp(&self, target_c: i32) -> i32 {
        target_c.clamp(self.min_c, self.max_c)
    }
}

impl ActuatorConfig {
    pub fn sanitize(&mut self) {
        self.max_position = self.max_position.max(1);
        self.step_interval_ms = self.step_interval_ms.max(1);
        self.idle_poll_ms = self.idle_poll_ms.max(1);
        self.gated_poll_ms = self.gated_poll_ms.max(1);
        self.report_interval_ms = self.report_interval_ms.max(100);
        self.display_period_ms = self.display_period_ms.max(100);
        self.radio_poll_ms = self.radio_poll_ms.max(1);
    }
}

impl RemoteTimings {
    pub fn sanitize(&mut self) {
        self.sensor_period_ms = self.sensor_period_ms.max(100);
        self.control_period_ms = self.control_period_ms.max(100);
        self.telemetry_period_ms = self.telemetry_period_ms.max(100);
        self.display_period_ms = self.display_period_ms.max(100);
        self.radio_poll_ms = self.radio_poll_ms.max(1);
    }
}

impl RadioConfig {
    pub fn sanitize(&mut self) {
        if self.broker_port == 0 {
            self.broker_port = 1883;
        }
        self.max_payload_bytes = self.max_payload_bytes.clamp(8, 255);
        self.rx_queue_len = self.rx_queue_len.max(1);
    }
}
