/// Remote node to actuator node: valve commands and temperature telemetry.
pub const TOPIC_RADIO_UPLINK: &str = "radiator/radio/uplink";
/// Actuator node to remote node: valve position reports, external target writes.
pub const TOPIC_RADIO_DOWNLINK: &str = "radiator/radio/downlink";
