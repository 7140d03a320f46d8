use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{debug, error, info, warn};

use radiator_common::{
    hal::{
        ButtonInputs, LogDisplay, RadioReceiver, RadioSender, StatusDisplay, TemperatureProbe,
    },
    mqtt_radio, Button, ButtonEvent, ButtonPanel, Debouncer, HoldDetector, ReadingOutcome,
    RuntimeConfig, Shared, StatusSnapshot, TelemetryError, TelemetryMessage,
    TemperatureSample, TemperatureStore, UiMode, ValveRegulator,
};

use crate::sim::{ButtonLevels, SimulatedProbe};

/// Handles shared between the remote node's tasks. Each structure has its own guard.
#[derive(Clone)]
struct RemoteState {
    store: Shared<TemperatureStore>,
    regulator: Shared<ValveRegulator>,
    mode: Shared<UiMode>,
    reported_valve: Shared<Option<f32>>,
    buttons: Arc<ButtonLevels>,
    config: Arc<RuntimeConfig>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct RemoteStatus {
    #[serde(flatten)]
    snapshot: StatusSnapshot,
    #[serde(rename = "actuatorReportedValve")]
    actuator_reported_valve: Option<f32>,
    trend: f32,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config()?;

    let (sender, receiver) = match mqtt_radio::connect(
        &config.radio,
        "radiator-remote",
        &config.radio.uplink_topic,
        &config.radio.downlink_topic,
    )
    .await
    {
        Ok(link) => link,
        Err(err) => {
            error!("radio init failed, halting: {err}");
            return Err(err).context("remote node cannot run without its radio link");
        }
    };

    let state = RemoteState {
        store: Shared::new(TemperatureStore::new(config.target)),
        regulator: Shared::new(ValveRegulator::new(config.regulator.clone())),
        mode: Shared::new(UiMode::Monitor),
        reported_valve: Shared::new(None),
        buttons: Arc::new(ButtonLevels::default()),
        config: Arc::new(config),
    };

    let (confirm_tx, confirm_rx) = mpsc::channel(4);

    spawn_input_task(state.clone());
    spawn_hold_task(state.clone(), confirm_tx);
    spawn_sensor_task(state.clone(), SimulatedProbe::new(19.0, sim_disconnect_every()));
    spawn_control_loop(state.clone());
    spawn_telemetry_task(state.clone(), sender, confirm_rx);
    spawn_receive_task(state.clone(), receiver);
    spawn_display_task(state.clone(), LogDisplay::default());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/buttons/{button}", post(handle_set_button))
        .with_state(state);

    let port = std::env::var("REMOTE_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind remote server at {addr}"))?;

    info!("remote node listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_config() -> anyhow::Result<RuntimeConfig> {
    let path = std::env::var("RADIATOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./radiator.json"));
    let mut config = RuntimeConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.apply_env_overrides();
    Ok(config)
}

fn sim_disconnect_every() -> u64 {
    std::env::var("RADIATOR_SIM_DISCONNECT_EVERY")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(12)
}

fn spawn_input_task(state: RemoteState) {
    tokio::spawn(async move {
        let mut panel = ButtonPanel::new(&state.config.input);
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.input.poll_interval_ms));

        loop {
            interval.tick().await;
            let up = state.buttons.is_asserted(Button::Up);
            let down = state.buttons.is_asserted(Button::Down);

            if let Some(event) = panel.poll(up, down, monotonic_ms()) {
                apply_button_event(&state, event);
            }
        }
    });
}

fn apply_button_event(state: &RemoteState, event: ButtonEvent) {
    let button = match event {
        ButtonEvent::Combo => {
            let mode = state.mode.with(|mode| {
                *mode = mode.toggled();
                *mode
            });
            info!("ui mode: {}", mode.as_str());
            return;
        }
        ButtonEvent::Single(button) => button,
    };

    if state.mode.snapshot() != UiMode::SetTarget {
        debug!("ignoring {button:?} press outside target setting");
        return;
    }

    let target = state.store.with(|store| match button {
        Button::Up => store.increment_target(),
        Button::Down => store.decrement_target(),
    });
    match target {
        Some(target) => info!("target temperature: {target}C"),
        None => debug!("discarding target adjustment before first valid reading"),
    }
}

fn spawn_hold_task(state: RemoteState, confirm_tx: mpsc::Sender<()>) {
    tokio::spawn(async move {
        let input = &state.config.input;
        let mut up = Debouncer::new(input.debounce_ms);
        let mut down = Debouncer::new(input.debounce_ms);
        let mut detector = HoldDetector::new(input.hold_duration_ms);
        let mut interval = tokio::time::interval(Duration::from_millis(input.poll_interval_ms));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();
            up.sample(state.buttons.is_asserted(Button::Up), now_ms);
            down.sample(state.buttons.is_asserted(Button::Down), now_ms);

            if detector.sample(up.is_pressed() && down.is_pressed(), now_ms) {
                info!("long hold: sending target");
                if confirm_tx.try_send(()).is_err() {
                    warn!("telemetry task busy; dropping hold send");
                }
            }
        }
    });
}

fn spawn_sensor_task<P>(state: RemoteState, mut probe: P)
where
    P: TemperatureProbe + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.remote.sensor_period_ms));

        loop {
            interval.tick().await;
            let sample = probe.read();
            match state.store.with(|store| store.update(sample)) {
                ReadingOutcome::Skipped => warn!("temperature probe disconnected"),
                ReadingOutcome::Seeded | ReadingOutcome::Updated => {
                    debug!("temperature reading: {sample:?}");
                }
            }
        }
    });
}

fn spawn_control_loop(state: RemoteState) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.remote.control_period_ms));
        let mut last_seq = None;

        loop {
            interval.tick().await;
            if let Some(seq) = run_control_cycle(&state, last_seq) {
                last_seq = Some(seq);
            }
        }
    });
}

/// One control evaluation. Skips when the probe is disconnected, the target is unset, or no
/// reading arrived since the previous cycle. Returns the sequence number it consumed.
fn run_control_cycle(state: &RemoteState, last_seq: Option<u64>) -> Option<u64> {
    let (reading, target) = state
        .store
        .read(|store| (store.last_reading(), store.target()));

    let Some((current_c, seq)) = reading else {
        debug!("control cycle skipped: no valid reading");
        return None;
    };
    let target_c = target?;
    if last_seq == Some(seq) {
        debug!("control cycle skipped: reading unchanged since last cycle");
        return None;
    }

    let (decision, position) = state.regulator.with(|regulator| {
        regulator.record_temperature(TemperatureSample::Celsius(current_c));
        let decision = regulator.update(current_c, target_c as f32);
        (decision, regulator.position())
    });

    if decision.moved_valve() {
        info!(
            "valve {decision:?} to {}% (current {current_c:.1}C, target {target_c}C)",
            position.get()
        );
    } else {
        debug!("regulator: {decision:?} at {}%", position.get());
    }
    Some(seq)
}

fn spawn_telemetry_task<S>(state: RemoteState, mut sender: S, mut confirm_rx: mpsc::Receiver<()>)
where
    S: RadioSender + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.remote.telemetry_period_ms));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for message in periodic_telemetry(&state) {
                        sender.send(message.encode().as_bytes());
                    }
                }
                Some(()) = confirm_rx.recv() => {
                    match state.store.read(TemperatureStore::target) {
                        Some(target) => {
                            sender.send(TelemetryMessage::Target(target).encode().as_bytes());
                        }
                        None => debug!("hold send skipped: target not initialized"),
                    }
                }
            }
        }
    });
}

fn periodic_telemetry(state: &RemoteState) -> Vec<TelemetryMessage> {
    let position = state.regulator.read(ValveRegulator::position);
    let (current, target) = state
        .store
        .read(|store| (store.current(), store.target()));

    let mut messages = vec![TelemetryMessage::valve(position.as_percent())];
    messages.extend(current.map(TelemetryMessage::Current));
    messages.extend(target.map(TelemetryMessage::Target));
    messages
}

fn spawn_receive_task<R>(state: RemoteState, mut receiver: R)
where
    R: RadioReceiver + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.remote.radio_poll_ms));

        loop {
            interval.tick().await;
            while let Some(packet) = receiver.try_receive() {
                if let Err(err) = handle_packet(&state, &packet) {
                    warn!("dropping radio packet: {err}");
                }
            }
        }
    });
}

fn handle_packet(state: &RemoteState, packet: &[u8]) -> Result<(), TelemetryError> {
    match TelemetryMessage::decode(packet)? {
        TelemetryMessage::Target(target) => {
            match state.store.with(|store| store.set_target(target)) {
                Some(applied) => info!("target set over radio: {applied}C"),
                None => debug!("discarding radio target before first valid reading"),
            }
        }
        TelemetryMessage::Valve(percent) => {
            state.reported_valve.with(|reported| *reported = Some(percent));
        }
        TelemetryMessage::Current(_) => {}
    }
    Ok(())
}

fn spawn_display_task<D>(state: RemoteState, mut display: D)
where
    D: StatusDisplay + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.remote.display_period_ms));

        loop {
            interval.tick().await;
            display.render(&build_snapshot(&state));
        }
    });
}

fn build_snapshot(state: &RemoteState) -> StatusSnapshot {
    let (current_temp, target_temp, sensor_connected) = state.store.read(|store| {
        (
            store.current(),
            store.target(),
            store.is_sensor_connected(),
        )
    });

    StatusSnapshot {
        current_temp,
        target_temp,
        valve_position: state.regulator.read(ValveRegulator::position),
        // No stall message crosses the link; only the actuator node knows its latch.
        stall_latched: None,
        sensor_connected,
        mode: Some(state.mode.snapshot()),
    }
}

async fn handle_get_status(State(state): State<RemoteState>) -> impl IntoResponse {
    Json(RemoteStatus {
        snapshot: build_snapshot(&state),
        actuator_reported_valve: state.reported_valve.snapshot(),
        trend: state.regulator.read(ValveRegulator::trend),
    })
}

async fn handle_set_button(
    State(state): State<RemoteState>,
    Path(button): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(button) = Button::parse(&button) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown button. Use 'up' or 'down'");
    };
    let asserted = match params.get("state").map(|value| value.to_ascii_lowercase()) {
        Some(value) if value == "pressed" => true,
        Some(value) if value == "released" => false,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid 'state' parameter. Use 'pressed' or 'released'",
            )
        }
    };

    state.buttons.set(button, asserted);
    handle_get_status(State(state)).await.into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state() -> RemoteState {
        let config = RuntimeConfig::default();
        RemoteState {
            store: Shared::new(TemperatureStore::new(config.target)),
            regulator: Shared::new(ValveRegulator::new(config.regulator.clone())),
            mode: Shared::new(UiMode::Monitor),
            reported_valve: Shared::new(None),
            buttons: Arc::new(ButtonLevels::default()),
            config: Arc::new(config),
        }
    }

    #[test]
    fn control_cycle_waits_for_first_reading() {
        let state = state();
        assert_eq!(run_control_cycle(&state, None), None);
        assert_eq!(state.regulator.read(ValveRegulator::position).get(), 0);
    }

    #[test]
    fn control_cycle_consumes_each_reading_once() {
        let state = state();
        state.store.with(|store| {
            store.update(TemperatureSample::Celsius(18.0));
            store.set_target(22);
        });

        assert_eq!(run_control_cycle(&state, None), Some(1));
        assert_eq!(state.regulator.read(ValveRegulator::position).get(), 5);

        assert_eq!(run_control_cycle(&state, Some(1)), None);
        assert_eq!(state.regulator.read(ValveRegulator::position).get(), 5);
    }

    #[test]
    fn disconnected_probe_skips_the_cycle() {
        let state = state();
        state.store.with(|store| {
            store.update(TemperatureSample::Celsius(18.0));
            store.set_target(22);
            store.update(TemperatureSample::Disconnected);
        });

        assert_eq!(run_control_cycle(&state, None), None);
        assert_eq!(state.regulator.read(ValveRegulator::position).get(), 0);
    }

    #[test]
    fn radio_target_is_ignored_until_initialized() {
        let state = state();
        handle_packet(&state, b"target:24").unwrap();
        assert_eq!(state.store.read(TemperatureStore::target), None);

        state
            .store
            .with(|store| store.update(TemperatureSample::Celsius(20.2)));
        handle_packet(&state, b"TARGET:24").unwrap();
        assert_eq!(state.store.read(TemperatureStore::target), Some(24));
    }

    #[test]
    fn malformed_packets_change_nothing() {
        let state = state();
        state
            .store
            .with(|store| store.update(TemperatureSample::Celsius(20.0)));

        assert!(handle_packet(&state, b"target:warm").is_err());
        assert!(handle_packet(&state, b"VALVE:150.0").is_err());
        assert_eq!(state.store.read(TemperatureStore::target), Some(20));
        assert_eq!(state.reported_valve.snapshot(), None);
    }

    #[test]
    fn single_presses_only_adjust_in_set_target_mode() {
        let state = state();
        state
            .store
            .with(|store| store.update(TemperatureSample::Celsius(20.0)));

        apply_button_event(&state, ButtonEvent::Single(Button::Up));
        assert_eq!(state.store.read(TemperatureStore::target), Some(20));

        apply_button_event(&state, ButtonEvent::Combo);
        apply_button_event(&state, ButtonEvent::Single(Button::Up));
        apply_button_event(&state, ButtonEvent::Single(Button::Up));
        apply_button_event(&state, ButtonEvent::Single(Button::Down));
        assert_eq!(state.store.read(TemperatureStore::target), Some(21));
        assert_eq!(state.mode.snapshot(), UiMode::SetTarget);
    }

    #[test]
    fn telemetry_omits_unset_temperatures() {
        let state = state();
        assert_eq!(
            periodic_telemetry(&state),
            vec![TelemetryMessage::Valve(0.0)]
        );

        state
            .store
            .with(|store| store.update(TemperatureSample::Celsius(19.4)));
        assert_eq!(
            periodic_telemetry(&state),
            vec![
                TelemetryMessage::Valve(0.0),
                TelemetryMessage::Current(19),
                TelemetryMessage::Target(19),
            ]
        );
    }
}
