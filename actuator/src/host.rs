use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use radiator_common::{
    hal::{
        LogDisplay, RadioReceiver, RadioSender, StallSensor, StatusDisplay, StepperDriver,
    },
    mqtt_radio, CommandOutcome, Direction, MotionState, RuntimeConfig, Shared, StatusSnapshot, StepDecision,
    TelemetryError, TelemetryMessage, ValvePosition,
};

use crate::sim::{simulated_valve, SpindleReading, SpindleView};

/// Temperatures last heard from the remote node. Display only; they never drive the motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PeerTelemetry {
    current_temp: Option<i32>,
    target_temp: Option<i32>,
}

#[derive(Clone)]
struct ActuatorState {
    motion: Shared<MotionState>,
    peer: Shared<PeerTelemetry>,
    spindle: Option<SpindleView>,
    config: Arc<RuntimeConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MotionView {
    current_position: u16,
    target_position: u16,
    command_received: bool,
    percent_open: f32,
}

#[derive(Debug, Serialize)]
struct ActuatorStatus {
    #[serde(flatten)]
    snapshot: StatusSnapshot,
    motion: MotionView,
    homed: bool,
    polarity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    spindle: Option<SpindleReading>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config()?;

    let (sender, receiver) = match mqtt_radio::connect(
        &config.radio,
        "radiator-actuator",
        &config.radio.downlink_topic,
        &config.radio.uplink_topic,
    )
    .await
    {
        Ok(link) => link,
        Err(err) => {
            error!("radio init failed, halting: {err}");
            return Err(err).context("actuator node cannot run without its radio link");
        }
    };

    let (stepper, sensor, spindle) =
        simulated_valve(0, config.actuator.max_position, sim_obstruction());

    let state = ActuatorState {
        motion: Shared::new(MotionState::new(&config.actuator, config.stall.clone())),
        peer: Shared::new(PeerTelemetry::default()),
        spindle: Some(spindle),
        config: Arc::new(config),
    };

    spawn_motor_task(state.clone(), stepper);
    spawn_stall_monitor(state.clone(), sensor);
    spawn_receive_task(state.clone(), receiver);
    spawn_report_task(state.clone(), sender);
    spawn_display_task(state.clone(), LogDisplay::default());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .with_state(state);

    let port = std::env::var("ACTUATOR_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8081);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind actuator server at {addr}"))?;

    info!("actuator node listening on http://{addr}");
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

fn sim_obstruction() -> Option<u16> {
    std::env::var("RADIATOR_SIM_OBSTRUCTION")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
}

fn spawn_motor_task<S>(state: ActuatorState, mut stepper: S)
where
    S: StepperDriver + Send + 'static,
{
    tokio::spawn(async move {
        let actuator = &state.config.actuator;
        let pulse_width = Duration::from_micros(actuator.pulse_width_us);
        let step_interval = Duration::from_millis(actuator.step_interval_ms);

        stepper.enable(true);
        info!(
            "homing: driving spindle {} steps forward",
            actuator.max_position
        );
        for _ in 0..actuator.max_position {
            stepper.step(Direction::Forward, pulse_width);
            tokio::time::sleep(step_interval).await;
        }
        state.motion.with(MotionState::finish_homing);
        info!("homing complete; valve closed, waiting for first command");

        let idle_poll = Duration::from_millis(actuator.idle_poll_ms);
        let gated_poll = Duration::from_millis(actuator.gated_poll_ms);
        loop {
            let pause = match drive_step(&state.motion, &mut stepper, pulse_width) {
                StepDecision::Step(_) => step_interval,
                StepDecision::Idle => idle_poll,
                StepDecision::Gated => gated_poll,
            };
            tokio::time::sleep(pause).await;
        }
    });
}

/// Takes at most one step toward the target. The gate is re-read every call, so a stall or a
/// new command takes effect before the next pulse.
fn drive_step<S: StepperDriver>(
    motion: &Shared<MotionState>,
    stepper: &mut S,
    pulse_width: Duration,
) -> StepDecision {
    let decision = motion.read(MotionState::next_step);
    if let StepDecision::Step(direction) = decision {
        stepper.step(direction, pulse_width);
        let (position, target) = motion.with(|motion| {
            let position = motion.complete_step(direction);
            (position, motion.snapshot().target_position)
        });
        debug!("step {direction:?}: {position} / {target}");
    }
    decision
}

fn spawn_stall_monitor<C>(state: ActuatorState, mut sensor: C)
where
    C: StallSensor + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.stall.sample_interval_ms));

        loop {
            interval.tick().await;
            let sample = sensor.sample();
            if state.motion.with(|motion| motion.record_stall_sample(sample)) {
                warn!("stall detected ({sample:?}); motion halted until next valve command");
            }
        }
    });
}

fn spawn_receive_task<R>(state: ActuatorState, mut receiver: R)
where
    R: RadioReceiver + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(state.config.actuator.radio_poll_ms));

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

fn handle_packet(state: &ActuatorState, packet: &[u8]) -> Result<(), TelemetryError> {
    match TelemetryMessage::decode(packet)? {
        TelemetryMessage::Valve(percent) => {
            match state.motion.with(|motion| motion.accept_command(percent)) {
                Ok(CommandOutcome::Accepted {
                    target,
                    cleared_stall,
                }) => {
                    if cleared_stall {
                        info!("stall latch cleared by new command");
                    }
                    info!("valve command {percent:.2}% -> spindle target {target}");
                }
                Ok(CommandOutcome::Repeated { target }) => {
                    debug!("stall latched at target {target}; ignoring repeated command");
                }
                Err(err) => warn!("rejecting valve command {percent:.2}%: {err}"),
            }
        }
        TelemetryMessage::Current(temp) => {
            state.peer.with(|peer| peer.current_temp = Some(temp));
        }
        TelemetryMessage::Target(temp) => {
            state.peer.with(|peer| peer.target_temp = Some(temp));
        }
    }
    Ok(())
}

fn spawn_report_task<S>(state: ActuatorState, mut sender: S)
where
    S: RadioSender + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(
            state.config.actuator.report_interval_ms,
        ));

        loop {
            interval.tick().await;
            let Some(percent) = state
                .motion
                .read(|motion| motion.is_homed().then(|| motion.percent_open()))
            else {
                continue;
            };
            sender.send(TelemetryMessage::valve(percent).encode().as_bytes());
        }
    });
}

fn spawn_display_task<D>(state: ActuatorState, mut display: D)
where
    D: StatusDisplay + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(
            state.config.actuator.display_period_ms,
        ));

        loop {
            interval.tick().await;
            display.render(&build_snapshot(&state));
        }
    });
}

fn build_snapshot(state: &ActuatorState) -> StatusSnapshot {
    let motion = state.motion.read(MotionState::snapshot);
    let peer = state.peer.snapshot();

    StatusSnapshot {
        current_temp: peer.current_temp,
        target_temp: peer.target_temp,
        valve_position: ValvePosition::from_percent(motion.percent_open),
        stall_latched: Some(motion.stall_latched),
        sensor_connected: peer.current_temp.is_some(),
        mode: None,
    }
}

async fn handle_get_status(State(state): State<ActuatorState>) -> impl IntoResponse {
    let motion = state.motion.read(MotionState::snapshot);
    Json(ActuatorStatus {
        snapshot: build_snapshot(&state),
        motion: MotionView {
            current_position: motion.current_position,
            target_position: motion.target_position,
            command_received: motion.command_received,
            percent_open: motion.percent_open,
        },
        homed: motion.homed,
        polarity: state.config.actuator.polarity.as_str(),
        spindle: state.spindle.as_ref().map(SpindleView::reading),
    })
}
