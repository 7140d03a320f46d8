//! Host stand-in for the radio link, carried over MQTT at QoS 0.
//!
//! QoS 0 gives the same contract as the real radio: at most once, unacknowledged,
//! unordered across reconnects. Inbound packets land in a bounded queue; when the receiving
//! task falls behind, packets are dropped.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::{
    config::RadioConfig,
    error::RadioError,
    hal::{RadioReceiver, RadioSender},
};

pub struct MqttRadioSender {
    client: AsyncClient,
    topic: String,
}

pub struct MqttRadioReceiver {
    packets: mpsc::Receiver<Vec<u8>>,
}

/// Brings the link up and splits it into its two halves. Fails if the broker does not
/// accept the connection within `init_timeout_ms`.
pub async fn connect(
    config: &RadioConfig,
    default_client_id: &str,
    send_topic: &str,
    receive_topic: &str,
) -> Result<(MqttRadioSender, MqttRadioReceiver), RadioError> {
    let client_id = config.client_id.as_deref().unwrap_or(default_client_id);
    let mut options = MqttOptions::new(client_id, config.broker_host.clone(), config.broker_port);
    options.set_keep_alive(Duration::from_secs(10));
    if !config.broker_user.is_empty() {
        options.set_credentials(config.broker_user.clone(), config.broker_pass.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(options, 32);

    let init_timeout = Duration::from_millis(config.init_timeout_ms);
    match tokio::time::timeout(init_timeout, wait_for_connack(&mut eventloop)).await {
        Ok(Ok(())) => info!("radio link up via {}:{}", config.broker_host, config.broker_port),
        Ok(Err(err)) => return Err(RadioError::InitFailed(err.to_string())),
        Err(_) => return Err(RadioError::Timeout(init_timeout)),
    }

    client
        .subscribe(receive_topic, QoS::AtMostOnce)
        .await
        .map_err(|err| RadioError::Subscribe(err.to_string()))?;

    let (tx, packets) = mpsc::channel(config.rx_queue_len);
    spawn_receive_loop(
        eventloop,
        tx,
        receive_topic.to_string(),
        config.max_payload_bytes,
    );

    Ok((
        MqttRadioSender {
            client,
            topic: send_topic.to_string(),
        },
        MqttRadioReceiver { packets },
    ))
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), rumqttc::ConnectionError> {
    loop {
        if let Event::Incoming(Incoming::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

fn spawn_receive_loop(
    mut eventloop: EventLoop,
    tx: mpsc::Sender<Vec<u8>>,
    topic: String,
    max_payload_bytes: usize,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if message.topic != topic {
                        continue;
                    }
                    if message.payload.len() > max_payload_bytes {
                        warn!(
                            "dropping oversized radio packet ({} bytes)",
                            message.payload.len()
                        );
                        continue;
                    }
                    match tx.try_send(message.payload.to_vec()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!("radio receive queue full; dropping packet");
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("radio link reconnected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("radio link poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

impl RadioSender for MqttRadioSender {
    fn send(&mut self, payload: &[u8]) {
        if let Err(err) =
            self.client
                .try_publish(self.topic.clone(), QoS::AtMostOnce, false, payload.to_vec())
        {
            warn!("radio send failed: {err}");
        }
    }
}

impl RadioReceiver for MqttRadioReceiver {
    fn try_receive(&mut self) -> Option<Vec<u8>> {
        self.packets.try_recv().ok()
    }
}
