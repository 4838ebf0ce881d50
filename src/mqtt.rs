use crate::{
    channel::{PublishChannel, PublishError, ERR_NO_CONNECTION, ERR_QUEUE_FULL},
    config::{MqttConfig, MqttQos},
    error::*,
};
use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions,
    Outgoing, Packet, QoS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

/// Pause between reconnect attempts after the event loop reports an error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// How long shutdown lets the event loop flush the DISCONNECT packet
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);
/// Outgoing request queue depth
const REQUEST_CAPACITY: usize = 100;

impl From<MqttQos> for QoS {
    fn from(qos: MqttQos) -> Self {
        match qos {
            MqttQos::AtMostOnce => QoS::AtMostOnce,
            MqttQos::AtLeastOnce => QoS::AtLeastOnce,
            MqttQos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// [`PublishChannel`] backed by a `rumqttc` client.
///
/// The event loop runs on its own tokio task once [`connect`](PublishChannel::connect)
/// is called. It logs connection changes and mirrors them into a watch
/// channel that [`is_connected`](PublishChannel::is_connected) reads.
pub struct MqttChannel {
    client: AsyncClient,
    eventloop: Option<EventLoop>,
    task: Option<JoinHandle<()>>,
    status: Arc<watch::Sender<bool>>,
    qos: QoS,
    broker: String,
}

impl MqttChannel {
    pub fn new(config: &MqttConfig) -> Result<Self> {
        let mut mqttoptions = MqttOptions::new(&config.client_id, &config.host, config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(config.keepalive_secs));

        if let Some((username, password)) = config.credentials() {
            debug!("Using credentials for MQTT user '{}'", username);
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, REQUEST_CAPACITY);
        let (status, _) = watch::channel(false);

        Ok(Self {
            client,
            eventloop: Some(eventloop),
            task: None,
            status: Arc::new(status),
            qos: config.qos.into(),
            broker: format!("{}:{}", config.host, config.port),
        })
    }

    /// Broker address as `host:port`
    pub fn broker(&self) -> &str {
        &self.broker
    }
}

impl PublishChannel for MqttChannel {
    async fn connect(&mut self) -> Result<()> {
        let eventloop = self
            .eventloop
            .take()
            .ok_or_else(|| SimError::Mqtt("MQTT event loop already started".to_string()))?;

        info!("Connecting to MQTT broker {}", self.broker);
        let status = Arc::clone(&self.status);
        let broker = self.broker.clone();
        self.task = Some(tokio::spawn(drive_event_loop(eventloop, status, broker)));

        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    async fn wait_connected(&mut self, limit: Duration) -> bool {
        let mut rx = self.status.subscribe();
        let acknowledged = matches!(timeout(limit, rx.wait_for(|up| *up)).await, Ok(Ok(_)));
        acknowledged
    }

    async fn publish(&mut self, topic: &str, payload: String) -> std::result::Result<(), PublishError> {
        if self.task.is_none() {
            return Err(PublishError::new(ERR_NO_CONNECTION, "event loop is not running"));
        }

        self.client
            .try_publish(topic, self.qos, false, payload)
            .map_err(|e| match e {
                ClientError::TryRequest(_) => PublishError::new(ERR_QUEUE_FULL, e.to_string()),
                ClientError::Request(_) => PublishError::new(ERR_NO_CONNECTION, e.to_string()),
            })
    }

    async fn shutdown(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };

        // The event loop itself writes the DISCONNECT packet, so queue it
        // first and only then stop the loop.
        if let Err(e) = self.client.try_disconnect() {
            debug!("Could not queue MQTT disconnect: {}", e);
        }

        if timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
            debug!("MQTT event loop did not stop in time, aborting it");
            task.abort();
        }

        self.status.send_replace(false);
        info!("Disconnected from MQTT broker {}", self.broker);
    }
}

async fn drive_event_loop(mut eventloop: EventLoop, status: Arc<watch::Sender<bool>>, broker: String) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("Connected to MQTT broker {}", broker);
                    status.send_replace(true);
                } else {
                    warn!("MQTT broker {} refused connection: {:?}", broker, ack.code);
                    status.send_replace(false);
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("MQTT broker {} closed the connection", broker);
                status.send_replace(false);
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                trace!("Publish {} acknowledged", ack.pkid);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                status.send_replace(false);
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                debug!("MQTT client dropped, stopping event loop");
                status.send_replace(false);
                break;
            }
            Err(e) => {
                if status.send_replace(false) {
                    warn!("Lost connection to MQTT broker {}: {}. Reconnecting...", broker, e);
                } else {
                    warn!("MQTT broker {} unavailable: {}", broker, e);
                }
                sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
