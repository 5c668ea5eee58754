//! Broker connection: the publishing half and the event-loop pump.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use relaysync_app::ports::{BusEvent, BusMessage, BusPublisher};
use relaysync_domain::error::RelaySyncError;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// Outgoing requests buffered between the client and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// Pause between reconnection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Shortest keep-alive accepted by the broker client.
const MIN_KEEP_ALIVE_SECS: u16 = 5;

/// Create the client pair for `config`.
///
/// Nothing touches the network until [`MqttPump::run`] is polled.
///
/// # Errors
///
/// Returns [`MqttError::InvalidConfig`] for an empty client id or a
/// keep-alive shorter than five seconds.
pub fn connect(
    config: &MqttConfig,
    subscriptions: Vec<String>,
    events: mpsc::Sender<BusEvent>,
) -> Result<(MqttBus, MqttPump), MqttError> {
    if config.client_id.trim().is_empty() {
        return Err(MqttError::InvalidConfig("client id must not be blank"));
    }
    if config.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
        return Err(MqttError::InvalidConfig(
            "keep alive must be at least 5 seconds",
        ));
    }

    let mut options = MqttOptions::new(
        &config.client_id,
        &config.broker_host,
        config.broker_port,
    );
    options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    let connected = Arc::new(AtomicBool::new(false));

    let bus = MqttBus {
        client: client.clone(),
        connected: Arc::clone(&connected),
    };
    let pump = MqttPump {
        eventloop,
        client,
        connected,
        subscriptions,
        events,
    };
    Ok((bus, pump))
}

/// Publishing half of the broker connection.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl BusPublisher for MqttBus {
    /// Queue a publication without waiting on the event loop.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
        retained: bool,
    ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
        let result = self
            .client
            .try_publish(
                topic.to_owned(),
                QoS::AtLeastOnce,
                retained,
                payload.as_bytes().to_vec(),
            )
            .map_err(|err| RelaySyncError::from(MqttError::Client(err)));
        async move { result }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Drives the rumqttc event loop and reports to the control loop.
pub struct MqttPump {
    eventloop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    subscriptions: Vec<String>,
    events: mpsc::Sender<BusEvent>,
}

impl MqttPump {
    /// Poll the connection until the control loop stops listening.
    pub async fn run(mut self) {
        loop {
            let (event, backoff) = match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => (Some(self.on_connected()), false),
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match inbound_message(publish.topic.as_ref(), &publish.payload) {
                        Ok(message) => (Some(BusEvent::Message(message)), false),
                        Err(err) => {
                            tracing::warn!(%err, "dropping inbound MQTT message");
                            (None, false)
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => (self.on_disconnected(), false),
                Ok(_) => (None, false),
                Err(err) => {
                    tracing::warn!(%err, "MQTT connection error, retrying");
                    (self.on_disconnected(), true)
                }
            };
            if let Some(event) = event {
                if self.events.send(event).await.is_err() {
                    tracing::info!("control loop gone, stopping MQTT pump");
                    return;
                }
            }
            if backoff {
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    fn on_connected(&self) -> BusEvent {
        self.connected.store(true, Ordering::Release);
        tracing::info!(topics = self.subscriptions.len(), "MQTT connected, subscribing");
        for topic in &self.subscriptions {
            if let Err(err) = self.client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                tracing::warn!(%err, topic = %topic, "failed to subscribe");
            }
        }
        BusEvent::Connected
    }

    fn on_disconnected(&self) -> Option<BusEvent> {
        self.connected
            .swap(false, Ordering::AcqRel)
            .then_some(BusEvent::Disconnected)
    }
}

/// Decode an inbound publish into a [`BusMessage`].
fn inbound_message(topic: &[u8], payload: &[u8]) -> Result<BusMessage, MqttError> {
    let topic = std::str::from_utf8(topic).map_err(|source| MqttError::InvalidUtf8 {
        part: "topic",
        source,
    })?;
    let payload = std::str::from_utf8(payload).map_err(|source| MqttError::InvalidUtf8 {
        part: "payload",
        source,
    })?;
    Ok(BusMessage::new(topic, payload.trim()))
}
