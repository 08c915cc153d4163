//! rumqttc-backed broker connections.

use super::broker::{BrokerConnection, BrokerEvent, InboundMessage, Publisher};
use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

const REQUEST_CAPACITY: usize = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

fn mqtt_options(config: &MqttConfig, keep_alive: Duration) -> MqttOptions {
    // Like an anonymous mosquitto client: one fresh id per run
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("knx-mqtt-bridge-{}", Uuid::new_v4().simple()));

    let mut options = MqttOptions::new(client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(keep_alive);
    options
}

fn classify(event: Event) -> BrokerEvent {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => BrokerEvent::Connected,
        Event::Incoming(Packet::Publish(publish)) => BrokerEvent::Message(InboundMessage {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }),
        _ => BrokerEvent::Idle,
    }
}

/// Send DISCONNECT and drive the event loop until it has gone out.
async fn disconnect(client: &AsyncClient, event_loop: &mut EventLoop) {
    if let Err(e) = client.disconnect().await {
        warn!("[MQTT] Failed to request disconnect: {}", e);
        return;
    }

    let drained = tokio::time::timeout(CLOSE_TIMEOUT, async {
        loop {
            match event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!("[MQTT] Timed out waiting for disconnect");
    }
}

/// Publishing connection that connects on first use.
///
/// Once connected, the event loop runs on a background task that keeps
/// reconnecting on its own, so publishes only fail when the client is gone.
pub struct MqttPublisher {
    config: MqttConfig,
    keep_alive: Duration,
    reconnect_delay: Duration,
    connection: Option<PublisherConnection>,
}

struct PublisherConnection {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl MqttPublisher {
    pub fn new(config: MqttConfig, keep_alive: Duration, reconnect_delay: Duration) -> Self {
        Self {
            config,
            keep_alive,
            reconnect_delay,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn connect(&self) -> Result<PublisherConnection> {
        info!(
            "[MQTT] Connecting to {}:{}",
            self.config.broker_host, self.config.broker_port
        );

        let options = mqtt_options(&self.config, self.keep_alive);
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let connack = tokio::time::timeout(CONNECT_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(BridgeError::ConnectionFailed(e.to_string())),
                }
            }
        })
        .await;

        match connack {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(BridgeError::ConnectionFailed(format!(
                    "no CONNACK from {}:{} after {:?}",
                    self.config.broker_host, self.config.broker_port, CONNECT_TIMEOUT
                )));
            }
        }

        info!("[MQTT] Connection established");
        let driver = tokio::spawn(drive_event_loop(event_loop, self.reconnect_delay));
        Ok(PublisherConnection { client, driver })
    }
}

async fn drive_event_loop(mut event_loop: EventLoop, reconnect_delay: Duration) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("[MQTT] Disconnect sent, stopping event loop");
                break;
            }
            Ok(event) => debug!("[MQTT] {:?}", event),
            Err(e) => {
                error!("[MQTT] Connection error: {:?}", e);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<()> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => self.connect().await?,
        };
        let client = &self.connection.insert(connection).client;

        info!("[MQTT] Publishing to topic {}: {}", topic, payload);
        client
            .publish(topic, qos, retain, payload.as_bytes())
            .await
            .map_err(|e| BridgeError::PublishFailed(format!("{}: {}", topic, e)))
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        if let Err(e) = connection.client.disconnect().await {
            warn!("[MQTT] Failed to request disconnect: {}", e);
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut connection.driver)
            .await
            .is_err()
        {
            connection.driver.abort();
        }
        Ok(())
    }
}

/// Subscribing connection whose event loop is polled by the session.
pub struct MqttSubscription {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttSubscription {
    /// Create the client. Nothing is sent until the first poll.
    pub fn new(config: &MqttConfig, keep_alive: Duration) -> Self {
        info!(
            "[MQTT] Using broker {}:{}",
            config.broker_host, config.broker_port
        );
        let (client, event_loop) =
            AsyncClient::new(mqtt_options(config, keep_alive), REQUEST_CAPACITY);
        Self { client, event_loop }
    }
}

#[async_trait]
impl BrokerConnection for MqttSubscription {
    async fn poll(&mut self) -> Result<BrokerEvent> {
        self.event_loop
            .poll()
            .await
            .map(classify)
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))
    }

    async fn reconnect(&mut self) -> Result<BrokerEvent> {
        // The event loop reconnects on the poll following an error
        info!("[MQTT] Reconnecting");
        self.poll().await
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<()> {
        info!("[MQTT] Subscribing to {}", filter);
        self.client
            .subscribe(filter, qos)
            .await
            .map_err(|e| BridgeError::ConnectionFailed(format!("subscribe {}: {}", filter, e)))
    }

    async fn close(&mut self) -> Result<()> {
        disconnect(&self.client, &mut self.event_loop).await;
        Ok(())
    }
}
