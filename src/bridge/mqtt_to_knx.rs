//! MQTT → KNX: inject group writes requested over MQTT onto the bus.
//!
//! A message on `<anything>/<main>/<middle>/<sub>` with a hex payload becomes
//! a compact GroupValueWrite to that group address.

use crate::config::SessionConfig;
use crate::error::{BridgeError, Result, SkipReason};
use crate::knx::{BusClient, GroupAddress, write_apdu};
use crate::mqtt::topic::{extract_trailing_triple, topic_matches, validate_base_topic};
use crate::mqtt::{BrokerConnection, BrokerEvent, InboundMessage};
use log::{error, info, warn};
use rumqttc::QoS;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timing of the subscribe loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Pause between a broker error and the reconnect attempt.
    pub reconnect_backoff: Duration,
}

impl From<&SessionConfig> for SessionTiming {
    fn from(config: &SessionConfig) -> Self {
        Self {
            reconnect_backoff: config.reconnect_backoff(),
        }
    }
}

/// A write requested over MQTT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupWrite {
    pub dest: GroupAddress,
    pub value: u8,
}

impl GroupWrite {
    pub fn apdu(&self) -> [u8; 2] {
        write_apdu(self.value)
    }
}

/// Parse a hex byte such as `2A`, `f` or `0x3F`.
pub fn parse_hex_value(text: &str) -> Option<u8> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// Work out which write an inbound message asks for.
pub fn translate_inbound(
    filter: &str,
    message: &InboundMessage,
) -> std::result::Result<GroupWrite, SkipReason> {
    let topic = message.topic.as_str();
    if !topic_matches(filter, topic) {
        return Err(SkipReason::TopicMismatch {
            filter: filter.to_string(),
            topic: topic.to_string(),
        });
    }

    let triple =
        extract_trailing_triple(topic).ok_or_else(|| SkipReason::NoAddressTriple(topic.to_string()))?;
    let dest = GroupAddress::parse_triple(triple)
        .ok_or_else(|| SkipReason::InvalidAddress(triple.to_string()))?;
    if dest.is_broadcast() {
        return Err(SkipReason::BroadcastAddress);
    }

    let text = std::str::from_utf8(&message.payload).map_err(|_| {
        SkipReason::MalformedPayload(String::from_utf8_lossy(&message.payload).into_owned())
    })?;
    let value = parse_hex_value(text).ok_or_else(|| SkipReason::MalformedPayload(text.to_string()))?;

    Ok(GroupWrite { dest, value })
}

/// Subscribing half of the bridge.
///
/// Broker errors are retried after a back-off; bus errors are fatal.
pub struct SubscribeSession<K, B> {
    bus: K,
    broker: B,
    filter: String,
    timing: SessionTiming,
}

impl<K: BusClient, B: BrokerConnection> SubscribeSession<K, B> {
    pub const QOS: QoS = QoS::AtMostOnce;

    pub fn new(bus: K, broker: B, filter: impl Into<String>, timing: SessionTiming) -> Result<Self> {
        let filter = filter.into();
        validate_base_topic(&filter)?;
        Ok(Self {
            bus,
            broker,
            filter,
            timing,
        })
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!("[Bridge] Entering loop for {}", self.filter);
        let outcome = self.service(&cancel).await;
        self.shutdown().await;
        outcome
    }

    async fn service(&mut self, cancel: &CancellationToken) -> Result<()> {
        while !cancel.is_cancelled() {
            // A poll may be midway through a connect, so only cancellation
            // may interrupt it.
            let step = tokio::select! {
                _ = cancel.cancelled() => break,
                step = self.broker.poll() => step,
            };

            match step {
                Ok(event) => self.dispatch(event).await?,
                Err(e) => {
                    error!("[MQTT] Connection error: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.timing.reconnect_backoff) => {}
                    }

                    let reconnected = tokio::select! {
                        _ = cancel.cancelled() => break,
                        reconnected = self.broker.reconnect() => reconnected,
                    };
                    match reconnected {
                        Ok(event) => self.dispatch(event).await?,
                        Err(e) => warn!("[MQTT] Reconnect failed: {}", e),
                    }
                }
            }
        }

        info!("[Bridge] Shutdown requested");
        Ok(())
    }

    async fn dispatch(&mut self, event: BrokerEvent) -> Result<()> {
        match event {
            BrokerEvent::Connected => {
                info!("[MQTT] Connected");
                self.broker.subscribe(&self.filter, Self::QOS).await
            }
            BrokerEvent::Message(message) => self.handle_message(&message).await,
            BrokerEvent::Idle => Ok(()),
        }
    }

    /// Translate and inject one message. Untranslatable messages are dropped.
    pub async fn handle_message(&mut self, message: &InboundMessage) -> Result<()> {
        info!(
            "[MQTT] Got message '{}' for topic '{}'",
            String::from_utf8_lossy(&message.payload),
            message.topic
        );

        let write = match translate_inbound(&self.filter, message) {
            Ok(write) => write,
            Err(reason) => {
                warn!("[Bridge] Ignoring message: {}", reason);
                return Ok(());
            }
        };

        info!(
            "[Bridge] KNX injection for {} requested, value {:02X}",
            write.dest, write.value
        );
        self.inject(write).await
    }

    async fn inject(&mut self, write: GroupWrite) -> Result<()> {
        let apdu = write.apdu();
        self.bus
            .reset_connection()
            .await
            .map_err(|e| BridgeError::InjectFailed(e.to_string()))?;
        self.bus
            .send_apdu(write.dest, &apdu)
            .await
            .map_err(|e| BridgeError::InjectFailed(e.to_string()))?;

        info!("[KNX] Message sent: {:02X?} -> {}", apdu, write.dest);
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.broker.close().await {
            warn!("[MQTT] Error during shutdown: {}", e);
        }
        if let Err(e) = self.bus.close().await {
            warn!("[KNX] Error during shutdown: {}", e);
        }
    }
}
