//! KNX → MQTT: forward group writes seen on the bus to the broker.

use super::format::format_write;
use crate::error::Result;
use crate::knx::{BusClient, GroupTelegram, decode};
use crate::mqtt::Publisher;
use crate::mqtt::topic::{address_topic, validate_base_topic};
use log::{info, warn};
use rumqttc::QoS;
use tokio_util::sync::CancellationToken;

/// Where and how decoded writes are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishProfile {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    /// Also publish to `{topic}/{main}/{middle}/{sub}`.
    pub per_address: bool,
}

impl PublishProfile {
    pub const ONE_SHOT_TOPIC: &'static str = "knx/write";

    /// Fixed single-topic bridge: retained, QoS 2.
    pub fn one_shot() -> Self {
        Self {
            topic: Self::ONE_SHOT_TOPIC.to_string(),
            qos: QoS::ExactlyOnce,
            retain: true,
            per_address: false,
        }
    }

    /// Configurable bridge publishing to the flat and per-address topics.
    pub fn publish_only(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            qos: QoS::ExactlyOnce,
            retain: false,
            per_address: true,
        }
    }
}

/// Bus reading half of the bridge.
///
/// Runs until cancelled or until the bus or broker fails; every failure is
/// returned to the caller as fatal.
pub struct PublishSession<K, P> {
    bus: K,
    publisher: P,
    profile: PublishProfile,
}

impl<K: BusClient, P: Publisher> PublishSession<K, P> {
    pub fn new(bus: K, publisher: P, profile: PublishProfile) -> Result<Self> {
        validate_base_topic(&profile.topic)?;
        Ok(Self {
            bus,
            publisher,
            profile,
        })
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        self.bus.open_group_socket().await?;
        info!(
            "[Bridge] Forwarding KNX writes to {}{}",
            self.profile.topic,
            if self.profile.per_address {
                " (+ per-address topics)"
            } else {
                ""
            }
        );

        let outcome = self.forward(&cancel).await;
        self.shutdown().await;
        outcome
    }

    async fn forward(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let telegram = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[Bridge] Shutdown requested");
                    return Ok(());
                }
                telegram = self.bus.read_group_telegram() => telegram?,
            };
            self.handle_telegram(&telegram).await?;
        }
    }

    /// Trace one telegram and publish it if it is a write.
    pub async fn handle_telegram(&mut self, telegram: &GroupTelegram) -> Result<()> {
        let event = decode(&telegram.apdu, telegram.source, telegram.dest)?;
        info!("[KNX] {}", event);

        let Some(payload) = format_write(&event) else {
            return Ok(());
        };

        let PublishProfile {
            topic, qos, retain, ..
        } = &self.profile;
        self.publisher.publish(topic, &payload, *qos, *retain).await?;

        if self.profile.per_address {
            let sub_topic = address_topic(&self.profile.topic, event.dest)?;
            self.publisher
                .publish(&sub_topic, &payload, self.profile.qos, self.profile.retain)
                .await?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.publisher.close().await {
            warn!("[MQTT] Error during shutdown: {}", e);
        }
        if let Err(e) = self.bus.close().await {
            warn!("[KNX] Error during shutdown: {}", e);
        }
    }
}
