//! Broker-side interfaces used by the bridge sessions.

use crate::error::Result;
use async_trait::async_trait;
use rumqttc::QoS;

/// Message received from the MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Outcome of one service step on a broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// The broker acknowledged a (re)connect; subscriptions must be renewed.
    Connected,
    Message(InboundMessage),
    /// Protocol traffic the bridge does not act on (acks, pings).
    Idle,
}

/// Publishing half of a broker connection.
#[async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Broker connection serviced by its owner, for the subscribe direction.
#[async_trait]
pub trait BrokerConnection: Send {
    /// Drive the connection until the next event.
    async fn poll(&mut self) -> Result<BrokerEvent>;

    /// Make one attempt to restore a lost connection.
    async fn reconnect(&mut self) -> Result<BrokerEvent>;

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}
