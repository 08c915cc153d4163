//! MQTT broker side of the bridge.
//!
//! The sessions talk to the broker through [`Publisher`] and
//! [`BrokerConnection`]; the rumqttc implementations live in `client`.

pub mod broker;
mod client;
pub mod topic;

pub use broker::{BrokerConnection, BrokerEvent, InboundMessage, Publisher};
pub use client::{MqttPublisher, MqttSubscription};
