//! Scripted bus and broker doubles for the session tests.

use crate::error::{BridgeError, Result};
use crate::knx::{BusClient, GroupAddress, GroupTelegram, IndividualAddress};
use crate::mqtt::{BrokerConnection, BrokerEvent, InboundMessage, Publisher};
use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::QoS;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn telegram(source: u16, dest: GroupAddress, apdu: &[u8]) -> GroupTelegram {
    GroupTelegram {
        source: IndividualAddress::from(source),
        dest,
        apdu: apdu.to_vec(),
    }
}

pub(crate) fn message(topic: &str, payload: &str) -> InboundMessage {
    InboundMessage {
        topic: topic.to_string(),
        payload: payload.as_bytes().to_vec(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct BusLog {
    pub opened: bool,
    pub resets: usize,
    pub sent: Vec<(GroupAddress, Vec<u8>)>,
    pub closed: bool,
}

/// Bus that replays queued telegrams, then blocks forever.
#[derive(Default)]
pub(crate) struct MockBus {
    pub telegrams: VecDeque<Result<GroupTelegram>>,
    pub fail_open: bool,
    pub fail_send: bool,
    pub log: Arc<Mutex<BusLog>>,
}

impl MockBus {
    pub fn with_telegrams(telegrams: Vec<Result<GroupTelegram>>) -> Self {
        Self {
            telegrams: telegrams.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BusClient for MockBus {
    async fn open_group_socket(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(BridgeError::ConnectionFailed("bus unreachable".to_string()));
        }
        self.log.lock().opened = true;
        Ok(())
    }

    async fn read_group_telegram(&mut self) -> Result<GroupTelegram> {
        match self.telegrams.pop_front() {
            Some(telegram) => telegram,
            None => std::future::pending().await,
        }
    }

    async fn reset_connection(&mut self) -> Result<()> {
        self.log.lock().resets += 1;
        Ok(())
    }

    async fn send_apdu(&mut self, dest: GroupAddress, apdu: &[u8]) -> Result<()> {
        if self.fail_send {
            return Err(BridgeError::ConnectionFailed("send refused".to_string()));
        }
        self.log.lock().sent.push((dest, apdu.to_vec()));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Debug, Default)]
pub(crate) struct PublishLog {
    pub published: Vec<Published>,
    pub closed: bool,
}

#[derive(Default)]
pub(crate) struct MockPublisher {
    pub fail: bool,
    pub log: Arc<Mutex<PublishLog>>,
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<()> {
        if self.fail {
            return Err(BridgeError::PublishFailed(topic.to_string()));
        }
        self.log.lock().published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            retain,
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().closed = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct BrokerLog {
    pub polls: usize,
    pub reconnects: usize,
    pub subscriptions: Vec<(String, QoS)>,
    pub closed: bool,
}

/// Broker that replays scripted poll outcomes, then stays quiet.
#[derive(Default)]
pub(crate) struct MockBroker {
    pub polls: VecDeque<Result<BrokerEvent>>,
    /// Outcomes of `reconnect()`; `Idle` once exhausted.
    pub reconnects: VecDeque<Result<BrokerEvent>>,
    /// Time each scripted poll takes, like a slow CONNACK.
    pub poll_delay: Duration,
    pub log: Arc<Mutex<BrokerLog>>,
}

impl MockBroker {
    pub fn with_polls(polls: Vec<Result<BrokerEvent>>) -> Self {
        Self {
            polls: polls.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BrokerConnection for MockBroker {
    async fn poll(&mut self) -> Result<BrokerEvent> {
        self.log.lock().polls += 1;
        match self.polls.pop_front() {
            Some(outcome) => {
                tokio::time::sleep(self.poll_delay).await;
                outcome
            }
            None => std::future::pending().await,
        }
    }

    async fn reconnect(&mut self) -> Result<BrokerEvent> {
        self.log.lock().reconnects += 1;
        self.reconnects.pop_front().unwrap_or(Ok(BrokerEvent::Idle))
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<()> {
        self.log.lock().subscriptions.push((filter.to_string(), qos));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().closed = true;
        Ok(())
    }
}
