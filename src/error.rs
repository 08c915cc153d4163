use thiserror::Error as ThisError;

/// Reason an inbound MQTT message was not translated into a KNX telegram.
///
/// Skips are never fatal: the message is logged and dropped.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("topic {topic} does not match filter {filter}")]
    TopicMismatch { filter: String, topic: String },

    #[error("no trailing address triple in topic {0}")]
    NoAddressTriple(String),

    #[error("invalid destination address [{0}]")]
    InvalidAddress(String),

    #[error("refusing to inject to broadcast address 0/0/0")]
    BroadcastAddress,

    #[error("malformed payload: {0:?}")]
    MalformedPayload(String),
}

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid packet: telegram of {0} byte(s) is shorter than 2")]
    InvalidPacket(usize),

    #[error("Topic too long: {len} characters (max {max})")]
    TopicTooLong { len: usize, max: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to publish: {0}")]
    PublishFailed(String),

    #[error("Failed to inject telegram: {0}")]
    InjectFailed(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
