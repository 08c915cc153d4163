//! The two bridge directions and the payload format they share.

pub mod format;
pub mod knx_to_mqtt;
pub mod mqtt_to_knx;

#[cfg(test)]
mod mocks;

pub use format::format_write;
pub use knx_to_mqtt::{PublishProfile, PublishSession};
pub use mqtt_to_knx::{GroupWrite, SessionTiming, SubscribeSession, translate_inbound};
