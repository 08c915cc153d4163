//! KNX ↔ MQTT bridge library.
//!
//! Decodes KNX group telegrams read from knxd into MQTT messages, and turns
//! MQTT messages back into group writes on the bus.

pub mod bridge;
pub mod config;
pub mod error;
pub mod knx;
pub mod mqtt;
