//! KNX bus side: addresses, telegram decoding and the knxd client.

pub mod address;
pub mod bus;
pub mod knxd;
pub mod telegram;

pub use address::{GroupAddress, IndividualAddress};
pub use bus::BusClient;
pub use knxd::{KnxdClient, KnxdUrl};
pub use telegram::{ApduKind, BridgeEvent, GroupTelegram, Payload, decode, write_apdu};
