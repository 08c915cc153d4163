//! Group telegram APDU classification.
//!
//! The decoder here is the only place that knows the APDU bit layout. The
//! MQTT→KNX direction builds its write telegrams with [`write_apdu`] so both
//! directions agree on what a Write looks like.

use super::address::{GroupAddress, IndividualAddress};
use crate::error::{BridgeError, Result};
use std::fmt;

const APCI_MASK: u8 = 0xC0;
const APCI_READ: u8 = 0x00;
const APCI_RESPONSE: u8 = 0x40;
const APCI_WRITE: u8 = 0x80;
const COMPACT_MASK: u8 = 0x3F;

/// A telegram as delivered by the bus, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTelegram {
    pub source: IndividualAddress,
    pub dest: GroupAddress,
    pub apdu: Vec<u8>,
}

/// APDU class of a group telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ApduKind {
    Unknown,
    Read,
    Response,
    Write,
}

/// Value carried by a telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// 6-bit value inlined in the APCI byte of a 2-byte telegram.
    Compact(u8),
    /// Bytes following the 2-byte header.
    Extended(Vec<u8>),
    /// Whole buffer of an unclassifiable telegram, kept for display.
    Raw(Vec<u8>),
}

/// Decoded view of one group telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    pub kind: ApduKind,
    pub source: IndividualAddress,
    pub dest: GroupAddress,
    pub payload: Payload,
}

impl BridgeEvent {
    pub fn is_write(&self) -> bool {
        self.kind == ApduKind::Write
    }
}

/// Classify a raw APDU.
pub fn decode(apdu: &[u8], source: IndividualAddress, dest: GroupAddress) -> Result<BridgeEvent> {
    let [b0, b1, rest @ ..] = apdu else {
        return Err(BridgeError::InvalidPacket(apdu.len()));
    };

    if b0 & 0x03 != 0 || b1 & APCI_MASK == APCI_MASK {
        return Ok(BridgeEvent {
            kind: ApduKind::Unknown,
            source,
            dest,
            payload: Payload::Raw(apdu.to_vec()),
        });
    }

    let kind = match b1 & APCI_MASK {
        APCI_READ => ApduKind::Read,
        APCI_RESPONSE => ApduKind::Response,
        _ => ApduKind::Write,
    };

    let payload = if rest.is_empty() {
        Payload::Compact(b1 & COMPACT_MASK)
    } else {
        Payload::Extended(rest.to_vec())
    };

    Ok(BridgeEvent {
        kind,
        source,
        dest,
        payload,
    })
}

/// Build the 2-byte GroupValueWrite APDU for a compact value.
pub fn write_apdu(value: u8) -> [u8; 2] {
    [0x00, APCI_WRITE | (value & COMPACT_MASK)]
}

/// Space separated uppercase hex dump.
fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.payload) {
            (ApduKind::Unknown, Payload::Raw(bytes)) => write!(
                f,
                "Unknown APDU from {} to {}: {}",
                self.source,
                self.dest,
                hex_dump(bytes)
            ),
            (ApduKind::Read, _) => write!(f, "Read from {} to {}", self.source, self.dest),
            (kind, payload) => {
                write!(f, "{} from {} to {}: ", kind, self.source, self.dest)?;
                match payload {
                    Payload::Compact(value) => write!(f, "{:02X}", value),
                    Payload::Extended(bytes) | Payload::Raw(bytes) => {
                        f.write_str(&hex_dump(bytes))
                    }
                }
            }
        }
    }
}
