//! MQTT payload text for KNX write events.
//!
//! The format is consumed by existing subscribers, so it is reproduced byte
//! for byte, including the space after every extended byte.

use crate::knx::{BridgeEvent, Payload};
use std::fmt::Write as _;

/// Extended payload bytes rendered before truncating.
pub const MAX_RENDERED_BYTES: usize = 8;

/// Render a Write event as `Write m/d/s --> value`. Other kinds yield `None`.
pub fn format_write(event: &BridgeEvent) -> Option<String> {
    if !event.is_write() {
        return None;
    }

    let mut out = format!("Write {} --> ", event.dest);
    match &event.payload {
        Payload::Compact(value) => {
            let _ = write!(out, "{:02X}", value);
        }
        Payload::Extended(bytes) | Payload::Raw(bytes) => {
            for byte in bytes.iter().take(MAX_RENDERED_BYTES) {
                let _ = write!(out, "{:02X} ", byte);
            }
            if bytes.len() > MAX_RENDERED_BYTES {
                let _ = write!(out, "... (original len=={})", bytes.len());
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knx::{GroupAddress, IndividualAddress, decode};

    fn write_event(apdu: &[u8]) -> BridgeEvent {
        decode(apdu, IndividualAddress::from(0x1105), GroupAddress::new(1, 2, 3)).unwrap()
    }

    #[test]
    fn test_compact_write() {
        assert_eq!(
            format_write(&write_event(&[0x00, 0x81])).as_deref(),
            Some("Write 1/2/3 --> 01")
        );
        assert_eq!(
            format_write(&write_event(&[0x00, 0xBF])).as_deref(),
            Some("Write 1/2/3 --> 3F")
        );
    }

    #[test]
    fn test_extended_write() {
        assert_eq!(
            format_write(&write_event(&[0x00, 0x80, 0x0C, 0x1A])).as_deref(),
            Some("Write 1/2/3 --> 0C 1A ")
        );
    }

    #[test]
    fn test_exactly_eight_bytes_not_truncated() {
        let mut apdu = vec![0x00, 0x80];
        apdu.extend(0xA0..0xA8u8);
        assert_eq!(
            format_write(&write_event(&apdu)).as_deref(),
            Some("Write 1/2/3 --> A0 A1 A2 A3 A4 A5 A6 A7 ")
        );
    }

    #[test]
    fn test_long_payload_truncated() {
        let mut apdu = vec![0x00, 0x80];
        apdu.extend(0x00..0x0Cu8);
        assert_eq!(
            format_write(&write_event(&apdu)).as_deref(),
            Some("Write 1/2/3 --> 00 01 02 03 04 05 06 07 ... (original len==12)")
        );
    }

    #[test]
    fn test_truncation_reports_true_length() {
        let mut apdu = vec![0x00, 0x80];
        apdu.extend(std::iter::repeat_n(0xEE, 200));
        let payload = format_write(&write_event(&apdu)).unwrap();
        assert!(payload.ends_with("EE ... (original len==200)"));
    }

    #[test]
    fn test_non_write_kinds() {
        assert_eq!(format_write(&write_event(&[0x00, 0x00])), None);
        assert_eq!(format_write(&write_event(&[0x00, 0x41])), None);
        assert_eq!(format_write(&write_event(&[0x01, 0x80])), None);
    }
}
