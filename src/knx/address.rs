//! KNX group and individual addresses.

use std::fmt;

/// A 16-bit KNX group address, displayed as `main/middle/sub`.
///
/// Packed as `main << 11 | middle << 8 | sub` with `main` in 0..=31,
/// `middle` in 0..=7 and `sub` in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupAddress(u16);

impl GroupAddress {
    pub const MAX_MAIN: u8 = 0x1F;
    pub const MAX_MIDDLE: u8 = 0x07;

    /// Pack a triple. Components wider than their field are masked.
    pub fn new(main: u8, middle: u8, sub: u8) -> Self {
        Self(
            ((main as u16 & 0x1F) << 11) | ((middle as u16 & 0x07) << 8) | sub as u16,
        )
    }

    /// Unpack into `(main, middle, sub)`.
    pub fn triple(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 11) & 0x1F) as u8,
            ((self.0 >> 8) & 0x07) as u8,
            (self.0 & 0xFF) as u8,
        )
    }

    /// Parse a `main/middle/sub` triple.
    ///
    /// Returns `None` unless the text holds exactly three unsigned decimal
    /// components that are all within range. `0/0/0` parses successfully;
    /// callers that must not address it check [`GroupAddress::is_broadcast`].
    pub fn parse_triple(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('/');
        let main: u32 = parts.next()?.parse().ok()?;
        let middle: u32 = parts.next()?.parse().ok()?;
        let sub: u32 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        if main > Self::MAX_MAIN as u32 || middle > Self::MAX_MIDDLE as u32 || sub > 0xFF {
            return None;
        }

        Some(Self::new(main as u8, middle as u8, sub as u8))
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    /// `0/0/0` is reserved for broadcast on the bus.
    pub fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl From<u16> for GroupAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (main, middle, sub) = self.triple();
        write!(f, "{}/{}/{}", main, middle, sub)
    }
}

/// Physical address of a bus device, displayed as `area.line.device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndividualAddress(u16);

impl From<u16> for IndividualAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            (self.0 >> 12) & 0x0F,
            (self.0 >> 8) & 0x0F,
            self.0 & 0xFF
        )
    }
}
