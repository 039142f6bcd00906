//! Polarity events.
//!
//! A polarity event reports a brightness change at one pixel: its X/Y
//! address and whether the intensity went up (ON) or down (OFF). The (0, 0)
//! address is the lower left corner.
//!
//! Record layout (8 bytes, little-endian):
//!
//! ```text
//! offset 0  u32 data       [31:17] x | [16:2] y | [1] polarity | [0] valid
//! offset 4  i32 timestamp  31 bits used, bit 31 always 0
//! ```

use crate::event::{Event, EventKind, EventMut, EventRef};
use crate::header::EventType;
use crate::packet::EventPacket;

/// Polarity bit: ON = 1, OFF = 0.
pub const POLARITY_SHIFT: u32 = 1;
pub const POLARITY_MASK: u32 = 0x0000_0001;
/// Addresses of up to 15 bits are supported.
pub const Y_ADDR_SHIFT: u32 = 2;
pub const Y_ADDR_MASK: u32 = 0x0000_7FFF;
pub const X_ADDR_SHIFT: u32 = 17;
pub const X_ADDR_MASK: u32 = 0x0000_7FFF;

const DATA: usize = 0;
const TIMESTAMP: usize = 4;

/// Marker for the polarity event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polarity;

impl EventKind for Polarity {
    const EVENT_TYPE: EventType = EventType::Polarity;
    const SIZE: usize = 8;
    const TS_OFFSET: usize = TIMESTAMP;
    const NAME: &'static str = "Polarity Event";
}

pub type PolarityPacket = EventPacket<Polarity>;
pub type PolarityEvent<'a> = EventRef<'a, Polarity>;
pub type PolarityEventMut<'a> = EventMut<'a, Polarity>;

impl<B: AsRef<[u8]>> Event<B, Polarity> {
    /// True for an ON event (intensity increase).
    #[inline]
    pub fn polarity(&self) -> bool {
        (self.read_u32(DATA) >> POLARITY_SHIFT) & POLARITY_MASK != 0
    }

    #[inline]
    pub fn y(&self) -> u16 {
        ((self.read_u32(DATA) >> Y_ADDR_SHIFT) & Y_ADDR_MASK) as u16
    }

    #[inline]
    pub fn x(&self) -> u16 {
        ((self.read_u32(DATA) >> X_ADDR_SHIFT) & X_ADDR_MASK) as u16
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Event<B, Polarity> {
    #[inline]
    pub fn set_polarity(&mut self, polarity: bool) {
        self.write_bits(DATA, POLARITY_SHIFT, POLARITY_MASK, polarity as u32);
    }

    /// Sets the Y address. Only the low 15 bits are stored.
    #[inline]
    pub fn set_y(&mut self, y: u16) {
        self.write_bits(DATA, Y_ADDR_SHIFT, Y_ADDR_MASK, y.into());
    }

    /// Sets the X address. Only the low 15 bits are stored.
    #[inline]
    pub fn set_x(&mut self, x: u16) {
        self.write_bits(DATA, X_ADDR_SHIFT, X_ADDR_MASK, x.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(capacity: i32) -> PolarityPacket {
        PolarityPacket::allocate(capacity, 1, 0).unwrap()
    }

    #[test]
    fn test_data_word_bit_layout() {
        let mut packet = packet(1);
        {
            let mut event = packet.get_event_mut(0).unwrap();
            event.set_x(0x7FFF);
            event.set_y(0);
            event.set_polarity(false);
        }
        assert_eq!(&packet.as_bytes()[28..32], &0xFFFE_0000u32.to_le_bytes());

        {
            let mut event = packet.get_event_mut(0).unwrap();
            event.set_x(0);
            event.set_y(0x7FFF);
            event.set_polarity(true);
            event.validate().unwrap();
        }
        assert_eq!(&packet.as_bytes()[28..32], &0x0001_FFFFu32.to_le_bytes());
    }

    #[test]
    fn test_fields_round_trip() {
        let mut packet = packet(2);
        {
            let mut event = packet.get_event_mut(1).unwrap();
            event.set_x(1279);
            event.set_y(719);
            event.set_polarity(true);
            event.set_timestamp(123_456).unwrap();
        }

        let event = packet.get_event(1).unwrap();
        assert_eq!(event.x(), 1279);
        assert_eq!(event.y(), 719);
        assert!(event.polarity());
        assert_eq!(event.timestamp(), 123_456);
        assert!(!event.is_valid());
    }

    #[test]
    fn test_repeated_set_replaces_value() {
        let mut packet = packet(1);
        let mut event = packet.get_event_mut(0).unwrap();

        event.set_x(0b101);
        event.set_x(0b010);
        assert_eq!(event.x(), 0b010);

        event.set_y(0x7FFF);
        event.set_y(1);
        assert_eq!(event.y(), 1);

        event.set_polarity(true);
        event.set_polarity(false);
        assert!(!event.polarity());

        // Neighbouring fields are untouched.
        assert_eq!(event.x(), 0b010);
        assert_eq!(event.y(), 1);
    }

    #[test]
    fn test_field_setters_keep_validity_mark() {
        let mut packet = packet(1);
        let mut event = packet.get_event_mut(0).unwrap();
        event.validate().unwrap();

        event.set_polarity(false);
        event.set_y(0);
        event.set_x(0);
        assert!(event.is_valid());
    }

    #[test]
    fn test_addresses_are_masked_to_15_bits() {
        let mut packet = packet(1);
        let mut event = packet.get_event_mut(0).unwrap();
        event.set_x(0xFFFF);
        event.set_y(0x8001);
        assert_eq!(event.x(), 0x7FFF);
        assert_eq!(event.y(), 0x0001);
        assert!(!event.polarity());
        assert!(!event.is_valid());
    }
}
