//! Event packets: one header followed by a fixed number of event slots.
//!
//! A packet is a single contiguous buffer, `[header][event 0]..[event n-1]`,
//! allocated once and never resized. Events are views into that buffer;
//! dropping the packet releases header and events together.

use crate::event::{EventKind, EventMut, EventRef, GenericEvent};
use crate::header::{EventType, PacketHeader, HEADER_SIZE};
use crate::imu9::{Imu9, Imu9Packet};
use crate::polarity::{Polarity, PolarityPacket};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// Errors reported by packet and event operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Invalid event capacity {0}, must be positive")]
    InvalidCapacity(i32),

    #[error("Packet of {capacity} events of {event_size} bytes exceeds addressable memory")]
    SizeOverflow { capacity: i32, event_size: usize },

    #[error("Failed to allocate {0} bytes for event packet")]
    AllocationFailed(usize),

    #[error("Negative value {value} passed to {field}()")]
    NegativeValue { field: &'static str, value: i32 },

    #[error("Event is already valid")]
    AlreadyValid,

    #[error("Event is already invalid")]
    AlreadyInvalid,

    #[error("Buffer of {0} bytes is too short for a packet header")]
    Truncated(usize),

    #[error("Event type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: i16, found: i16 },

    #[error("Unsupported event type {0}")]
    UnsupportedType(i16),

    #[error("Invalid packet layout: {0}")]
    InvalidLayout(String),
}

/// A packet of events of kind `K`.
#[derive(Clone)]
pub struct EventPacket<K: EventKind> {
    buf: Vec<u8>,
    _kind: PhantomData<K>,
}

impl<K: EventKind> EventPacket<K> {
    /// Allocates a zeroed packet with room for `capacity` events.
    ///
    /// All events start out invalid and all counters at zero. A negative
    /// `source` or `ts_overflow` is reported and left at zero; the packet is
    /// still returned.
    pub fn allocate(capacity: i32, source: i16, ts_overflow: i32) -> Result<Self, PacketError> {
        if capacity <= 0 {
            critical!(
                K::NAME,
                "Called allocate() with invalid capacity {}, must be positive.",
                capacity
            );
            return Err(PacketError::InvalidCapacity(capacity));
        }

        let size = (capacity as usize)
            .checked_mul(K::SIZE)
            .and_then(|events| events.checked_add(HEADER_SIZE))
            .filter(|&total| total <= isize::MAX as usize);
        let Some(size) = size else {
            critical!(
                K::NAME,
                "Failed to allocate packet: {} events of {} bytes overflow addressable memory.",
                capacity,
                K::SIZE
            );
            return Err(PacketError::SizeOverflow {
                capacity,
                event_size: K::SIZE,
            });
        };

        let mut buf = Vec::new();
        if buf.try_reserve_exact(size).is_err() {
            critical!(K::NAME, "Failed to allocate {} bytes for event packet.", size);
            return Err(PacketError::AllocationFailed(size));
        }
        buf.resize(size, 0);

        let mut packet = Self {
            buf,
            _kind: PhantomData,
        };

        let mut header = packet.header_mut();
        header.set_event_type(K::EVENT_TYPE as i16)?;
        header.set_event_size(K::SIZE as i32)?;
        header.set_event_ts_offset(K::TS_OFFSET as i32)?;
        header.set_event_capacity(capacity)?;
        // Rejected values are already reported by the setters.
        let _ = header.set_event_source(source);
        let _ = header.set_event_ts_overflow(ts_overflow);

        Ok(packet)
    }

    /// Adopts a packet received as raw bytes.
    ///
    /// The header must describe exactly this buffer and event kind, and its
    /// valid count must agree with the validity marks of the events.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self, PacketError> {
        let header = PacketHeader::new(buf.as_slice()).ok_or(PacketError::Truncated(buf.len()))?;

        let found = header.event_type();
        if found != K::EVENT_TYPE as i16 {
            return Err(PacketError::TypeMismatch {
                expected: K::EVENT_TYPE as i16,
                found,
            });
        }

        if header.event_size() != K::SIZE as i32 || header.event_ts_offset() != K::TS_OFFSET as i32
        {
            return Err(PacketError::InvalidLayout(format!(
                "event size {} and timestamp offset {} do not match {} ({}, {})",
                header.event_size(),
                header.event_ts_offset(),
                K::NAME,
                K::SIZE,
                K::TS_OFFSET
            )));
        }

        let capacity = header.event_capacity();
        if capacity <= 0 {
            return Err(PacketError::InvalidCapacity(capacity));
        }

        let expected = header.packet_size().ok_or(PacketError::SizeOverflow {
            capacity,
            event_size: K::SIZE,
        })?;
        if expected != buf.len() {
            return Err(PacketError::InvalidLayout(format!(
                "header describes {} bytes, buffer holds {}",
                expected,
                buf.len()
            )));
        }

        let number = header.event_number();
        let valid = header.event_valid();
        if number < 0 || valid < 0 {
            return Err(PacketError::InvalidLayout(format!(
                "negative counters: number {}, valid {}",
                number, valid
            )));
        }
        if valid > number {
            return Err(PacketError::InvalidLayout(format!(
                "header counts {} valid events out of {} written",
                valid, number
            )));
        }

        let packet = Self {
            buf,
            _kind: PhantomData,
        };

        let mut marked = 0usize;
        for event in packet.slots().filter(|event| event.is_valid()) {
            if event.index() >= number as usize {
                return Err(PacketError::InvalidLayout(format!(
                    "slot {} is marked valid beyond the {} written events",
                    event.index(),
                    number
                )));
            }
            marked += 1;
        }
        if marked != valid as usize {
            return Err(PacketError::InvalidLayout(format!(
                "header counts {} valid events, {} are marked valid",
                valid, marked
            )));
        }

        Ok(packet)
    }

    pub fn header(&self) -> PacketHeader<&[u8]> {
        PacketHeader::new_unchecked(self.buf.as_slice())
    }

    // Capacity, size and type are fixed for the packet's lifetime, so the
    // mutable header stays private.
    fn header_mut(&mut self) -> PacketHeader<&mut [u8]> {
        PacketHeader::new_unchecked(self.buf.as_mut_slice())
    }

    /// Maximum number of events this packet can hold.
    pub fn capacity(&self) -> i32 {
        self.header().event_capacity()
    }

    /// Number of events written (validated at least once).
    pub fn event_number(&self) -> i32 {
        self.header().event_number()
    }

    /// Number of currently valid events.
    pub fn event_valid(&self) -> i32 {
        self.header().event_valid()
    }

    pub fn source(&self) -> i16 {
        self.header().event_source()
    }

    pub fn ts_overflow(&self) -> i32 {
        self.header().event_ts_overflow()
    }

    pub fn set_source(&mut self, source: i16) -> Result<(), PacketError> {
        self.header_mut().set_event_source(source)
    }

    /// Sets the packet-level timestamp overflow counter. This changes the
    /// 64-bit timestamp of every event in the packet.
    pub fn set_ts_overflow(&mut self, ts_overflow: i32) -> Result<(), PacketError> {
        self.header_mut().set_event_ts_overflow(ts_overflow)
    }

    /// Byte offset of slot `index`, or `None` (reported) if out of bounds.
    fn slot_offset(&self, index: i32) -> Option<usize> {
        let capacity = self.capacity();
        if index < 0 || index >= capacity {
            critical!(
                K::NAME,
                "Called get_event() with invalid event offset {}, while maximum allowed value is {}.",
                index,
                capacity
            );
            return None;
        }
        Some(HEADER_SIZE + index as usize * K::SIZE)
    }

    /// Returns event `index`, which must lie in `[0, capacity)`.
    pub fn get_event(&self, index: i32) -> Option<EventRef<'_, K>> {
        let offset = self.slot_offset(index)?;
        Some(EventRef::new(self.buf.as_slice(), offset))
    }

    /// Returns a mutable handle to event `index`, which must lie in
    /// `[0, capacity)`.
    pub fn get_event_mut(&mut self, index: i32) -> Option<EventMut<'_, K>> {
        let offset = self.slot_offset(index)?;
        Some(EventMut::new(self.buf.as_mut_slice(), offset))
    }

    /// Returns event `index` read through the header's generic layout fields.
    pub fn generic_event(&self, index: i32) -> Option<GenericEvent<'_>> {
        GenericEvent::get(&self.buf, index)
    }

    /// Iterates over the written events, slots `0..event_number`.
    pub fn iter(&self) -> Iter<'_, K> {
        let number = usize::try_from(self.event_number()).unwrap_or(0);
        let capacity = usize::try_from(self.capacity()).unwrap_or(0);
        Iter::new(&self.buf, number.min(capacity))
    }

    /// Iterates over the written events whose validity mark is set.
    pub fn iter_valid(&self) -> impl Iterator<Item = EventRef<'_, K>> {
        self.iter().filter(|event| event.is_valid())
    }

    /// Iterates over every slot, written or not.
    fn slots(&self) -> Iter<'_, K> {
        let capacity = usize::try_from(self.capacity()).unwrap_or(0);
        Iter::new(&self.buf, capacity)
    }

    /// Total packet size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.buf.len()
    }

    /// The raw packet, ready to be sent or written as is.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl<K: EventKind> fmt::Debug for EventPacket<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        f.debug_struct("EventPacket")
            .field("kind", &K::NAME)
            .field("source", &header.event_source())
            .field("capacity", &header.event_capacity())
            .field("number", &header.event_number())
            .field("valid", &header.event_valid())
            .field("ts_overflow", &header.event_ts_overflow())
            .finish()
    }
}

impl<'a, K: EventKind> IntoIterator for &'a EventPacket<K> {
    type Item = EventRef<'a, K>;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the leading slots of a packet.
#[derive(Debug, Clone)]
pub struct Iter<'a, K> {
    buf: &'a [u8],
    next: usize,
    end: usize,
    _kind: PhantomData<K>,
}

impl<'a, K: EventKind> Iter<'a, K> {
    fn new(buf: &'a [u8], end: usize) -> Self {
        Self {
            buf,
            next: 0,
            end,
            _kind: PhantomData,
        }
    }
}

impl<'a, K: EventKind> Iterator for Iter<'a, K> {
    type Item = EventRef<'a, K>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let offset = HEADER_SIZE + self.next * K::SIZE;
        self.next += 1;
        Some(EventRef::new(self.buf, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl<K: EventKind> ExactSizeIterator for Iter<'_, K> {}

/// A packet of any event kind with a record codec.
#[derive(Debug, Clone)]
pub enum AnyEventPacket {
    Polarity(PolarityPacket),
    Imu9(Imu9Packet),
}

impl AnyEventPacket {
    /// Adopts raw packet bytes, choosing the codec from the header's event
    /// type.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self, PacketError> {
        let header = PacketHeader::new(buf.as_slice()).ok_or(PacketError::Truncated(buf.len()))?;
        let event_type = header.event_type();

        match EventType::from_i16(event_type) {
            Some(EventType::Polarity) => Ok(Self::Polarity(EventPacket::<Polarity>::from_bytes(buf)?)),
            Some(EventType::Imu9) => Ok(Self::Imu9(EventPacket::<Imu9>::from_bytes(buf)?)),
            _ => Err(PacketError::UnsupportedType(event_type)),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::Polarity(_) => EventType::Polarity,
            Self::Imu9(_) => EventType::Imu9,
        }
    }

    pub fn header(&self) -> PacketHeader<&[u8]> {
        PacketHeader::new_unchecked(self.as_bytes())
    }

    pub fn generic_event(&self, index: i32) -> Option<GenericEvent<'_>> {
        GenericEvent::get(self.as_bytes(), index)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Polarity(packet) => packet.as_bytes(),
            Self::Imu9(packet) => packet.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Polarity(packet) => packet.into_bytes(),
            Self::Imu9(packet) => packet.into_bytes(),
        }
    }
}

impl From<PolarityPacket> for AnyEventPacket {
    fn from(packet: PolarityPacket) -> Self {
        Self::Polarity(packet)
    }
}

impl From<Imu9Packet> for AnyEventPacket {
    fn from(packet: Imu9Packet) -> Self {
        Self::Imu9(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_initial_state() {
        for capacity in [1, 2, 3, 17, 1024] {
            let packet = PolarityPacket::allocate(capacity, 7, 3).unwrap();
            assert_eq!(packet.capacity(), capacity);
            assert_eq!(packet.event_number(), 0);
            assert_eq!(packet.event_valid(), 0);
            assert_eq!(packet.source(), 7);
            assert_eq!(packet.ts_overflow(), 3);
            assert_eq!(packet.size_bytes(), HEADER_SIZE + capacity as usize * 8);
            assert!(packet.as_bytes()[HEADER_SIZE..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_allocate_writes_layout_fields() {
        let packet = Imu9Packet::allocate(2, 0, 0).unwrap();
        let header = packet.header();
        assert_eq!(header.kind(), Some(EventType::Imu9));
        assert_eq!(header.event_size(), 48);
        assert_eq!(header.event_ts_offset(), 4);
        assert_eq!(header.packet_size(), Some(packet.size_bytes()));
    }

    #[test]
    fn test_allocate_rejects_non_positive_capacity() {
        assert_eq!(
            PolarityPacket::allocate(0, 0, 0).unwrap_err(),
            PacketError::InvalidCapacity(0)
        );
        assert_eq!(
            Imu9Packet::allocate(-3, 0, 0).unwrap_err(),
            PacketError::InvalidCapacity(-3)
        );
    }

    #[test]
    fn test_allocate_with_negative_source_and_overflow() {
        let packet = PolarityPacket::allocate(4, -1, -1).unwrap();
        assert_eq!(packet.source(), 0);
        assert_eq!(packet.ts_overflow(), 0);
        assert_eq!(packet.capacity(), 4);
    }

    #[test]
    fn test_get_event_bounds() {
        for capacity in [1, 2, 5] {
            let mut packet = PolarityPacket::allocate(capacity, 0, 0).unwrap();
            assert!(packet.get_event(-1).is_none());
            assert!(packet.get_event(i32::MIN).is_none());
            assert!(packet.get_event(capacity).is_none());
            assert!(packet.get_event(capacity + 1).is_none());
            assert!(packet.get_event_mut(capacity).is_none());
            assert!(packet.get_event(0).is_some());
            assert!(packet.get_event(capacity - 1).is_some());
        }
    }

    #[test]
    fn test_slot_handles_alias_storage() {
        let mut packet = PolarityPacket::allocate(3, 0, 0).unwrap();
        packet.get_event_mut(2).unwrap().set_x(42);

        assert_eq!(packet.get_event(2).unwrap().x(), 42);
        assert_eq!(packet.get_event(2).unwrap().index(), 2);
        assert_eq!(packet.get_event(1).unwrap().x(), 0);
        assert_eq!(&packet.as_bytes()[HEADER_SIZE + 16..HEADER_SIZE + 20], &(42u32 << 17).to_le_bytes());
    }

    #[test]
    fn test_iterators() {
        let mut packet = PolarityPacket::allocate(4, 0, 0).unwrap();
        for index in 0..3 {
            let mut event = packet.get_event_mut(index).unwrap();
            event.set_x(index as u16);
            event.validate().unwrap();
        }
        packet.get_event_mut(1).unwrap().invalidate().unwrap();

        assert_eq!(packet.iter().len(), 3);
        let valid: Vec<u16> = packet.iter_valid().map(|event| event.x()).collect();
        assert_eq!(valid, vec![0, 2]);
        assert_eq!((&packet).into_iter().count(), 3);
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let mut packet = PolarityPacket::allocate(2, 9, 1).unwrap();
        {
            let mut event = packet.get_event_mut(0).unwrap();
            event.set_y(5);
            event.set_timestamp(77).unwrap();
            event.validate().unwrap();
        }

        let decoded = PolarityPacket::from_bytes(packet.as_bytes().to_vec()).unwrap();
        assert_eq!(decoded.as_bytes(), packet.as_bytes());
        assert_eq!(decoded.get_event(0).unwrap().timestamp64(), (1i64 << 31) | 77);
    }

    #[test]
    fn test_from_bytes_rejections() {
        let packet = PolarityPacket::allocate(2, 0, 0).unwrap();
        let bytes = packet.as_bytes().to_vec();

        assert_eq!(
            PolarityPacket::from_bytes(bytes[..10].to_vec()).unwrap_err(),
            PacketError::Truncated(10)
        );
        assert_eq!(
            Imu9Packet::from_bytes(bytes.clone()).unwrap_err(),
            PacketError::TypeMismatch {
                expected: 4,
                found: 1
            }
        );
        assert!(matches!(
            PolarityPacket::from_bytes(bytes[..bytes.len() - 1].to_vec()),
            Err(PacketError::InvalidLayout(_))
        ));

        // Validity mark set without being counted in the header.
        let mut unaccounted = bytes.clone();
        unaccounted[HEADER_SIZE] |= 1;
        assert!(matches!(
            PolarityPacket::from_bytes(unaccounted),
            Err(PacketError::InvalidLayout(_))
        ));

        // More valid events than written ones.
        let mut packet = PolarityPacket::allocate(2, 0, 0).unwrap();
        packet.get_event_mut(0).unwrap().validate().unwrap();
        let mut overcounted = packet.as_bytes().to_vec();
        overcounted[20..24].copy_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            PolarityPacket::from_bytes(overcounted),
            Err(PacketError::InvalidLayout(_))
        ));

        // Counted mark on a slot past the written events.
        let mut stray = packet.as_bytes().to_vec();
        stray[HEADER_SIZE] &= !1;
        stray[HEADER_SIZE + 8] |= 1;
        assert!(matches!(
            PolarityPacket::from_bytes(stray),
            Err(PacketError::InvalidLayout(_))
        ));

        // Capacity of zero.
        let mut empty = bytes[..HEADER_SIZE].to_vec();
        empty[16..20].copy_from_slice(&0i32.to_le_bytes());
        assert_eq!(
            PolarityPacket::from_bytes(empty).unwrap_err(),
            PacketError::InvalidCapacity(0)
        );
    }

    #[test]
    fn test_any_packet_dispatch() {
        let polarity = PolarityPacket::allocate(1, 0, 0).unwrap();
        let imu = Imu9Packet::allocate(1, 0, 0).unwrap();

        let any = AnyEventPacket::from_bytes(polarity.into_bytes()).unwrap();
        assert_eq!(any.event_type(), EventType::Polarity);
        let any = AnyEventPacket::from_bytes(imu.into_bytes()).unwrap();
        assert_eq!(any.event_type(), EventType::Imu9);

        let mut frame = vec![0u8; HEADER_SIZE];
        frame[0] = EventType::Frame as u8;
        assert_eq!(
            AnyEventPacket::from_bytes(frame).unwrap_err(),
            PacketError::UnsupportedType(2)
        );
    }

    #[test]
    fn test_generic_event_access() {
        let mut packet = Imu9Packet::allocate(3, 0, 2).unwrap();
        {
            let mut event = packet.get_event_mut(1).unwrap();
            event.set_timestamp(5).unwrap();
            event.validate().unwrap();
        }

        let generic = packet.generic_event(1).unwrap();
        assert!(generic.is_valid());
        assert_eq!(generic.timestamp(), 5);
        assert_eq!(generic.timestamp64(), (2i64 << 31) | 5);
        assert_eq!(generic.as_bytes().len(), 48);
        assert!(!packet.generic_event(0).unwrap().is_valid());
        assert!(packet.generic_event(3).is_none());
        assert!(packet.generic_event(-1).is_none());
    }
}
