//! Generic event record engine.
//!
//! An event is a fixed-size packed record living inside its packet's
//! contiguous storage. Every event kind shares the same skeleton:
//!
//! - bit 0 of the first 32-bit field is the validity mark,
//! - a 31-bit timestamp is stored at a fixed offset,
//! - all multi-byte fields are little-endian.
//!
//! [`Event`] is a view over the *whole* packet buffer plus the offset of one
//! record. Keeping the packet at hand is what lets validation update the
//! header counters, and ties 64-bit timestamp reconstruction to the overflow
//! counter of the packet the event actually belongs to.
//!
//! Kind-specific field accessors live in [`crate::polarity`] and
//! [`crate::imu9`].

use crate::header::{
    EventType, PacketHeader, HEADER_SIZE, TS_OVERFLOW_SHIFT, VALID_MARK_MASK, VALID_MARK_SHIFT,
};
use crate::packet::PacketError;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::marker::PhantomData;

/// Layout description of one event kind.
pub trait EventKind: Copy + fmt::Debug + 'static {
    /// Type id written into the packet header.
    const EVENT_TYPE: EventType;
    /// Record size in bytes.
    const SIZE: usize;
    /// Offset of the 32-bit timestamp inside the record.
    const TS_OFFSET: usize;
    /// Subsystem name used in diagnostics.
    const NAME: &'static str;
}

/// Builds a 64-bit timestamp from a packet overflow counter and a 31-bit
/// event timestamp.
#[inline]
pub fn timestamp64(ts_overflow: i32, timestamp: i32) -> i64 {
    (((ts_overflow as u64) << TS_OVERFLOW_SHIFT) | (timestamp as u64)) as i64
}

/// One event of kind `K` inside a packet buffer `B`.
pub struct Event<B, K> {
    packet: B,
    offset: usize,
    _kind: PhantomData<K>,
}

/// Read-only event handle.
pub type EventRef<'a, K> = Event<&'a [u8], K>;

/// Mutable event handle. Setters write straight into the packet.
pub type EventMut<'a, K> = Event<&'a mut [u8], K>;

impl<B: AsRef<[u8]>, K: EventKind> Event<B, K> {
    /// `offset` must point at a whole record inside `packet`; callers are the
    /// packet's bounds-checked accessors.
    #[inline]
    pub(crate) fn new(packet: B, offset: usize) -> Self {
        debug_assert!(offset >= HEADER_SIZE);
        debug_assert!(offset + K::SIZE <= packet.as_ref().len());
        Self {
            packet,
            offset,
            _kind: PhantomData,
        }
    }

    /// Slot index of this event in its packet.
    pub fn index(&self) -> usize {
        (self.offset - HEADER_SIZE) / K::SIZE
    }

    /// Raw little-endian bytes of this record.
    pub fn as_bytes(&self) -> &[u8] {
        &self.packet.as_ref()[self.offset..self.offset + K::SIZE]
    }

    #[inline]
    fn header(&self) -> PacketHeader<&[u8]> {
        PacketHeader::new_unchecked(self.packet.as_ref())
    }

    #[inline]
    pub(crate) fn read_u32(&self, at: usize) -> u32 {
        LittleEndian::read_u32(&self.as_bytes()[at..at + 4])
    }

    #[inline]
    pub(crate) fn read_f32(&self, at: usize) -> f32 {
        f32::from_bits(self.read_u32(at))
    }

    /// True if the validity mark is set.
    #[inline]
    pub fn is_valid(&self) -> bool {
        (self.read_u32(0) >> VALID_MARK_SHIFT) & VALID_MARK_MASK != 0
    }

    /// The 32-bit event timestamp, in microseconds.
    #[inline]
    pub fn timestamp(&self) -> i32 {
        self.read_u32(K::TS_OFFSET) as i32
    }

    /// The 64-bit timestamp, combining the event timestamp with the owning
    /// packet's overflow counter.
    #[inline]
    pub fn timestamp64(&self) -> i64 {
        timestamp64(self.header().event_ts_overflow(), self.timestamp())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: EventKind> Event<B, K> {
    #[inline]
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        let range = self.offset..self.offset + K::SIZE;
        &mut self.packet.as_mut()[range]
    }

    #[inline]
    fn header_mut(&mut self) -> PacketHeader<&mut [u8]> {
        PacketHeader::new_unchecked(self.packet.as_mut())
    }

    #[inline]
    pub(crate) fn write_u32(&mut self, at: usize, value: u32) {
        LittleEndian::write_u32(&mut self.as_bytes_mut()[at..at + 4], value);
    }

    #[inline]
    pub(crate) fn write_f32(&mut self, at: usize, value: f32) {
        self.write_u32(at, value.to_bits());
    }

    /// Replaces the bit span `mask << shift` of the 32-bit word at `at` with
    /// `value`. Bits outside the span are preserved.
    #[inline]
    pub(crate) fn write_bits(&mut self, at: usize, shift: u32, mask: u32, value: u32) {
        let word = self.read_u32(at) & !(mask << shift);
        self.write_u32(at, word | ((value & mask) << shift));
    }

    /// Sets the 32-bit event timestamp. Negative values would use bit 31,
    /// which is reserved; they are rejected and nothing is written.
    pub fn set_timestamp(&mut self, timestamp: i32) -> Result<(), PacketError> {
        if timestamp < 0 {
            critical!(K::NAME, "Called set_timestamp() with negative value!");
            return Err(PacketError::NegativeValue {
                field: "set_timestamp",
                value: timestamp,
            });
        }
        self.write_u32(K::TS_OFFSET, timestamp as u32);
        Ok(())
    }

    /// Marks this event valid and counts it in the packet header: both the
    /// event number and the valid count grow by one.
    ///
    /// Only legal on an invalid event. On a valid one this is a no-op that
    /// reports [`PacketError::AlreadyValid`].
    pub fn validate(&mut self) -> Result<(), PacketError> {
        if self.is_valid() {
            critical!(K::NAME, "Called validate() on already valid event.");
            return Err(PacketError::AlreadyValid);
        }

        self.write_bits(0, VALID_MARK_SHIFT, VALID_MARK_MASK, 1);

        let mut header = self.header_mut();
        let number = header.event_number().saturating_add(1);
        let valid = header.event_valid().saturating_add(1);
        header.set_event_number(number)?;
        header.set_event_valid(valid)
    }

    /// Marks this event invalid and drops it from the valid count. The event
    /// number is unchanged; the slot stays in use.
    ///
    /// Only legal on a valid event. On an invalid one this is a no-op that
    /// reports [`PacketError::AlreadyInvalid`].
    pub fn invalidate(&mut self) -> Result<(), PacketError> {
        if !self.is_valid() {
            critical!(K::NAME, "Called invalidate() on already invalid event.");
            return Err(PacketError::AlreadyInvalid);
        }

        self.write_bits(0, VALID_MARK_SHIFT, VALID_MARK_MASK, 0);

        let mut header = self.header_mut();
        let valid = header.event_valid().saturating_sub(1);
        header.set_event_valid(valid)
    }
}

impl<K> Clone for Event<&[u8], K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Event<&[u8], K> {}

impl<B: AsRef<[u8]>, K: EventKind> fmt::Debug for Event<B, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::NAME)
            .field("index", &self.index())
            .field("valid", &self.is_valid())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}

/// An event read through the header's size and timestamp offset fields,
/// without knowing its kind.
#[derive(Debug, Clone, Copy)]
pub struct GenericEvent<'a> {
    packet: &'a [u8],
    offset: usize,
}

impl<'a> GenericEvent<'a> {
    /// Returns event `index` of the packet in `packet`.
    ///
    /// `index` must lie in `[0, capacity)`; anything else is reported and
    /// yields `None`. A buffer too short for its own header also yields
    /// `None`.
    pub fn get(packet: &'a [u8], index: i32) -> Option<Self> {
        let header = PacketHeader::new(packet)?;
        let capacity = header.event_capacity();
        if index < 0 || index >= capacity {
            critical!(
                "Generic Event",
                "Called GenericEvent::get() with invalid event offset {}, while maximum allowed value is {}. Negative values are not allowed!",
                index,
                capacity
            );
            return None;
        }

        let size = usize::try_from(header.event_size()).ok()?;
        let ts_offset = usize::try_from(header.event_ts_offset()).ok()?;
        let offset = (index as usize).checked_mul(size)?.checked_add(HEADER_SIZE)?;
        let end = offset.checked_add(size)?;
        if end > packet.len() || ts_offset.checked_add(4)? > size {
            return None;
        }

        Some(Self { packet, offset })
    }

    fn header(&self) -> PacketHeader<&'a [u8]> {
        PacketHeader::new_unchecked(self.packet)
    }

    /// True if the validity mark in the first byte is set.
    pub fn is_valid(&self) -> bool {
        // The mark is bit 0 of a little-endian word, so it sits in byte 0.
        self.packet[self.offset] & VALID_MARK_MASK as u8 != 0
    }

    /// The main 32-bit timestamp, at the header's timestamp offset.
    pub fn timestamp(&self) -> i32 {
        let at = self.offset + self.header().event_ts_offset() as usize;
        LittleEndian::read_i32(&self.packet[at..at + 4])
    }

    pub fn timestamp64(&self) -> i64 {
        timestamp64(self.header().event_ts_overflow(), self.timestamp())
    }

    /// Raw bytes of this event.
    pub fn as_bytes(&self) -> &'a [u8] {
        let size = self.header().event_size() as usize;
        &self.packet[self.offset..self.offset + size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp64_composition() {
        assert_eq!(timestamp64(0, 0), 0);
        assert_eq!(timestamp64(2, 5), (2i64 << 31) | 5);
        assert_eq!(timestamp64(1, i32::MAX), (1i64 << 31) | i32::MAX as i64);
        assert_eq!(timestamp64(0, i32::MAX) + 1, timestamp64(1, 0));
    }

    #[test]
    fn test_timestamp64_large_overflow() {
        let ts = timestamp64(i32::MAX, i32::MAX);
        assert_eq!(ts, (1i64 << 62) - 1);
        assert!(ts > 0);
    }
}
