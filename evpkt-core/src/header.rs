//! Common event packet header.
//!
//! Every packet, of any event type, starts with the same 28-byte header that
//! describes the events that follow it. All fields are stored little-endian
//! and are signed, so that consumers without unsigned integer types can read
//! them directly. Negative values are never written.
//!
//! ```text
//! offset  type  field
//!      0  i16   event type
//!      2  i16   event source
//!      4  i32   event size (bytes per record)
//!      8  i32   offset of the main timestamp inside a record
//!     12  i32   timestamp overflow counter
//!     16  i32   event capacity
//!     20  i32   event number (valid + invalid)
//!     24  i32   event valid
//! ```

use crate::packet::PacketError;
use byteorder::{ByteOrder, LittleEndian};

/// Size of the packet header in bytes. Constant across all systems.
pub const HEADER_SIZE: usize = 28;

/// Validity mark, bit 0 of the first field of every event.
///
/// Zeroing a packet therefore marks all of its events invalid.
pub const VALID_MARK_SHIFT: u32 = 0;
pub const VALID_MARK_MASK: u32 = 0x0000_0001;

/// Shift applied to the packet overflow counter when building a 64-bit
/// timestamp out of the 31-bit event timestamp.
pub const TS_OVERFLOW_SHIFT: u32 = 31;

const EVENT_TYPE: usize = 0;
const EVENT_SOURCE: usize = 2;
const EVENT_SIZE: usize = 4;
const EVENT_TS_OFFSET: usize = 8;
const EVENT_TS_OVERFLOW: usize = 12;
const EVENT_CAPACITY: usize = 16;
const EVENT_NUMBER: usize = 20;
const EVENT_VALID: usize = 24;

#[cfg_attr(feature = "log-none", allow(dead_code))]
const SUBSYSTEM: &str = "EventPacket Header";

/// Numeric event type ids. Ids below 100 are reserved for this format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum EventType {
    /// Special events (0)
    Special = 0,
    /// Polarity change events from the pixel array (1)
    Polarity = 1,
    /// Intensity frames (2)
    Frame = 2,
    /// 6-axis IMU events (3)
    Imu6 = 3,
    /// 9-axis IMU events (4)
    Imu9 = 4,
    /// ADC sample events (5)
    Sample = 5,
    /// Cochlea events (6)
    Ear = 6,
}

impl EventType {
    #[inline]
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Special),
            1 => Some(Self::Polarity),
            2 => Some(Self::Frame),
            3 => Some(Self::Imu6),
            4 => Some(Self::Imu9),
            5 => Some(Self::Sample),
            6 => Some(Self::Ear),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Special => "special",
            Self::Polarity => "polarity",
            Self::Frame => "frame",
            Self::Imu6 => "imu6",
            Self::Imu9 => "imu9",
            Self::Sample => "sample",
            Self::Ear => "ear",
        }
    }
}

/// Typed view of a packet header over raw bytes.
///
/// Works over anything byte-like: a shared slice for reading, a mutable
/// slice (or an owned buffer) for writing. Only the first [`HEADER_SIZE`]
/// bytes are ever touched.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> PacketHeader<B> {
    /// Wraps `buf`, or returns `None` if it is shorter than a header.
    pub fn new(buf: B) -> Option<Self> {
        if buf.as_ref().len() < HEADER_SIZE {
            return None;
        }
        Some(Self { buf })
    }

    /// Wraps a buffer already known to start with a whole header.
    #[inline]
    pub(crate) fn new_unchecked(buf: B) -> Self {
        debug_assert!(buf.as_ref().len() >= HEADER_SIZE);
        Self { buf }
    }

    /// Returns the underlying buffer.
    pub fn into_inner(self) -> B {
        self.buf
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.buf.as_ref()[..HEADER_SIZE]
    }

    #[inline]
    fn read_i32(&self, at: usize) -> i32 {
        LittleEndian::read_i32(&self.bytes()[at..at + 4])
    }

    pub fn event_type(&self) -> i16 {
        LittleEndian::read_i16(&self.bytes()[EVENT_TYPE..EVENT_TYPE + 2])
    }

    /// The event type as a known id, if it is one.
    pub fn kind(&self) -> Option<EventType> {
        EventType::from_i16(self.event_type())
    }

    pub fn event_source(&self) -> i16 {
        LittleEndian::read_i16(&self.bytes()[EVENT_SOURCE..EVENT_SOURCE + 2])
    }

    /// Size of one event in bytes. All events of a packet have the same size.
    pub fn event_size(&self) -> i32 {
        self.read_i32(EVENT_SIZE)
    }

    /// Offset, inside one event, of its main 32-bit timestamp.
    pub fn event_ts_offset(&self) -> i32 {
        self.read_i32(EVENT_TS_OFFSET)
    }

    /// Packet-level timestamp overflow counter.
    pub fn event_ts_overflow(&self) -> i32 {
        self.read_i32(EVENT_TS_OVERFLOW)
    }

    /// Maximum number of events this packet can store.
    pub fn event_capacity(&self) -> i32 {
        self.read_i32(EVENT_CAPACITY)
    }

    /// Number of events written to this packet, valid or not.
    pub fn event_number(&self) -> i32 {
        self.read_i32(EVENT_NUMBER)
    }

    /// Number of valid events in this packet.
    pub fn event_valid(&self) -> i32 {
        self.read_i32(EVENT_VALID)
    }

    /// Total packet size in bytes (header plus `capacity` events), or `None`
    /// if the header holds negative values or the size is not addressable.
    pub fn packet_size(&self) -> Option<usize> {
        let capacity = usize::try_from(self.event_capacity()).ok()?;
        let size = usize::try_from(self.event_size()).ok()?;
        capacity
            .checked_mul(size)?
            .checked_add(HEADER_SIZE)
            .filter(|&total| total <= isize::MAX as usize)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> PacketHeader<B> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf.as_mut()[..HEADER_SIZE]
    }

    fn write_i16(&mut self, field: &'static str, at: usize, value: i16) -> Result<(), PacketError> {
        if value < 0 {
            critical!(SUBSYSTEM, "Called {}() with negative value!", field);
            return Err(PacketError::NegativeValue {
                field,
                value: value.into(),
            });
        }
        LittleEndian::write_i16(&mut self.bytes_mut()[at..at + 2], value);
        Ok(())
    }

    fn write_i32(&mut self, field: &'static str, at: usize, value: i32) -> Result<(), PacketError> {
        if value < 0 {
            critical!(SUBSYSTEM, "Called {}() with negative value!", field);
            return Err(PacketError::NegativeValue { field, value });
        }
        LittleEndian::write_i32(&mut self.bytes_mut()[at..at + 4], value);
        Ok(())
    }

    pub fn set_event_type(&mut self, event_type: i16) -> Result<(), PacketError> {
        self.write_i16("set_event_type", EVENT_TYPE, event_type)
    }

    /// Sets the source id. It should be unique at least within a process.
    pub fn set_event_source(&mut self, event_source: i16) -> Result<(), PacketError> {
        self.write_i16("set_event_source", EVENT_SOURCE, event_source)
    }

    pub fn set_event_size(&mut self, event_size: i32) -> Result<(), PacketError> {
        self.write_i32("set_event_size", EVENT_SIZE, event_size)
    }

    pub fn set_event_ts_offset(&mut self, ts_offset: i32) -> Result<(), PacketError> {
        self.write_i32("set_event_ts_offset", EVENT_TS_OFFSET, ts_offset)
    }

    pub fn set_event_ts_overflow(&mut self, ts_overflow: i32) -> Result<(), PacketError> {
        self.write_i32("set_event_ts_overflow", EVENT_TS_OVERFLOW, ts_overflow)
    }

    /// Sets the capacity. Fixed at allocation time; do not change it on a
    /// live packet.
    pub fn set_event_capacity(&mut self, capacity: i32) -> Result<(), PacketError> {
        self.write_i32("set_event_capacity", EVENT_CAPACITY, capacity)
    }

    pub fn set_event_number(&mut self, number: i32) -> Result<(), PacketError> {
        self.write_i32("set_event_number", EVENT_NUMBER, number)
    }

    pub fn set_event_valid(&mut self, valid: i32) -> Result<(), PacketError> {
        self.write_i32("set_event_valid", EVENT_VALID, valid)
    }
}
