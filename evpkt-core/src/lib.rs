//! Event packet codec for neuromorphic sensors.
//!
//! This crate implements the binary event packet format used to exchange
//! polarity (pixel brightness change) events and 9-axis IMU events between
//! producers and consumers, possibly on different architectures or written
//! in different languages. A packet is one contiguous little-endian buffer:
//! a 28-byte header followed by a fixed number of fixed-size event records.
//!
//! # Example
//!
//! ```
//! use evpkt_core::PolarityPacket;
//!
//! let mut packet = PolarityPacket::allocate(3, 1, 0).unwrap();
//!
//! let mut event = packet.get_event_mut(0).unwrap();
//! event.set_x(10);
//! event.set_y(20);
//! event.set_polarity(true);
//! event.set_timestamp(100).unwrap();
//! event.validate().unwrap();
//!
//! assert_eq!(packet.event_number(), 1);
//! assert_eq!(packet.event_valid(), 1);
//! assert_eq!(packet.get_event(0).unwrap().x(), 10);
//! ```
//!
//! # Features
//!
//! - Bit-exact record layouts with explicit shift/mask field accessors
//! - Validity marks kept in sync with the header's event counters
//! - 64-bit timestamps from a 31-bit event timestamp and a packet overflow counter
//! - Zero-copy decoding of received packets and packet files
//! - CSV export of polarity and IMU9 events

#[macro_use]
pub mod log;

pub mod event;
pub mod header;
pub mod imu9;
pub mod output;
pub mod packet;
pub mod polarity;
pub mod reader;

// Re-export commonly used types
pub use event::{timestamp64, Event, EventKind, EventMut, EventRef, GenericEvent};
pub use header::{EventType, PacketHeader, HEADER_SIZE};
pub use imu9::{Imu9, Imu9Packet, Imu9Sample};
pub use log::{log_level, set_log_level, LogLevel};
pub use output::{FieldOrder, OutputError, Selection};
pub use packet::{AnyEventPacket, EventPacket, PacketError};
pub use polarity::{Polarity, PolarityPacket};
pub use reader::{read_file, PacketReader, ReadError};
