//! Reading packet files.
//!
//! A packet file is a plain sequence of packets written back to back. Each
//! packet is self-describing: its header gives the event size and capacity,
//! and therefore the number of bytes that follow it.

use crate::event::EventKind;
use crate::header::{EventType, PacketHeader, HEADER_SIZE};
use crate::imu9::Imu9;
use crate::packet::{AnyEventPacket, PacketError};
use crate::polarity::Polarity;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading packets.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid packet at byte {offset}: {source}")]
    InvalidPacket {
        offset: u64,
        #[source]
        source: PacketError,
    },

    #[error("Unexpected end of file at byte {0}")]
    UnexpectedEof(u64),
}

/// Streaming reader yielding one packet at a time.
#[derive(Debug)]
pub struct PacketReader<R: Read> {
    reader: R,
    offset: u64,
}

impl PacketReader<BufReader<File>> {
    /// Opens a packet file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReadError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> PacketReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next packet, or `None` at a clean end of input.
    pub fn read_packet(&mut self) -> Result<Option<AnyEventPacket>, ReadError> {
        let start = self.offset;

        let mut header_buf = [0u8; HEADER_SIZE];
        let read = self.fill(&mut header_buf)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(ReadError::UnexpectedEof(self.offset));
        }

        let header = PacketHeader::new(&header_buf[..]).ok_or(ReadError::UnexpectedEof(start))?;
        let invalid = |source| ReadError::InvalidPacket {
            offset: start,
            source,
        };

        // Reject what no codec can decode before trusting the header's size.
        let event_size = match header.kind() {
            Some(EventType::Polarity) => Polarity::SIZE,
            Some(EventType::Imu9) => Imu9::SIZE,
            _ => return Err(invalid(PacketError::UnsupportedType(header.event_type()))),
        };
        if header.event_size() != event_size as i32 {
            return Err(invalid(PacketError::InvalidLayout(format!(
                "event size {} does not match {} bytes for {} events",
                header.event_size(),
                event_size,
                header.kind().map_or("unknown", |kind| kind.name())
            ))));
        }
        let size = header.packet_size().ok_or_else(|| {
            invalid(PacketError::InvalidLayout(format!(
                "capacity {} and event size {} do not describe a packet",
                header.event_capacity(),
                header.event_size()
            )))
        })?;

        // The body grows with the bytes actually present, not with the
        // size the header claims.
        let body = (size - HEADER_SIZE) as u64;
        let mut buf = header_buf.to_vec();
        let read = (&mut self.reader).take(body).read_to_end(&mut buf)?;
        self.offset += read as u64;
        if (read as u64) < body {
            return Err(ReadError::UnexpectedEof(self.offset));
        }

        AnyEventPacket::from_bytes(buf).map(Some).map_err(invalid)
    }

    /// Reads until `buf` is full or the input ends; returns bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }
}

impl<R: Read> Iterator for PacketReader<R> {
    type Item = Result<AnyEventPacket, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_packet().transpose()
    }
}

/// Reads every packet of a packet file.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<AnyEventPacket>, ReadError> {
    PacketReader::open(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imu9::Imu9Packet;
    use crate::polarity::PolarityPacket;
    use std::io::Cursor;

    fn two_packets() -> Vec<u8> {
        let mut polarity = PolarityPacket::allocate(2, 1, 0).unwrap();
        polarity.get_event_mut(0).unwrap().validate().unwrap();
        let imu = Imu9Packet::allocate(1, 2, 0).unwrap();

        let mut bytes = polarity.into_bytes();
        bytes.extend_from_slice(imu.as_bytes());
        bytes
    }

    #[test]
    fn test_read_back_to_back_packets() {
        let bytes = two_packets();
        let total = bytes.len() as u64;
        let mut reader = PacketReader::new(Cursor::new(bytes));

        let first = reader.read_packet().unwrap().unwrap();
        assert!(matches!(first, AnyEventPacket::Polarity(ref p) if p.event_valid() == 1));
        let second = reader.read_packet().unwrap().unwrap();
        assert!(matches!(second, AnyEventPacket::Imu9(ref p) if p.source() == 2));
        assert!(reader.read_packet().unwrap().is_none());
        assert_eq!(reader.offset(), total);
    }

    #[test]
    fn test_empty_input() {
        let mut reader = PacketReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_packet().unwrap().is_none());
    }

    #[test]
    fn test_truncated_packet() {
        let mut bytes = two_packets();
        bytes.truncate(bytes.len() - 3);
        let packets: Result<Vec<_>, _> = PacketReader::new(Cursor::new(bytes)).collect();
        assert!(matches!(packets, Err(ReadError::UnexpectedEof(_))));

        let mut reader = PacketReader::new(Cursor::new(vec![0u8; 5]));
        assert!(matches!(reader.read_packet(), Err(ReadError::UnexpectedEof(5))));
    }

    #[test]
    fn test_unsupported_packet_reports_offset() {
        let mut bytes = two_packets();
        let second = PolarityPacket::allocate(2, 1, 0).unwrap().size_bytes();
        // Turn the IMU9 packet into an IMU6 one.
        bytes[second] = 3;
        let mut reader = PacketReader::new(Cursor::new(bytes));
        reader.read_packet().unwrap();
        match reader.read_packet() {
            Err(ReadError::InvalidPacket { offset, source }) => {
                assert_eq!(offset, second as u64);
                assert_eq!(source, PacketError::UnsupportedType(3));
            }
            other => panic!("expected invalid packet, got {:?}", other),
        }
    }

    fn header_bytes(event_type: i16, event_size: i32, capacity: i32) -> Vec<u8> {
        let mut bytes = PolarityPacket::allocate(1, 0, 0).unwrap().into_bytes();
        bytes.truncate(HEADER_SIZE);
        bytes[0..2].copy_from_slice(&event_type.to_le_bytes());
        bytes[4..8].copy_from_slice(&event_size.to_le_bytes());
        bytes[16..20].copy_from_slice(&capacity.to_le_bytes());
        bytes
    }

    #[test]
    fn test_huge_capacity_without_body() {
        let bytes = header_bytes(1, 8, 100_000_000);
        let mut reader = PacketReader::new(Cursor::new(bytes));
        match reader.read_packet() {
            Err(ReadError::UnexpectedEof(offset)) => assert_eq!(offset, HEADER_SIZE as u64),
            other => panic!("expected end of file, got {:?}", other),
        }
    }

    #[test]
    fn test_header_checked_before_body() {
        let mut reader = PacketReader::new(Cursor::new(header_bytes(2, 8, 100_000_000)));
        match reader.read_packet() {
            Err(ReadError::InvalidPacket { offset, source }) => {
                assert_eq!(offset, 0);
                assert_eq!(source, PacketError::UnsupportedType(2));
            }
            other => panic!("expected unsupported type, got {:?}", other),
        }

        let mut reader = PacketReader::new(Cursor::new(header_bytes(4, 8, 1)));
        assert!(matches!(
            reader.read_packet(),
            Err(ReadError::InvalidPacket {
                source: PacketError::InvalidLayout(_),
                ..
            })
        ));
        assert_eq!(reader.offset(), HEADER_SIZE as u64);
    }
}
