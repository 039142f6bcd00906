//! Output writers for event packets.
//!
//! Packets can be written verbatim into a packet file, or exported as CSV
//! with one row per event and 64-bit timestamps.

use crate::imu9::Imu9Packet;
use crate::packet::AnyEventPacket;
use crate::polarity::{PolarityEvent, PolarityPacket};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output writing.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// One column of polarity CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    X,
    Y,
    Polarity,
    Timestamp,
}

impl Field {
    fn name(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Polarity => "polarity",
            Self::Timestamp => "timestamp",
        }
    }

    fn value(&self, event: &PolarityEvent<'_>) -> i64 {
        match self {
            Self::X => event.x().into(),
            Self::Y => event.y().into(),
            Self::Polarity => event.polarity().into(),
            Self::Timestamp => event.timestamp64(),
        }
    }
}

/// Column order for polarity CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOrder([Field; 4]);

impl FieldOrder {
    /// x, y, p, t
    pub const XYPT: Self = Self([Field::X, Field::Y, Field::Polarity, Field::Timestamp]);
    /// t, x, y, p
    pub const TXYP: Self = Self([Field::Timestamp, Field::X, Field::Y, Field::Polarity]);

    pub fn fields(&self) -> &[Field; 4] {
        &self.0
    }

    /// Returns the CSV header line for this order.
    pub fn header(&self) -> String {
        self.0.map(|field| field.name()).join(",")
    }
}

impl Default for FieldOrder {
    fn default() -> Self {
        Self::XYPT
    }
}

impl std::str::FromStr for FieldOrder {
    type Err = OutputError;

    /// Parses an order such as "x,y,p,t" or "t,x,y,p".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Vec::with_capacity(4);

        for part in s.split(',').map(|p| p.trim().to_lowercase()) {
            let field = match part.as_str() {
                "x" => Field::X,
                "y" => Field::Y,
                "p" | "pol" | "polarity" => Field::Polarity,
                "t" | "ts" | "timestamp" => Field::Timestamp,
                _ => {
                    return Err(OutputError::InvalidFormat(format!(
                        "Unknown field: {}. Use x, y, p, t",
                        part
                    )))
                }
            };
            if fields.contains(&field) {
                return Err(OutputError::InvalidFormat(format!("Duplicate field: {}", part)));
            }
            fields.push(field);
        }

        let fields: [Field; 4] = fields.try_into().map_err(|_| {
            OutputError::InvalidFormat("Format must have exactly 4 fields: x, y, p, t".to_string())
        })?;
        Ok(Self(fields))
    }
}

/// Which events of a packet to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Only events whose validity mark is set.
    #[default]
    Valid,
    /// Every written event, with an extra `valid` column.
    All,
}

/// CSV writer for polarity events.
pub struct PolarityCsvWriter<W: Write> {
    writer: BufWriter<W>,
    field_order: FieldOrder,
    selection: Selection,
}

impl<W: Write> PolarityCsvWriter<W> {
    pub fn new(writer: W, field_order: FieldOrder, selection: Selection) -> Self {
        Self {
            writer: BufWriter::new(writer),
            field_order,
            selection,
        }
    }

    pub fn write_header(&mut self) -> Result<(), OutputError> {
        match self.selection {
            Selection::Valid => writeln!(self.writer, "{}", self.field_order.header())?,
            Selection::All => writeln!(self.writer, "{},valid", self.field_order.header())?,
        }
        Ok(())
    }

    /// Writes the selected events of one packet; returns the rows written.
    pub fn write_packet(&mut self, packet: &PolarityPacket) -> Result<usize, OutputError> {
        let mut rows = 0;
        for event in packet.iter() {
            let valid = event.is_valid();
            if self.selection == Selection::Valid && !valid {
                continue;
            }

            let [a, b, c, d] = self.field_order.fields().map(|field| field.value(&event));
            match self.selection {
                Selection::Valid => writeln!(self.writer, "{},{},{},{}", a, b, c, d)?,
                Selection::All => {
                    writeln!(self.writer, "{},{},{},{},{}", a, b, c, d, valid as u8)?
                }
            }
            rows += 1;
        }
        Ok(rows)
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// CSV writer for IMU9 events.
pub struct Imu9CsvWriter<W: Write> {
    writer: BufWriter<W>,
    selection: Selection,
}

impl<W: Write> Imu9CsvWriter<W> {
    pub fn new(writer: W, selection: Selection) -> Self {
        Self {
            writer: BufWriter::new(writer),
            selection,
        }
    }

    pub fn write_header(&mut self) -> Result<(), OutputError> {
        write!(
            self.writer,
            "timestamp,accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z,temp,comp_x,comp_y,comp_z"
        )?;
        match self.selection {
            Selection::Valid => writeln!(self.writer)?,
            Selection::All => writeln!(self.writer, ",valid")?,
        }
        Ok(())
    }

    /// Writes the selected events of one packet; returns the rows written.
    pub fn write_packet(&mut self, packet: &Imu9Packet) -> Result<usize, OutputError> {
        let mut rows = 0;
        for event in packet.iter() {
            let valid = event.is_valid();
            if self.selection == Selection::Valid && !valid {
                continue;
            }

            let s = event.sample();
            write!(
                self.writer,
                "{},{},{},{},{},{},{},{},{},{},{}",
                event.timestamp64(),
                s.accel[0],
                s.accel[1],
                s.accel[2],
                s.gyro[0],
                s.gyro[1],
                s.gyro[2],
                s.temp,
                s.comp[0],
                s.comp[1],
                s.comp[2]
            )?;
            match self.selection {
                Selection::Valid => writeln!(self.writer)?,
                Selection::All => writeln!(self.writer, ",{}", valid as u8)?,
            }
            rows += 1;
        }
        Ok(rows)
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes packets verbatim, back to back.
pub struct PacketWriter<W: Write> {
    writer: BufWriter<W>,
    bytes_written: u64,
}

impl<W: Write> PacketWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            bytes_written: 0,
        }
    }

    pub fn write_packet(&mut self, packet: &AnyEventPacket) -> Result<(), OutputError> {
        self.write_bytes(packet.as_bytes())
    }

    /// Writes the raw bytes of a packet of any kind.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
        self.writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes packets to a packet file.
pub fn write_packets<P: AsRef<Path>>(path: P, packets: &[AnyEventPacket]) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = PacketWriter::new(file);
    for packet in packets {
        writer.write_packet(packet)?;
    }
    writer.flush()?;
    Ok(())
}

/// Exports the polarity events of `packets` to a CSV file; returns the rows
/// written.
pub fn write_polarity_csv<P: AsRef<Path>>(
    path: P,
    packets: &[AnyEventPacket],
    field_order: FieldOrder,
    selection: Selection,
) -> Result<usize, OutputError> {
    let file = File::create(path)?;
    let mut writer = PolarityCsvWriter::new(file, field_order, selection);
    writer.write_header()?;
    let mut rows = 0;
    for packet in packets {
        if let AnyEventPacket::Polarity(packet) = packet {
            rows += writer.write_packet(packet)?;
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// Exports the IMU9 events of `packets` to a CSV file; returns the rows
/// written.
pub fn write_imu9_csv<P: AsRef<Path>>(
    path: P,
    packets: &[AnyEventPacket],
    selection: Selection,
) -> Result<usize, OutputError> {
    let file = File::create(path)?;
    let mut writer = Imu9CsvWriter::new(file, selection);
    writer.write_header()?;
    let mut rows = 0;
    for packet in packets {
        if let AnyEventPacket::Imu9(packet) = packet {
            rows += writer.write_packet(packet)?;
        }
    }
    writer.flush()?;
    Ok(rows)
}
