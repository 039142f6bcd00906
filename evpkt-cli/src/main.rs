//! Event packet CLI application.
//!
//! Inspects packet files, exports their events to CSV and writes synthetic
//! packet files for testing consumers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use evpkt_core::output::{self, PacketWriter};
use evpkt_core::{
    read_file, set_log_level, AnyEventPacket, FieldOrder, Imu9Packet, Imu9Sample, LogLevel,
    PacketReader, PolarityPacket, Selection,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

/// Tool for binary event packet files.
///
/// A packet file is a sequence of polarity or IMU9 event packets written
/// back to back.
#[derive(Parser, Debug)]
#[command(name = "evpkt")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Minimum severity of codec diagnostics printed to stderr.
    ///
    /// Accepts a level name (emergency, alert, critical, error, warning,
    /// notice, info, debug) or its number 0-7.
    #[arg(long, global = true, default_value = "error")]
    log_level: LogLevel,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header of every packet in a packet file.
    ///
    /// Packets whose counters disagree with their validity marks are
    /// reported as errors.
    Inspect {
        /// Input packet file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Export events to CSV.
    Dump {
        /// Input packet file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output CSV path for polarity events
        ///
        /// If the file holds no polarity packets, IMU9 events are written
        /// here instead.
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Field order for polarity CSV output.
        ///
        /// Format: comma-separated field names (x, y, p, t)
        ///
        /// Examples:
        /// - "x,y,p,t" (default)
        /// - "t,x,y,p" (timestamp first)
        #[arg(short, long, default_value = "x,y,p,t")]
        format: String,

        /// Output CSV path for IMU9 events (optional)
        #[arg(long, value_name = "PATH")]
        imu9: Option<PathBuf>,

        /// Export invalidated events too, with an extra `valid` column
        #[arg(short, long)]
        all: bool,
    },

    /// Write a packet file with a deterministic event pattern.
    Synth {
        /// Output packet file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Event kind of the generated packets
        #[arg(short, long, value_enum, default_value = "polarity")]
        kind: Kind,

        /// Number of packets
        #[arg(short, long, default_value_t = 16)]
        packets: u32,

        /// Events per packet
        #[arg(short, long, default_value_t = 4096)]
        capacity: i32,

        /// Event source id written into each header
        #[arg(short, long, default_value_t = 1)]
        source: i16,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Polarity,
    Imu9,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();
    set_log_level(args.log_level);

    match args.command {
        Command::Inspect { input } => inspect(&input),
        Command::Dump {
            input,
            output,
            format,
            imu9,
            all,
        } => dump(&input, &output, &format, imu9.as_deref(), all, args.quiet),
        Command::Synth {
            output,
            kind,
            packets,
            capacity,
            source,
        } => synth(&output, kind, packets, capacity, source, args.quiet),
    }
}

fn inspect(input: &Path) -> Result<()> {
    let reader = PacketReader::open(input)
        .with_context(|| format!("Failed to open packet file {:?}", input))?;

    println!(
        "{:>6} {:>12} {:>8} {:>6} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "packet", "offset", "type", "source", "capacity", "number", "valid", "overflow", "bytes"
    );

    let mut offset = 0u64;
    let mut count = 0usize;
    for (index, packet) in reader.enumerate() {
        let packet = packet.context("Failed to read packet file")?;
        let header = packet.header();
        println!(
            "{:>6} {:>12} {:>8} {:>6} {:>10} {:>10} {:>10} {:>10} {:>12}",
            index,
            offset,
            packet.event_type().name(),
            header.event_source(),
            header.event_capacity(),
            header.event_number(),
            header.event_valid(),
            header.event_ts_overflow(),
            packet.as_bytes().len()
        );

        offset += packet.as_bytes().len() as u64;
        count += 1;
    }

    eprintln!();
    eprintln!("{} packets, {} bytes", count, offset);
    Ok(())
}

fn dump(
    input: &Path,
    output: &Path,
    format: &str,
    imu9: Option<&Path>,
    all: bool,
    quiet: bool,
) -> Result<()> {
    let field_order =
        FieldOrder::from_str(format).context("Invalid field format. Use comma-separated: x,y,p,t")?;
    let selection = if all { Selection::All } else { Selection::Valid };

    let progress = spinner(quiet)?;
    let start_time = Instant::now();

    progress.set_message(format!(
        "Reading {:?}...",
        input.file_name().unwrap_or_default()
    ));
    let packets = read_file(input).context("Failed to read packet file")?;

    let has_polarity = packets
        .iter()
        .any(|p| matches!(p, AnyEventPacket::Polarity(_)));
    let has_imu9 = packets.iter().any(|p| matches!(p, AnyEventPacket::Imu9(_)));

    progress.set_message(format!(
        "Writing to {:?}...",
        output.file_name().unwrap_or_default()
    ));

    let mut polarity_rows = 0;
    let mut imu9_rows = 0;
    if has_polarity || !has_imu9 {
        polarity_rows = output::write_polarity_csv(output, &packets, field_order, selection)
            .context("Failed to write polarity CSV")?;
    }
    let imu9_path = match imu9 {
        Some(path) => Some(path),
        None if !has_polarity && has_imu9 => Some(output),
        None => None,
    };
    if let Some(path) = imu9_path {
        imu9_rows = output::write_imu9_csv(path, &packets, selection)
            .context("Failed to write IMU9 CSV")?;
    }

    let total_duration = start_time.elapsed();
    progress.finish_with_message(format!(
        "Done! Exported {} polarity and {} IMU9 events in {:.2}s",
        polarity_rows,
        imu9_rows,
        total_duration.as_secs_f64()
    ));

    if !quiet {
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:        {:?}", input);
        eprintln!("  Output:       {:?}", output);
        if let Some(path) = imu9 {
            eprintln!("  IMU9 output:  {:?}", path);
        }
        eprintln!("  Packets:      {}", packets.len());
        eprintln!("  Polarity:     {}", polarity_rows);
        eprintln!("  IMU9:         {}", imu9_rows);
        eprintln!("  Duration:     {:.3}s", total_duration.as_secs_f64());
    }

    Ok(())
}

fn synth(
    output: &Path,
    kind: Kind,
    packets: u32,
    capacity: i32,
    source: i16,
    quiet: bool,
) -> Result<()> {
    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(packets as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?,
        );
        pb
    };

    let file =
        File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    let mut writer = PacketWriter::new(file);

    // Each packet starts a new timestamp overflow epoch.
    for index in 0..packets {
        let ts_overflow = i32::try_from(index).context("Too many packets")?;
        let packet: AnyEventPacket = match kind {
            Kind::Polarity => synth_polarity(capacity, source, ts_overflow)?.into(),
            Kind::Imu9 => synth_imu9(capacity, source, ts_overflow)?.into(),
        };
        writer
            .write_packet(&packet)
            .context("Failed to write packet")?;
        progress.inc(1);
    }
    writer.flush().context("Failed to write packet")?;

    progress.finish_with_message(format!(
        "Done! Wrote {} bytes to {:?}",
        writer.bytes_written(),
        output.file_name().unwrap_or_default()
    ));
    Ok(())
}

fn synth_polarity(capacity: i32, source: i16, ts_overflow: i32) -> Result<PolarityPacket> {
    let mut packet = PolarityPacket::allocate(capacity, source, ts_overflow)
        .context("Failed to allocate polarity packet")?;
    for i in 0..capacity {
        if let Some(mut event) = packet.get_event_mut(i) {
            let (x, y) = synth_pixel(i);
            event.set_x(x);
            event.set_y(y);
            event.set_polarity(i % 2 == 0);
            event.set_timestamp(i.saturating_mul(10))?;
            event.validate()?;
        }
    }
    Ok(packet)
}

/// Pixel of the `i`-th synthetic polarity event on a 640x480 sensor.
fn synth_pixel(i: i32) -> (u16, u16) {
    let x = (i.rem_euclid(640) * 7) % 640;
    let y = (i.rem_euclid(480) * 3) % 480;
    (x as u16, y as u16)
}

fn synth_imu9(capacity: i32, source: i16, ts_overflow: i32) -> Result<Imu9Packet> {
    let mut packet = Imu9Packet::allocate(capacity, source, ts_overflow)
        .context("Failed to allocate IMU9 packet")?;
    for i in 0..capacity {
        let phase = i as f32 * 0.01;
        if let Some(mut event) = packet.get_event_mut(i) {
            event.set_sample(&Imu9Sample {
                accel: [phase.sin(), phase.cos(), -1.0],
                gyro: [0.5 * phase.cos(), 0.0, -0.5 * phase.sin()],
                temp: 25.0 + 0.1 * phase.sin(),
                comp: [0.2, 0.0, 0.4],
            });
            event.set_timestamp(i.saturating_mul(1000))?;
            event.validate()?;
        }
    }
    Ok(packet)
}

fn spinner(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    Ok(pb)
}
