//! Offline decoder for captured Sunny Beam traffic.
//!
//! Reads one bulk transfer per line as hex, prefixed with `>` for host to
//! device or `<` for device to host:
//!
//! ```text
//! > 7eff0340410000010210000b0f09002ae87e
//! < 01607eff034041...
//! ```
//!
//! Device-to-host transfers are fed through the same assembler the session
//! uses, so a frame split over several lines is printed once complete.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sunnybeam_lib::assembler::MessageAssembler;
use sunnybeam_lib::command::MessageClass;
use sunnybeam_lib::constants::{DISCOVERED_ID_OFFSET, LINE_COUNT_OFFSET};
use sunnybeam_lib::frame::{self, DeviceId};
use sunnybeam_lib::InstantMeasurement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Out,
    In,
}

/// Decode Sunny Beam frames from a hex capture.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Capture file; stdin when omitted.
    input: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn parse_line(line: &str) -> Result<Option<(Direction, Vec<u8>)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (direction, rest) = if let Some(rest) = line.strip_prefix('>') {
        (Direction::Out, rest)
    } else if let Some(rest) = line.strip_prefix('<') {
        (Direction::In, rest)
    } else {
        bail!("expected '>' or '<' at start of line: {}", line);
    };
    let hex_str: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&hex_str).with_context(|| format!("invalid hex: {}", hex_str))?;
    Ok(Some((direction, bytes)))
}

fn describe(direction: Direction, frame: &[u8]) {
    let class = MessageClass::of(frame);
    let crc = match frame::checksum_fields(frame) {
        Some((received, computed)) if received == computed => "ok".to_string(),
        Some((received, computed)) => format!("BAD {:#06x} != {:#06x}", received, computed),
        None => "n/a".to_string(),
    };

    let arrow = if direction == Direction::Out { "->" } else { "<-" };
    println!("{} {:?} len={} crc={}", arrow, class, frame.len(), crc);
    debug!(bytes = hex::encode(frame), "unescaped");

    match (direction, class) {
        (Direction::Out, Some(MessageClass::Data)) if frame.len() > LINE_COUNT_OFFSET => {
            println!("   device_id={} line={}", DeviceId([frame[7], frame[8]]), frame[LINE_COUNT_OFFSET]);
        }
        (Direction::In, Some(MessageClass::SearchDeviceId)) if frame.len() > DISCOVERED_ID_OFFSET + 1 => {
            let id = DeviceId([frame[DISCOVERED_ID_OFFSET], frame[DISCOVERED_ID_OFFSET + 1]]);
            println!("   discovered device_id={}", id);
        }
        (Direction::In, Some(MessageClass::Data)) => {
            if let Some(remaining) = frame.get(LINE_COUNT_OFFSET) {
                println!("   remaining={}", remaining);
            }
            if let Ok(measurement) = InstantMeasurement::from_frame(frame) {
                println!("   as live data: {}", measurement);
            }
        }
        _ => {}
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(cli.verbose.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).without_time())
        .init();

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open capture: {:?}", path))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut assembler = MessageAssembler::new();
    let mut frames = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let (direction, bytes) = match parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                warn!("line {}: {:#}", line_no + 1, e);
                continue;
            }
        };

        match direction {
            Direction::Out => {
                describe(direction, &frame::unescape(&bytes));
                frames += 1;
            }
            Direction::In => {
                if assembler.push_chunk(&bytes) {
                    let frame = std::mem::take(&mut assembler).finish();
                    describe(direction, &frame);
                    frames += 1;
                }
            }
        }
    }

    if !assembler.is_empty() {
        warn!("Capture ends inside an incomplete frame");
    }
    info!("{} frames decoded", frames);
    Ok(())
}
