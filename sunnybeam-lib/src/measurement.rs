use crate::constants::{LIVE_DATA_OFFSET, LIVE_DATA_SIZE, SERIES_OFFSET, SERIES_RECORD_SIZE};
use crate::error::SBError;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, warn};
use zerocopy::byteorder::little_endian::{F32, I32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Live-data block of the live-data response, at frame offset 25.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LiveDataRaw {
    pub power_w: F32,
    pub energy_today_kwh: F32,
    pub energy_total_kwh: F32,
}

/// One 12-byte record of a series payload.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SeriesRecordRaw {
    pub timestamp: I32, // Unix seconds
    pub reserved: [u8; 4],
    pub value: F32,
}

/// Current inverter output as reported by the Sunny Beam.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstantMeasurement {
    pub power_w: i32,
    pub energy_today_kwh: f64,
    pub energy_total_kwh: f64,
}

fn round_to(value: f32, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value as f64 * scale).round() / scale
}

impl From<LiveDataRaw> for InstantMeasurement {
    fn from(raw: LiveDataRaw) -> Self {
        InstantMeasurement {
            // Saturating cast, truncates toward zero
            power_w: raw.power_w.get() as i32,
            energy_today_kwh: round_to(raw.energy_today_kwh.get(), 3),
            energy_total_kwh: round_to(raw.energy_total_kwh.get(), 3),
        }
    }
}

impl InstantMeasurement {
    /// Decode the unescaped live-data response frame.
    pub fn from_frame(frame: &[u8]) -> Result<Self, SBError> {
        let block = frame
            .get(LIVE_DATA_OFFSET..LIVE_DATA_OFFSET + LIVE_DATA_SIZE)
            .ok_or(SBError::MalformedPayload {
                expected: LIVE_DATA_OFFSET + LIVE_DATA_SIZE,
                actual: frame.len(),
            })?;
        let raw = LiveDataRaw::read_from_bytes(block).map_err(|_| SBError::MalformedPayload {
            expected: LIVE_DATA_SIZE,
            actual: block.len(),
        })?;
        Ok(Self::from(raw))
    }
}

impl fmt::Display for InstantMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pac: {} W, E-Today: {:.3} kWh, E-Total: {:.3} kWh",
            self.power_w, self.energy_today_kwh, self.energy_total_kwh
        )
    }
}

/// One point of a historical series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MeasurementRecord {
    fn from_raw(raw: &SeriesRecordRaw) -> Option<Self> {
        let timestamp = DateTime::from_timestamp(raw.timestamp.get() as i64, 0)?;
        Some(Self {
            timestamp,
            value: (raw.value.get() as f64).round_ties_even(),
        })
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.value)
    }
}

/// Decode a reassembled series payload into records, oldest first.
///
/// Records start at offset 5 and are 12 bytes each; a short trailing record
/// is ignored. The device sends the newest record first.
pub fn decode_series(payload: &[u8]) -> Vec<MeasurementRecord> {
    let Some(records) = payload.get(SERIES_OFFSET..) else {
        return Vec::new();
    };

    let mut out: Vec<MeasurementRecord> = records
        .chunks_exact(SERIES_RECORD_SIZE)
        .filter_map(|chunk| {
            debug!(record = hex::encode(chunk), "Series record");
            let raw = SeriesRecordRaw::ref_from_bytes(chunk).ok()?;
            let record = MeasurementRecord::from_raw(raw);
            if record.is_none() {
                warn!(timestamp = raw.timestamp.get(), "Skipping record with unrepresentable timestamp");
            }
            record
        })
        .collect();

    out.reverse();
    out
}
