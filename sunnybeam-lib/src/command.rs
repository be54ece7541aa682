//! Command templates as captured from the vendor software.
//!
//! Each template is a complete wire frame with a 2-byte checksum slot before
//! the closing flag. Fields are stamped into fixed offsets; the checksum is
//! filled in by [`Frame::encode`].

use crate::constants::{LINE_COUNT_OFFSET, SERIAL_BIAS, SERIAL_OFFSET};
use crate::error::SBError;
use crate::frame::{DeviceId, Frame};
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

/// Vendor control request issued once after claiming the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

/// Feature activation: host-to-device, vendor, recipient device.
pub const FEATURE_REQUEST: ControlRequest = ControlRequest {
    request_type: 0x40,
    request: 0x03,
    value: 0x4138,
    index: 0x0000,
};

#[rustfmt::skip]
pub const SYN_ONLINE: &[u8] = &[
    0x7e, 0xff, 0x03, 0x40, 0x41, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x0a,
    0x00, 0x00, 0x00, 0x00, 0x2d, 0x2e, 0x7e,
];

#[rustfmt::skip]
pub const SEARCH_DEVICE_ID: &[u8] = &[
    0x7e, 0xff, 0x03, 0x40, 0x41, 0x00, 0x00, 0x00, 0x00, 0x90, 0x00, 0x02,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7e,
];

#[rustfmt::skip]
pub const GET_LIVE_DATA: &[u8] = &[
    0x7e, 0xff, 0x03, 0x40, 0x41, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x0b,
    0x0f, 0x09, 0x00, 0x00, 0x00, 0x7e,
];

#[rustfmt::skip]
pub const NEXT_CHUNK: &[u8] = &[
    0x7e, 0xff, 0x03, 0x40, 0x41, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x0b,
    0x00, 0x00, 0x7e,
];

#[rustfmt::skip]
pub const GET_TODAY_SERIES: &[u8] = &[
    0x7e, 0xff, 0x03, 0x40, 0x41, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x0b,
    0x04, 0x19, 0x01, 0xd1, 0x4c, 0x20, 0x4a, 0xff, 0xff, 0xff, 0x7f,
    0x00, 0x00, 0x7e,
];

// 0x7d 0x31 is an escaped 0x11 and goes out as captured
#[rustfmt::skip]
pub const GET_LAST_MONTH_SERIES: &[u8] = &[
    0x7e, 0xff, 0x03, 0x40, 0x41, 0x00, 0x00, 0xd4, 0xf5, 0x10, 0x00, 0x0b,
    0x04, 0x7d, 0x31, 0x02, 0x7f, 0x25, 0x1f, 0x4a, 0xff, 0xff, 0xff, 0x7f,
    0x00, 0x00, 0x7e,
];

/// Message class byte at offset 9 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum MessageClass {
    Data = 0x10,
    SynOnline = 0x80,
    SearchDeviceId = 0x90,

    #[num_enum(catch_all)]
    Unknown(u8),
}

pub const MESSAGE_CLASS_OFFSET: usize = 9;

impl MessageClass {
    /// Class of an unescaped frame, if it is long enough to carry one.
    pub fn of(frame: &[u8]) -> Option<Self> {
        frame.get(MESSAGE_CLASS_OFFSET).copied().map(Self::from_primitive)
    }
}

/// Historical series the device can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeriesKind {
    #[strum(to_string = "today")]
    Today,
    #[strum(to_string = "last month")]
    LastMonth,
}

impl SeriesKind {
    pub fn command(self) -> Command {
        match self {
            SeriesKind::Today => Command::TodaySeries,
            SeriesKind::LastMonth => Command::LastMonthSeries,
        }
    }
}

/// Every request the host sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SynOnline,
    SearchDeviceId { serial: u32 },
    LiveData,
    NextChunk { remaining: u8 },
    TodaySeries,
    LastMonthSeries,
}

impl Command {
    pub fn template(&self) -> &'static [u8] {
        match self {
            Command::SynOnline => SYN_ONLINE,
            Command::SearchDeviceId { .. } => SEARCH_DEVICE_ID,
            Command::LiveData => GET_LIVE_DATA,
            Command::NextChunk { .. } => NEXT_CHUNK,
            Command::TodaySeries => GET_TODAY_SERIES,
            Command::LastMonthSeries => GET_LAST_MONTH_SERIES,
        }
    }

    /// Whether the session's device ID is stamped into this command.
    pub fn carries_device_id(&self) -> bool {
        !matches!(self, Command::SynOnline | Command::SearchDeviceId { .. })
    }

    /// Build the frame for this command. `device_id` is required for
    /// commands that carry it and ignored otherwise.
    pub fn frame(&self, device_id: Option<DeviceId>) -> Result<Frame, SBError> {
        let mut frame = Frame::from_template(self.template())?;

        // Fields are stamped from the highest offset down
        match *self {
            Command::SearchDeviceId { serial } => {
                frame = frame.stamp(SERIAL_OFFSET, &discovery_serial(serial)?)?;
            }
            Command::NextChunk { remaining } => {
                frame = frame.stamp(LINE_COUNT_OFFSET, &[remaining])?;
            }
            _ => {}
        }

        if self.carries_device_id() {
            let id = device_id.ok_or(SBError::DeviceUnavailable)?;
            frame = frame.with_device_id(id)?;
        }
        Ok(frame)
    }
}

/// Serial number as the discovery request expects it: biased, 4 bytes LE.
pub fn discovery_serial(serial: u32) -> Result<[u8; 4], SBError> {
    serial
        .checked_add(SERIAL_BIAS)
        .map(u32::to_le_bytes)
        .ok_or_else(|| SBError::InvalidSerial(format!("{} is out of range", serial)))
}
