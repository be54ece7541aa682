//! Byte-stuffed, checksummed frames.
//!
//! On the wire every frame looks like
//!
//! ```text
//! 0x7E  <body, escaped>  <CRC-16/X-25 LE, escaped>  0x7E
//! ```
//!
//! Inside the checksum-protected region a literal `0x7E` or `0x7D` is sent as
//! `0x7D, byte ^ 0x20`. The checksum is computed over the unescaped body.

use crate::constants::{DEVICE_ID_OFFSET, ESCAPE, ESCAPE_XOR, FLAG, FRAME_TRAILER_LEN, MIN_FRAME_LEN};
use crate::crc;
use crate::error::SBError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Escape-parsing state, carried across chunk boundaries by the assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscapeState {
    #[default]
    Normal,
    PendingEscape,
}

impl EscapeState {
    /// Feed one byte. Returns the decoded byte, or `None` if the byte was an
    /// escape marker that only changes the state.
    #[inline]
    pub fn feed(&mut self, byte: u8) -> Option<u8> {
        match (*self, byte) {
            (EscapeState::Normal, ESCAPE) => {
                *self = EscapeState::PendingEscape;
                None
            }
            (EscapeState::Normal, b) => Some(b),
            // 0x5E -> 0x7E and 0x5D -> 0x7D fall out of the XOR
            (EscapeState::PendingEscape, b) => {
                *self = EscapeState::Normal;
                Some(b ^ ESCAPE_XOR)
            }
        }
    }
}

#[inline]
fn needs_escape(byte: u8) -> bool {
    byte == FLAG || byte == ESCAPE
}

/// Append the escaped form of `data` to `buf`.
pub fn escape_into(data: &[u8], buf: &mut BytesMut) {
    for &b in data {
        if needs_escape(b) {
            buf.put_u8(ESCAPE);
            buf.put_u8(b ^ ESCAPE_XOR);
        } else {
            buf.put_u8(b);
        }
    }
}

/// Escape every `0x7E`/`0x7D` in `data`.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(data.len() * 2);
    escape_into(data, &mut buf);
    buf.to_vec()
}

/// Undo [`escape`]. Must be applied exactly once to a given byte sequence.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut state = EscapeState::Normal;
    data.iter().filter_map(|&b| state.feed(b)).collect()
}

/// Received and computed checksum of an unescaped frame, if it is long
/// enough to carry one.
pub fn checksum_fields(frame: &[u8]) -> Option<(u16, u16)> {
    if frame.len() < MIN_FRAME_LEN {
        return None;
    }
    let crc_at = frame.len() - FRAME_TRAILER_LEN;
    let computed = crc::checksum(&frame[1..crc_at]);
    let received = u16::from_le_bytes([frame[crc_at], frame[crc_at + 1]]);
    Some((received, computed))
}

/// Check the trailing checksum of an unescaped frame (flags included).
pub fn verify_checksum(frame: &[u8]) -> bool {
    matches!(checksum_fields(frame), Some((received, computed)) if received == computed)
}

/// A command frame in wire form: leading flag, escaped body, 2-byte checksum
/// slot and trailing flag.
///
/// Frames are immutable; [`Frame::stamp`] returns a new frame with a field
/// overwritten, so templates can live in `const` slices.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    wire: Bytes,
}

impl Frame {
    /// Wrap a literal template. The template must start and end with the flag,
    /// contain no other flag byte and leave room for the checksum slot.
    pub fn from_template(template: &[u8]) -> Result<Self, SBError> {
        if template.len() < MIN_FRAME_LEN {
            return Err(SBError::InvalidFrame(format!(
                "template too short: {} bytes",
                template.len()
            )));
        }
        if template[0] != FLAG || template[template.len() - 1] != FLAG {
            return Err(SBError::InvalidFrame("template must be delimited by 0x7E".to_string()));
        }
        if template[1..template.len() - 1].contains(&FLAG) {
            return Err(SBError::InvalidFrame("unescaped flag inside template".to_string()));
        }
        Ok(Self {
            wire: Bytes::copy_from_slice(template),
        })
    }

    /// Return a new frame with `field` written over the template bytes at
    /// `offset`. Bytes of `field` that need it are escaped, which may grow the
    /// frame; stamp fields at higher offsets first.
    ///
    /// `offset` indexes the wire bytes. It only matches the unescaped offset
    /// while no escape pair precedes or overlaps the field, so any escape
    /// marker in `..offset + field.len()` is rejected.
    pub fn stamp(&self, offset: usize, field: &[u8]) -> Result<Self, SBError> {
        let crc_at = self.crc_offset();
        let end = offset + field.len();
        if offset == 0 || end > crc_at {
            return Err(SBError::InvalidFrame(format!(
                "field {}..{} outside body 1..{}",
                offset, end, crc_at
            )));
        }
        if let Some(pos) = self.wire[..end].iter().position(|&b| b == ESCAPE) {
            return Err(SBError::InvalidFrame(format!(
                "field {}..{} at or after escape marker at {}",
                offset, end, pos
            )));
        }

        let mut wire = BytesMut::with_capacity(self.wire.len() + field.len());
        wire.extend_from_slice(&self.wire[..offset]);
        escape_into(field, &mut wire);
        wire.extend_from_slice(&self.wire[end..]);
        Ok(Self { wire: wire.freeze() })
    }

    /// Stamp the session's device ID at its fixed header offset.
    pub fn with_device_id(&self, id: DeviceId) -> Result<Self, SBError> {
        self.stamp(DEVICE_ID_OFFSET, id.as_bytes())
    }

    fn crc_offset(&self) -> usize {
        self.wire.len() - FRAME_TRAILER_LEN
    }

    /// Escaped body, between the opening flag and the checksum slot.
    pub fn body(&self) -> &[u8] {
        &self.wire[1..self.crc_offset()]
    }

    /// Checksum of the unescaped body.
    pub fn checksum(&self) -> u16 {
        crc::checksum(&unescape(self.body()))
    }

    /// Wire bytes with the checksum filled in and escaped byte by byte, so the
    /// checksum may occupy 2 to 4 bytes.
    pub fn encode(&self) -> Bytes {
        let crc_at = self.crc_offset();
        let mut out = BytesMut::with_capacity(self.wire.len() + 2);
        out.extend_from_slice(&self.wire[..crc_at]);
        escape_into(&self.checksum().to_le_bytes(), &mut out);
        out.put_u8(FLAG);
        out.freeze()
    }

    /// The template bytes as stored, checksum slot not yet filled.
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Frame").field(&hex::encode(&self.wire)).finish()
    }
}

/// Two-byte identifier the device hands out during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub [u8; 2]);

impl DeviceId {
    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }
}

impl From<[u8; 2]> for DeviceId {
    fn from(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DeviceId {
    // The device reports its ID high byte first
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}", self.0[1], self.0[0])
    }
}
