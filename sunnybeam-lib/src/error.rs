use nusb::transfer::TransferError;
use thiserror::Error;

/// The primary error type for the `sunnybeam-lib` library.
#[derive(Error, Debug)]
pub enum SBError {
    #[error("USB device not found. Is the Sunny Beam connected?")]
    DeviceNotFound,

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Timeout during USB operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    /// Feature activation or device-ID discovery failed earlier in the session.
    #[error("Sunny Beam not available")]
    DeviceUnavailable,

    #[error("Transport write failed: no bytes written")]
    TransportWriteFailed,

    #[error("No complete frame received within {attempts} read attempts")]
    FrameTimeout { attempts: u32 },

    #[error("Checksum mismatch: received {received:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { received: u16, computed: u16 },

    #[error("Malformed payload: expected at least {expected} bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid serial number: {0}")]
    InvalidSerial(String),
}

impl SBError {
    /// Errors a polling caller can shrug off and retry on the next round.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SBError::FrameTimeout { .. } | SBError::ChecksumMismatch { .. } | SBError::Timeout(_)
        )
    }
}
