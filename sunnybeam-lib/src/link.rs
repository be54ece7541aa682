use crate::assembler::MessageAssembler;
use crate::command::MessageClass;
use crate::config::SessionConfig;
use crate::error::SBError;
use crate::frame::{Frame, checksum_fields};
use crate::transport::Transport;
use bytes::Bytes;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

/// Frame-level send/receive on top of a [`Transport`], paced the way the
/// device firmware expects.
pub struct Link<T> {
    transport: T,
    config: SessionConfig,
}

impl<T: Transport> Link<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Encode and write one frame. Zero bytes written is a failed send.
    pub async fn send(&mut self, frame: &Frame) -> Result<usize, SBError> {
        let wire = frame.encode();
        debug!(bytes = hex::encode(&wire), "USB Write");

        sleep(self.config.send_delay).await;

        let written = self.transport.write(&wire).await?;
        if written == 0 {
            return Err(SBError::TransportWriteFailed);
        }
        Ok(written)
    }

    /// Read until one complete frame has been assembled or `max_attempts`
    /// reads have been made. Returns the unescaped frame, flags and checksum
    /// included, or whatever was accumulated (possibly nothing).
    pub async fn read_frame(&mut self, max_attempts: u32) -> Result<Bytes, SBError> {
        let mut assembler = MessageAssembler::new();

        sleep(self.config.read_settle_delay).await;

        for attempt in 0..max_attempts {
            sleep(self.config.attempt_delay).await;

            let chunk = self.transport.read(self.config.read_buffer_size).await?;
            trace!(attempt, bytes = hex::encode(&chunk), "USB Read");

            if assembler.push_chunk(&chunk) {
                break;
            }
        }

        if !assembler.is_complete() && !assembler.is_empty() {
            debug!(max_attempts, "Frame incomplete after all read attempts");
        }

        let frame = assembler.finish();
        debug!(
            bytes = hex::encode(&frame),
            class = ?MessageClass::of(&frame),
            "Frame received"
        );

        if let Some((received, computed)) = checksum_fields(&frame) {
            if received != computed {
                warn!(
                    "Bad checksum {:#06x}, should be {:#06x}. Frame should be rejected.",
                    received, computed
                );
                if self.config.strict_crc {
                    return Err(SBError::ChecksumMismatch { received, computed });
                }
            }
        }

        Ok(frame)
    }
}
