use crate::command::Command;
use crate::constants::{CHUNK_HEADER_LEN, FRAME_TRAILER_LEN, LINE_COUNT_OFFSET, UNKNOWN_REMAINING};
use crate::error::SBError;
use crate::frame::DeviceId;
use crate::link::Link;
use crate::transport::Transport;
use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

/// Progress of a multi-chunk response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationState {
    /// Chunks the device says are still pending; `0xFF` until it has said so.
    pub remaining_chunks: u8,
    pub attempts_left: u32,
}

impl ContinuationState {
    pub fn new(budget: u32) -> Self {
        Self {
            remaining_chunks: UNKNOWN_REMAINING,
            attempts_left: budget,
        }
    }

    pub fn is_first(&self) -> bool {
        self.remaining_chunks == UNKNOWN_REMAINING
    }

    pub fn is_done(&self) -> bool {
        self.remaining_chunks == 0
    }

    /// Spend one iteration. Returns `false` once the budget is exhausted.
    pub fn take_attempt(&mut self) -> bool {
        self.attempts_left = self.attempts_left.saturating_sub(1);
        self.attempts_left > 0
    }
}

/// Retrieves a response too large for one frame by asking for the next chunk
/// until the device reports that none remain.
pub struct ContinuationReader<'a, T> {
    link: &'a mut Link<T>,
    device_id: DeviceId,
}

impl<'a, T: Transport> ContinuationReader<'a, T> {
    pub fn new(link: &'a mut Link<T>, device_id: DeviceId) -> Self {
        Self { link, device_id }
    }

    /// Send `initial` with the device ID and concatenate the payload of every
    /// chunk that follows. A read that yields nothing ends the exchange with
    /// what has been collected so far.
    pub async fn read_combined(&mut self, initial: Command) -> Result<Bytes, SBError> {
        self.link.send(&initial.frame(Some(self.device_id))?).await?;

        let chunk_attempts = self.link.config().chunk_attempts;
        let mut state = ContinuationState::new(self.link.config().continuation_budget);
        let mut out = BytesMut::new();

        while !state.is_done() {
            if !state.take_attempt() {
                warn!(
                    remaining = state.remaining_chunks,
                    "Combined read budget exhausted, returning partial data"
                );
                break;
            }

            if !state.is_first() {
                let next = Command::NextChunk {
                    remaining: state.remaining_chunks,
                }
                .frame(Some(self.device_id))?;
                self.link.send(&next).await?;
            }

            let frame = self.link.read_frame(chunk_attempts).await?;
            if frame.is_empty() {
                debug!(collected = out.len(), "No chunk received, ending combined read");
                return Ok(out.freeze());
            }

            if let Some(payload) = frame.get(CHUNK_HEADER_LEN..frame.len().saturating_sub(FRAME_TRAILER_LEN)) {
                out.extend_from_slice(payload);
            }

            match frame.get(LINE_COUNT_OFFSET) {
                Some(&remaining) => state.remaining_chunks = remaining,
                None => {
                    warn!(len = frame.len(), "Chunk too short to carry a line count");
                    break;
                }
            }
        }

        debug!(bytes = hex::encode(&out), "Read multiple frames");
        Ok(out.freeze())
    }
}
