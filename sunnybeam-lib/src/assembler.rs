use crate::constants::{FLAG, IDLE_ARTIFACT, TRANSPORT_HEADER_LEN};
use crate::frame::EscapeState;
use bytes::{Bytes, BytesMut};

/// Recovers one unescaped frame from a sequence of raw bulk IN chunks.
///
/// A logical frame may span several physical reads, so the escape state and
/// the start-of-frame flag persist between calls to [`push_chunk`].
///
/// [`push_chunk`]: MessageAssembler::push_chunk
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buf: BytesMut,
    escape: EscapeState,
    started: bool,
    complete: bool,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one raw chunk, header included. Returns `true` once the
    /// closing flag has been seen; later chunks are ignored.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> bool {
        if self.complete || chunk.len() <= TRANSPORT_HEADER_LEN {
            return self.complete;
        }

        for p in TRANSPORT_HEADER_LEN..chunk.len() {
            let byte = chunk[p];

            if byte == FLAG {
                self.escape = EscapeState::Normal;
                self.buf.extend_from_slice(&[FLAG]);
                if self.started {
                    self.complete = true;
                    break;
                }
                self.started = true;
                continue;
            }

            if !self.started {
                continue;
            }

            // The bridge repeats its status bytes inside long transfers
            if byte == IDLE_ARTIFACT[1] && chunk[p - 1] == IDLE_ARTIFACT[0] {
                if self.buf.len() > 1 {
                    self.buf.truncate(self.buf.len() - 1);
                }
                continue;
            }

            if let Some(decoded) = self.escape.feed(byte) {
                self.buf.extend_from_slice(&[decoded]);
            }
        }

        self.complete
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes accumulated so far, complete or not.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
