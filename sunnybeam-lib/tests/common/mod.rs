//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use sunnybeam_lib::command::{Command, SeriesKind};
#[allow(unused_imports)]
pub use sunnybeam_lib::constants::FLAG;
#[allow(unused_imports)]
pub use sunnybeam_lib::frame::{self, DeviceId, Frame};
#[allow(unused_imports)]
pub use sunnybeam_lib::{SBError, Session, SessionConfig, SessionState, Transport};

use nusb::transfer::TransferError;
use sunnybeam_lib::crc::checksum_le;
use std::collections::VecDeque;

/// Bridge status bytes the USB side prepends to every read
#[allow(dead_code)]
pub const BRIDGE_HEADER: [u8; 2] = [0x01, 0x60];

/// Device ID handed out by the scripted device
#[allow(dead_code)]
pub const TEST_DEVICE_ID: [u8; 2] = [0x01, 0x02];

#[allow(dead_code)]
pub const TEST_SERIAL: u32 = 123_456_789;

/// Scripted transport: reads are served from a queue (empty once drained),
/// writes are recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub reads: VecDeque<Bytes>,
    pub write_results: VecDeque<usize>,
    pub writes: Vec<Vec<u8>>,
    pub read_calls: usize,
    pub feature_calls: usize,
    pub reject_feature: bool,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reads<I: IntoIterator<Item = Bytes>>(reads: I) -> Self {
        Self {
            reads: reads.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push_read(&mut self, chunk: Bytes) {
        self.reads.push_back(chunk);
    }

    /// Writes decoded back to unescaped frames.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.writes.iter().map(|w| frame::unescape(w)).collect()
    }
}

impl Transport for MockTransport {
    async fn set_feature(&mut self) -> Result<(), SBError> {
        self.feature_calls += 1;
        if self.reject_feature {
            return Err(SBError::Transfer(TransferError::Stall));
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, SBError> {
        self.writes.push(data.to_vec());
        Ok(self.write_results.pop_front().unwrap_or(data.len()))
    }

    async fn read(&mut self, _max_len: usize) -> Result<Bytes, SBError> {
        self.read_calls += 1;
        Ok(self.reads.pop_front().unwrap_or_default())
    }
}

/// Unescaped device frame: flag, body, checksum LE, flag.
#[allow(dead_code)]
pub fn device_frame(body: &[u8]) -> Vec<u8> {
    let mut out = vec![FLAG];
    out.extend_from_slice(body);
    out.extend_from_slice(&checksum_le(body));
    out.push(FLAG);
    out
}

/// Frame of `total_len` bytes with `fields` written at frame offsets.
#[allow(dead_code)]
pub fn frame_with(total_len: usize, fields: &[(usize, &[u8])]) -> Vec<u8> {
    let mut body = vec![0u8; total_len - 4];
    body[..4].copy_from_slice(&[0xFF, 0x03, 0x40, 0x41]);
    for (offset, field) in fields {
        body[offset - 1..offset - 1 + field.len()].copy_from_slice(field);
    }
    device_frame(&body)
}

/// One combined-read chunk: 12-byte header announcing `remaining`, payload.
#[allow(dead_code)]
pub fn chunk_frame(remaining: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0xFF, 0x03, 0x40, 0x41, 0x00, 0x00, 0x01, 0x02, 0x10, remaining, 0x0B];
    body.extend_from_slice(payload);
    device_frame(&body)
}

/// What the bulk IN endpoint returns for `frame`: bridge header plus the
/// escaped frame.
#[allow(dead_code)]
pub fn wire_chunk(frame: &[u8]) -> Bytes {
    let mut out = BRIDGE_HEADER.to_vec();
    out.push(FLAG);
    out.extend_from_slice(&frame::escape(&frame[1..frame.len() - 1]));
    out.push(FLAG);
    Bytes::from(out)
}

/// Discovery response carrying `id` at offset 5.
#[allow(dead_code)]
pub fn discovery_response_for(id: [u8; 2]) -> Bytes {
    wire_chunk(&frame_with(16, &[(5, &id)]))
}

#[allow(dead_code)]
pub fn discovery_response() -> Bytes {
    discovery_response_for(TEST_DEVICE_ID)
}

/// Syn-online acknowledgment.
#[allow(dead_code)]
pub fn syn_ack() -> Bytes {
    wire_chunk(&frame_with(16, &[(9, &[0x80])]))
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows frames.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Session over `transport` with pacing disabled.
#[allow(dead_code)]
pub fn session(transport: MockTransport) -> Session<MockTransport> {
    init_logging();
    Session::new(transport, SessionConfig::without_delays())
}

/// Session that has completed the handshake; `then` is queued behind the
/// discovery response.
#[allow(dead_code)]
pub async fn ready_session<I: IntoIterator<Item = Bytes>>(then: I) -> Session<MockTransport> {
    let mut transport = MockTransport::with_reads([discovery_response()]);
    transport.reads.extend(then);
    let mut session = session(transport);
    let id = session.connect(TEST_SERIAL).await.expect("handshake should succeed");
    assert_eq!(id, DeviceId(TEST_DEVICE_ID));
    session
}
