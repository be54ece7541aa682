//! Frame assembly over a scripted transport

mod common;

use common::*;
use sunnybeam_lib::link::Link;

fn link(transport: MockTransport) -> Link<MockTransport> {
    Link::new(transport, SessionConfig::without_delays())
}

#[tokio::test]
async fn test_read_frame_single_chunk() {
    let frame = frame_with(20, &[(5, &[0x01, 0x02])]);
    let mut link = link(MockTransport::with_reads([wire_chunk(&frame)]));

    let received = link.read_frame(5).await.unwrap();
    assert_eq!(received.as_ref(), frame.as_slice());
    assert_eq!(link.transport().read_calls, 1);
}

#[tokio::test]
async fn test_read_frame_spanning_reads() {
    let frame = frame_with(24, &[(5, &[0x7E, 0x7D])]);
    let wire = wire_chunk(&frame);

    // Split right after the escape marker of the first escaped byte
    let marker = wire.iter().skip(3).position(|&b| b == 0x7D).unwrap() + 3;
    let first = wire.slice(..=marker);
    let mut second = BRIDGE_HEADER.to_vec();
    second.extend_from_slice(&wire[marker + 1..]);

    let mut link = link(MockTransport::with_reads([
        Bytes::from_static(&BRIDGE_HEADER),
        first,
        Bytes::from(second),
    ]));

    let received = link.read_frame(10).await.unwrap();
    assert_eq!(received.as_ref(), frame.as_slice());
    assert_eq!(link.transport().read_calls, 3);
}

#[tokio::test]
async fn test_read_frame_drops_idle_artifact_and_stops_at_end_flag() {
    let frame = frame_with(16, &[(5, &[0xAA, 0xBB])]);
    let mut raw = BRIDGE_HEADER.to_vec();
    raw.push(FLAG);
    let escaped = frame::escape(&frame[1..frame.len() - 1]);
    // Artifact injected after the first five escaped bytes
    raw.extend_from_slice(&escaped[..5]);
    raw.extend_from_slice(&[0x01, 0x60]);
    raw.extend_from_slice(&escaped[5..]);
    raw.push(FLAG);
    raw.extend_from_slice(&[0x33, 0x44, FLAG]);

    let mut link = link(MockTransport::with_reads([Bytes::from(raw)]));
    let received = link.read_frame(5).await.unwrap();
    assert_eq!(received.as_ref(), frame.as_slice());
}

#[tokio::test]
async fn test_read_frame_times_out_empty() {
    let mut link = link(MockTransport::new());
    let received = link.read_frame(7).await.unwrap();
    assert!(received.is_empty());
    assert_eq!(link.transport().read_calls, 7);
}

#[tokio::test]
async fn test_read_frame_returns_partial_frame() {
    let mut link = link(MockTransport::with_reads([Bytes::from_static(&[
        0x01, 0x60, 0x7E, 0xFF, 0x03,
    ])]));
    let received = link.read_frame(3).await.unwrap();
    assert_eq!(received.as_ref(), &[0x7E, 0xFF, 0x03]);
    assert_eq!(link.transport().read_calls, 3);
}

fn corrupted_frame() -> Vec<u8> {
    let mut frame = frame_with(16, &[(5, &[0x01, 0x02])]);
    frame[8] ^= 0xFF;
    frame
}

#[tokio::test]
async fn test_bad_checksum_is_tolerated_by_default() {
    let frame = corrupted_frame();
    let mut link = link(MockTransport::with_reads([wire_chunk(&frame)]));
    let received = link.read_frame(5).await.unwrap();
    assert_eq!(received.as_ref(), frame.as_slice());
}

#[tokio::test]
async fn test_bad_checksum_rejected_when_strict() {
    let frame = corrupted_frame();
    let config = SessionConfig::without_delays().with_strict_crc(true);
    let mut link = Link::new(MockTransport::with_reads([wire_chunk(&frame)]), config);

    let result = link.read_frame(5).await;
    assert!(matches!(result, Err(SBError::ChecksumMismatch { .. })));
}

#[tokio::test]
async fn test_send_encodes_frame() {
    let mut link = link(MockTransport::new());
    let frame = Command::SynOnline.frame(None).unwrap();

    let written = link.send(&frame).await.unwrap();
    assert_eq!(written, frame.encode().len());
    assert_eq!(link.transport().writes, vec![frame.encode().to_vec()]);
}

#[tokio::test]
async fn test_send_zero_written_fails() {
    let mut transport = MockTransport::new();
    transport.write_results.push_back(0);
    let mut link = link(transport);

    let frame = Command::SynOnline.frame(None).unwrap();
    assert!(matches!(link.send(&frame).await, Err(SBError::TransportWriteFailed)));
}
