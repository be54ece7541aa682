//! Escaping, checksum and device-ID stamping seen from outside the crate

mod common;

use common::*;

#[test]
fn test_escape_round_trip_with_special_bytes() {
    let every_byte: Vec<u8> = (0..=255u8).collect();
    let flags_only = vec![0x7E; 16];
    let markers_only = vec![0x7D; 16];
    let mixed: Vec<u8> = [0x7E, 0x7D, 0x5E, 0x5D, 0x20].repeat(8);

    for seq in [every_byte, flags_only, markers_only, mixed] {
        let escaped = frame::escape(&seq);
        assert!(!escaped.contains(&FLAG), "no bare flag may survive escaping");
        assert_eq!(frame::unescape(&escaped), seq);
    }
}

#[test]
fn test_escaped_length_counts_special_bytes() {
    let seq = [0x00, 0x7E, 0x11, 0x7D, 0xFF];
    assert_eq!(frame::escape(&seq).len(), seq.len() + 2);
}

#[test]
fn test_device_id_substitution_in_every_data_command() {
    let ids = [[0x01, 0x02], [0xd4, 0xf5], [0x7E, 0x7D], [0x00, 0x7E]];
    let commands = [
        Command::LiveData,
        Command::TodaySeries,
        Command::LastMonthSeries,
        Command::NextChunk { remaining: 4 },
    ];

    for id in ids {
        for command in commands {
            let wire = command.frame(Some(DeviceId(id))).unwrap().encode();
            assert_eq!(wire.first(), Some(&FLAG));
            assert_eq!(wire.last(), Some(&FLAG));
            assert!(!wire[1..wire.len() - 1].contains(&FLAG), "{:?}: bare flag inside frame", command);

            let unescaped = frame::unescape(&wire);
            assert_eq!(&unescaped[7..9], &id, "{:?}: device ID not at [7:9]", command);
            assert!(frame::verify_checksum(&unescaped), "{:?}: checksum does not verify", command);
        }
    }
}

#[test]
fn test_line_count_survives_device_id_stamping() {
    // An escaped device ID shifts the line count on the wire, not logically
    let wire = Command::NextChunk { remaining: 0x7D }
        .frame(Some(DeviceId([0x7D, 0x7E])))
        .unwrap()
        .encode();
    let unescaped = frame::unescape(&wire);
    assert_eq!(unescaped[10], 0x7D);
    assert_eq!(unescaped[11], 0x0B);
}

#[test]
fn test_keepalive_and_discovery_ignore_device_id() {
    let with_id = Command::SynOnline.frame(Some(DeviceId([0xAA, 0xBB]))).unwrap();
    let without_id = Command::SynOnline.frame(None).unwrap();
    assert_eq!(with_id, without_id);

    let discovery = Command::SearchDeviceId { serial: 0 }.frame(None).unwrap().encode();
    let unescaped = frame::unescape(&discovery);
    assert_eq!(&unescaped[7..9], &[0x00, 0x00]);
    assert_eq!(&unescaped[12..16], &140_000_000u32.to_le_bytes());
}

#[test]
fn test_checksum_of_received_frame() {
    let frame = frame_with(20, &[(5, &[0x01, 0x02])]);
    assert!(frame::verify_checksum(&frame));

    let mut corrupted = frame.clone();
    corrupted[6] = 0x03;
    assert!(!frame::verify_checksum(&corrupted));
}
