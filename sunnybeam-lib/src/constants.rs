// Protocol constants for the Sunny Beam link

/// USB vendor ID of the Sunny Beam
pub const VID: u16 = 0x1587;

/// USB product ID of the Sunny Beam
pub const PID: u16 = 0x002D;

/// Bulk OUT endpoint
pub const ENDPOINT_OUT: u8 = 0x02;

/// Bulk IN endpoint
pub const ENDPOINT_IN: u8 = 0x81;

/// Frame delimiter, used for both start and end of frame
pub const FLAG: u8 = 0x7E;

/// Escape marker; the following byte is XORed with `ESCAPE_XOR`
pub const ESCAPE: u8 = 0x7D;

/// Mask applied to an escaped byte
pub const ESCAPE_XOR: u8 = 0x20;

/// Status bytes prepended by the USB bridge to every bulk IN transfer
pub const TRANSPORT_HEADER_LEN: usize = 2;

/// Idle artifact the bridge injects into long transfers: `0x01 0x60`
pub const IDLE_ARTIFACT: [u8; 2] = [0x01, 0x60];

/// Trailing bytes of a frame: 2 checksum bytes and the closing flag
pub const FRAME_TRAILER_LEN: usize = 3;

/// Smallest frame that carries a checksum: flag + 2 checksum bytes + flag
pub const MIN_FRAME_LEN: usize = 4;

/// Offset of the 2-byte device ID in command and response frames
pub const DEVICE_ID_OFFSET: usize = 7;

/// Offset of the device ID returned by the discovery response
pub const DISCOVERED_ID_OFFSET: usize = 5;

/// Minimum discovery response length: the device ID must be present
pub const DISCOVERY_RESPONSE_MIN_LEN: usize = DISCOVERED_ID_OFFSET + 2;

/// Offset of the line-count (remaining chunks) byte
pub const LINE_COUNT_OFFSET: usize = 10;

/// Offset of the transformed serial number in the discovery request
pub const SERIAL_OFFSET: usize = 12;

/// Added to the USB serial number before it goes into the discovery request
pub const SERIAL_BIAS: u32 = 140_000_000;

/// Header stripped from every chunk of a combined read
pub const CHUNK_HEADER_LEN: usize = 12;

/// Offset of the three live-data floats in the live-data response
pub const LIVE_DATA_OFFSET: usize = 25;

/// Size of the live-data block (three little-endian f32)
pub const LIVE_DATA_SIZE: usize = 12;

/// Offset of the first record in a reassembled series payload
pub const SERIES_OFFSET: usize = 5;

/// Size of one series record
pub const SERIES_RECORD_SIZE: usize = 12;

/// Remaining-chunk sentinel before the device has announced a count
pub const UNKNOWN_REMAINING: u8 = 0xFF;
