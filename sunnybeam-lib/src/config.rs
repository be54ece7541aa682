use crate::constants::{ENDPOINT_IN, ENDPOINT_OUT, PID, VID};
use std::time::Duration;

/// Timing, attempt budgets and checksum policy of a session.
///
/// The budgets were tuned against real hardware; every value can be
/// overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Read attempts while waiting for the device-ID discovery response.
    pub discovery_attempts: u32,
    /// Read attempts when draining the syn-online acknowledgment.
    pub syn_online_attempts: u32,
    /// Read attempts for the live-data response.
    pub live_data_attempts: u32,
    /// Read attempts for each chunk of a combined read.
    pub chunk_attempts: u32,
    /// Iteration budget of a combined read.
    pub continuation_budget: u32,
    /// Size of each bulk IN request.
    pub read_buffer_size: usize,
    /// Pause before every send.
    pub send_delay: Duration,
    /// Pause before the first read attempt of a frame.
    pub read_settle_delay: Duration,
    /// Pause before each read attempt.
    pub attempt_delay: Duration,
    /// Reject frames whose checksum does not match instead of logging them.
    pub strict_crc: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            discovery_attempts: 20,
            syn_online_attempts: 5,
            live_data_attempts: 50,
            chunk_attempts: 50,
            continuation_budget: 20,
            read_buffer_size: 1024,
            send_delay: Duration::from_millis(200),
            read_settle_delay: Duration::from_millis(300),
            attempt_delay: Duration::from_millis(70),
            strict_crc: false,
        }
    }
}

impl SessionConfig {
    /// Same budgets, no pacing. Useful against simulated transports.
    pub fn without_delays() -> Self {
        Self {
            send_delay: Duration::ZERO,
            read_settle_delay: Duration::ZERO,
            attempt_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_strict_crc(mut self, strict: bool) -> Self {
        self.strict_crc = strict;
        self
    }
}

/// USB-level settings for opening the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub configuration: u8,
    pub interface: u8,
    pub endpoint_out: u8,
    pub endpoint_in: u8,
    pub reset_before_claim: bool,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
    pub control_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: VID,
            product_id: PID,
            configuration: 1,
            interface: 0,
            endpoint_out: ENDPOINT_OUT,
            endpoint_in: ENDPOINT_IN,
            reset_before_claim: true,
            write_timeout: Duration::from_millis(1000),
            read_timeout: Duration::from_millis(1000),
            control_timeout: Duration::from_millis(1000),
        }
    }
}
