//! The ordered exchange with a Sunny Beam.
//!
//! ```text
//! Disconnected --set_feature--> FeatureSet --discover--> IdentityKnown --> Ready
//!       \______________________________\___________________/
//!                         any failure --> Unavailable
//! ```
//!
//! Data requests are only issued from `Ready`, each preceded by a syn-online
//! keepalive. The protocol is half-duplex: every operation takes `&mut self`,
//! so one session never has two requests in flight.

use crate::command::{Command, SeriesKind};
use crate::config::SessionConfig;
use crate::constants::{DISCOVERED_ID_OFFSET, DISCOVERY_RESPONSE_MIN_LEN};
use crate::continuation::ContinuationReader;
use crate::error::SBError;
use crate::frame::DeviceId;
use crate::link::Link;
use crate::measurement::{InstantMeasurement, MeasurementRecord, decode_series};
use crate::transport::Transport;
use strum_macros::Display;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Disconnected,
    FeatureSet,
    IdentityKnown,
    Ready,
    Unavailable,
}

pub struct Session<T> {
    link: Link<T>,
    state: SessionState,
    device_id: Option<DeviceId>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            link: Link::new(transport, config),
            state: SessionState::Disconnected,
            device_id: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    pub fn config(&self) -> &SessionConfig {
        self.link.config()
    }

    pub fn transport(&self) -> &T {
        self.link.transport()
    }

    /// End the session and hand back the transport for teardown.
    pub fn close(self) -> T {
        debug!(state = %self.state, "Closing session");
        self.link.into_transport()
    }

    /// Run the handshake: feature activation, then device-ID discovery using
    /// the numeric USB serial number. On failure the session becomes
    /// `Unavailable` for good.
    pub async fn connect(&mut self, serial: u32) -> Result<DeviceId, SBError> {
        if self.state != SessionState::Disconnected {
            return Err(SBError::DeviceUnavailable);
        }

        match self.handshake(serial).await {
            Ok(id) => Ok(id),
            Err(e) => {
                error!("Could not fetch device ID, further requests will not work: {}", e);
                self.state = SessionState::Unavailable;
                self.device_id = None;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, serial: u32) -> Result<DeviceId, SBError> {
        self.link.transport_mut().set_feature().await?;
        self.state = SessionState::FeatureSet;
        debug!("Feature activation accepted");

        let id = self.discover_device_id(serial).await?;
        self.device_id = Some(id);
        self.state = SessionState::IdentityKnown;
        debug!(device_id = %id, "Device ID discovered");

        self.state = SessionState::Ready;
        info!(device_id = %id, "Sunny Beam ready");
        Ok(id)
    }

    async fn discover_device_id(&mut self, serial: u32) -> Result<DeviceId, SBError> {
        let frame = Command::SearchDeviceId { serial }.frame(None)?;
        self.link.send(&frame).await?;

        let attempts = self.link.config().discovery_attempts;
        let response = self.link.read_frame(attempts).await?;
        if response.len() < DISCOVERY_RESPONSE_MIN_LEN {
            return Err(SBError::MalformedPayload {
                expected: DISCOVERY_RESPONSE_MIN_LEN,
                actual: response.len(),
            });
        }

        let id = [response[DISCOVERED_ID_OFFSET], response[DISCOVERED_ID_OFFSET + 1]];
        Ok(DeviceId(id))
    }

    fn ready_device_id(&self) -> Result<DeviceId, SBError> {
        match (self.state, self.device_id) {
            (SessionState::Ready, Some(id)) => Ok(id),
            _ => Err(SBError::DeviceUnavailable),
        }
    }

    /// Keepalive sent before every data request. The acknowledgment is read
    /// and discarded unchecked.
    pub async fn syn_online(&mut self) -> Result<(), SBError> {
        self.ready_device_id()?;

        let frame = Command::SynOnline.frame(None)?;
        self.link.send(&frame).await?;

        let attempts = self.link.config().syn_online_attempts;
        let ack = self.link.read_frame(attempts).await;
        debug!(ok = ack.is_ok(), "Syn-online acknowledgment drained");
        Ok(())
    }

    /// Current power, today's energy and total energy.
    pub async fn get_instant_measurement(&mut self) -> Result<InstantMeasurement, SBError> {
        let id = self.ready_device_id()?;
        self.syn_online().await?;

        let frame = Command::LiveData.frame(Some(id))?;
        self.link.send(&frame).await?;

        let attempts = self.link.config().live_data_attempts;
        let response = self.link.read_frame(attempts).await?;
        if response.is_empty() {
            return Err(SBError::FrameTimeout { attempts });
        }

        let measurement = InstantMeasurement::from_frame(&response)?;
        info!(
            pac_w = measurement.power_w,
            e_today_kwh = measurement.energy_today_kwh,
            e_total_kwh = measurement.energy_total_kwh,
            "Live data"
        );
        Ok(measurement)
    }

    /// A historical series, oldest record first.
    pub async fn get_series(&mut self, kind: SeriesKind) -> Result<Vec<MeasurementRecord>, SBError> {
        let id = self.ready_device_id()?;
        self.syn_online().await?;

        let payload = ContinuationReader::new(&mut self.link, id)
            .read_combined(kind.command())
            .await?;

        let records = decode_series(&payload);
        debug!(%kind, records = records.len(), "Series decoded");
        Ok(records)
    }

    pub async fn get_today_measurements(&mut self) -> Result<Vec<MeasurementRecord>, SBError> {
        self.get_series(SeriesKind::Today).await
    }

    pub async fn get_last_month_measurements(&mut self) -> Result<Vec<MeasurementRecord>, SBError> {
        self.get_series(SeriesKind::LastMonth).await
    }
}
