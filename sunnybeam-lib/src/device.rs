use crate::command::{ControlRequest, FEATURE_REQUEST, SeriesKind};
use crate::config::{DeviceConfig, SessionConfig};
use crate::error::SBError;
use crate::frame::DeviceId;
use crate::measurement::{InstantMeasurement, MeasurementRecord};
use crate::session::{Session, SessionState};
use crate::transport::Transport;
use bytes::Bytes;
use nusb::transfer::{ControlOut, ControlType, Recipient, RequestBuffer};
use nusb::{Device, Interface};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

/// Bulk transport over a claimed nusb interface.
pub struct UsbTransport {
    interface: Interface,
    config: DeviceConfig,
}

impl UsbTransport {
    pub fn new(interface: Interface, config: DeviceConfig) -> Self {
        Self { interface, config }
    }
}

fn control_kind(request_type: u8) -> (ControlType, Recipient) {
    let control_type = match (request_type >> 5) & 0x03 {
        0 => ControlType::Standard,
        1 => ControlType::Class,
        _ => ControlType::Vendor,
    };
    let recipient = match request_type & 0x1F {
        1 => Recipient::Interface,
        2 => Recipient::Endpoint,
        3 => Recipient::Other,
        _ => Recipient::Device,
    };
    (control_type, recipient)
}

impl Transport for UsbTransport {
    async fn set_feature(&mut self) -> Result<(), SBError> {
        let ControlRequest {
            request_type,
            request,
            value,
            index,
        } = FEATURE_REQUEST;
        let (control_type, recipient) = control_kind(request_type);

        let transfer = self.interface.control_out(ControlOut {
            control_type,
            recipient,
            request,
            value,
            index,
            data: &[],
        });
        let completion = timeout(self.config.control_timeout, transfer).await?;
        completion.into_result()?;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, SBError> {
        let transfer = self.interface.bulk_out(self.config.endpoint_out, data.to_vec());
        let completion = timeout(self.config.write_timeout, transfer).await?;
        let response = completion.into_result()?;
        Ok(response.actual_length())
    }

    async fn read(&mut self, max_len: usize) -> Result<Bytes, SBError> {
        let transfer = self.interface.bulk_in(self.config.endpoint_in, RequestBuffer::new(max_len));
        match timeout(self.config.read_timeout, transfer).await {
            Ok(completion) => Ok(Bytes::from(completion.into_result()?)),
            Err(_) => Ok(Bytes::new()),
        }
    }
}

/// Represents a connection to an SMA Sunny Beam.
pub struct SunnyBeam {
    session: Session<UsbTransport>,
    device: Device,
    serial_number: String,
}

impl SunnyBeam {
    /// Find, open and connect to the first Sunny Beam with default settings.
    pub async fn new() -> Result<Self, SBError> {
        let mut beam = Self::open(DeviceConfig::default(), SessionConfig::default()).await?;
        beam.connect().await?;
        Ok(beam)
    }

    /// Bring up the USB side only; call [`SunnyBeam::connect`] next.
    pub async fn open(device_config: DeviceConfig, session_config: SessionConfig) -> Result<Self, SBError> {
        info!("Searching for Sunny Beam...");
        let device_info = nusb::list_devices()?
            .find(|d| d.vendor_id() == device_config.vendor_id && d.product_id() == device_config.product_id)
            .ok_or(SBError::DeviceNotFound)?;

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );
        info!(
            "Device Manufacturer: {}",
            device_info.manufacturer_string().unwrap_or("<Not available>")
        );
        let serial_number = device_info.serial_number().unwrap_or_default().to_string();
        info!("Serial Number: {}", serial_number);

        let device = device_info.open()?;
        if device_config.reset_before_claim {
            info!("Performing USB device reset...");
            device.reset()?;
            sleep(Duration::from_millis(50)).await;
        }

        if let Err(e) = device.set_configuration(device_config.configuration) {
            warn!("Could not set configuration {}: {}", device_config.configuration, e);
        }

        let interface = device.detach_and_claim_interface(device_config.interface)?;
        info!("Interface claimed successfully.");

        let transport = UsbTransport::new(interface, device_config);
        Ok(Self {
            session: Session::new(transport, session_config),
            device,
            serial_number,
        })
    }

    /// Run the protocol handshake using the device's USB serial number.
    pub async fn connect(&mut self) -> Result<DeviceId, SBError> {
        let serial = self
            .serial_number
            .trim()
            .parse::<u32>()
            .map_err(|e| SBError::InvalidSerial(format!("{:?}: {}", self.serial_number, e)))?;
        self.session.connect(serial).await
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.session.device_id()
    }

    pub fn session_mut(&mut self) -> &mut Session<UsbTransport> {
        &mut self.session
    }

    pub async fn get_measurements(&mut self) -> Result<InstantMeasurement, SBError> {
        self.session.get_instant_measurement().await
    }

    pub async fn get_series(&mut self, kind: SeriesKind) -> Result<Vec<MeasurementRecord>, SBError> {
        self.session.get_series(kind).await
    }

    pub async fn get_today_measurements(&mut self) -> Result<Vec<MeasurementRecord>, SBError> {
        self.session.get_today_measurements().await
    }

    pub async fn get_last_month_measurements(&mut self) -> Result<Vec<MeasurementRecord>, SBError> {
        self.session.get_last_month_measurements().await
    }

    /// Release the interface and close the device handle.
    pub fn close(self) {
        let transport = self.session.close();
        drop(transport);
        drop(self.device);
        info!("Interface released, device closed.");
    }
}
