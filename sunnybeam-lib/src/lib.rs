pub mod assembler;
pub mod command;
pub mod config;
pub mod constants;
pub mod continuation;
pub mod crc;
pub mod device;
pub mod error;
pub mod frame;
pub mod link;
pub mod measurement;
pub mod session;
pub mod transport;


pub use command::{Command, SeriesKind};
pub use config::{DeviceConfig, SessionConfig};
pub use device::{SunnyBeam, UsbTransport};
pub use error::SBError;
pub use frame::{DeviceId, Frame};
pub use measurement::{InstantMeasurement, MeasurementRecord};
pub use session::{Session, SessionState};
pub use transport::Transport;
