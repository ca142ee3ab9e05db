//! Serial device management.
//!
//! Discovery is behind the [`DeviceSource`] seam so the manager can run
//! against real USB enumeration or a scripted mock.

pub mod discovery;
pub mod manager;
pub mod mock;

use crate::port::{PortConfiguration, PortError, SerialPortAdapter};
use thiserror::Error;

pub use discovery::UsbSerialSource;
pub use manager::DeviceManager;
pub use mock::MockDeviceSource;

/// A Snappy receiver found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// OS path of the serial port, e.g. `/dev/ttyACM0` or `COM4`
    pub port_name: String,
    pub vid: u16,
    pub pid: u16,
    /// USB serial number; feeds the cipher key
    pub serial_number: Option<String>,
}

/// Recoverable device-side failures. None of these ever leave the manager;
/// they only drive the search/reconnect loop.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("No Snappy receiver attached")]
    NotFound,

    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(#[source] PortError),

    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: PortError,
    },

    #[error("Device disconnected: {0}")]
    Disconnected(#[source] PortError),
}

/// Where the manager looks for, and opens, the device.
pub trait DeviceSource: Send + Sync {
    /// Find the first attached receiver.
    fn find(&self) -> Result<DeviceInfo, DeviceError>;

    /// Open the receiver's serial port.
    fn open(
        &self,
        device: &DeviceInfo,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, DeviceError>;
}
