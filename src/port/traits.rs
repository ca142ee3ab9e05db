//! Core traits for serial port abstraction.

use super::error::PortError;
use std::time::Duration;

/// Line parameters for a serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
    pub stop_bits: serialport::StopBits,
    pub flow_control: serialport::FlowControl,
    /// How long a single read may block before reporting "no data".
    pub timeout: Duration,
}

impl PortConfiguration {
    /// The fixed line setup of the Snappy firmware: 8-N-1, no flow control.
    pub fn snappy(baud_rate: u32, timeout: Duration) -> Self {
        Self {
            baud_rate,
            data_bits: serialport::DataBits::Eight,
            parity: serialport::Parity::None,
            stop_bits: serialport::StopBits::One,
            flow_control: serialport::FlowControl::None,
            timeout,
        }
    }
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self::snappy(230_400, Duration::from_millis(100))
    }
}

/// Byte source for one open serial connection.
///
/// Reads block for at most the configured timeout. An idle timeout is reported
/// as an `Io` error whose kind satisfies [`PortError::is_idle`]; any other error,
/// or a zero-length read, means the device is gone.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;
}
