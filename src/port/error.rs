//! Port-specific error types.

use thiserror::Error;

/// Errors that can occur while opening or reading a serial port.
#[derive(Debug, Error)]
pub enum PortError {
    /// The serial port disappeared or was never there.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port returned end-of-stream, which is how an unplugged USB CDC
    /// device shows up on most platforms.
    #[error("Device closed the stream")]
    Closed,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// True for errors that only mean "no bytes arrived within the read timeout".
    ///
    /// These must not be mistaken for a device removal.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            )
        )
    }
}
