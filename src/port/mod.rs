//! Serial transport abstraction.
//!
//! The device manager only ever talks to a `SerialPortAdapter`, so the real
//! `serialport` backend and the in-memory mock are interchangeable.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::SyncSerialPort;
pub use traits::{PortConfiguration, SerialPortAdapter};
