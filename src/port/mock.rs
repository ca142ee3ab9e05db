//! Mock serial port for tests and simulators.
//!
//! `MockSerialPort` is a cheaply cloneable handle: one clone is handed to the
//! device manager as its open port while the test keeps another to feed bytes
//! or pull the virtual plug.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes waiting to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Set once the device has been "unplugged"; every later read fails.
    unplugged: bool,
    timeout: Duration,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockPortState>,
    readable: Condvar,
}

/// In-memory serial port.
///
/// # Example
/// ```
/// use snappy_web_agent::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello");
///
/// let mut buffer = [0u8; 8];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    shared: Arc<Shared>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let shared = Shared::default();
        shared.state.lock().timeout = Duration::from_millis(50);
        Self {
            name: name.into(),
            shared: Arc::new(shared),
        }
    }

    /// Append bytes to the read queue and wake a blocked reader.
    pub fn enqueue_read(&self, data: &[u8]) {
        let mut state = self.shared.state.lock();
        state.read_queue.extend(data);
        self.shared.readable.notify_all();
    }

    /// Simulate pulling the USB cable: pending and future reads fail.
    pub fn unplug(&self) {
        let mut state = self.shared.state.lock();
        state.unplugged = true;
        self.shared.readable.notify_all();
    }

    pub fn is_unplugged(&self) -> bool {
        self.shared.state.lock().unplugged
    }

    /// Number of queued bytes not yet consumed by a reader.
    pub fn available_bytes(&self) -> usize {
        self.shared.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.shared.state.lock();

        if state.read_queue.is_empty() && !state.unplugged {
            let timeout = state.timeout;
            self.shared.readable.wait_for(&mut state, timeout);
        }

        if state.unplugged {
            return Err(PortError::Closed);
        }

        if state.read_queue.is_empty() {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "No data available",
            )));
        }

        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.shared.state.lock().timeout = timeout;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
