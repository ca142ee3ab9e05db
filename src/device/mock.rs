//! Scripted device source for tests and demos.

use super::{DeviceError, DeviceInfo, DeviceSource};
use crate::port::{MockSerialPort, PortConfiguration, SerialPortAdapter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A virtual USB socket into which tests plug and unplug mock receivers.
#[derive(Clone, Default)]
pub struct MockDeviceSource {
    slot: Arc<Mutex<Option<(DeviceInfo, MockSerialPort)>>>,
    opens: Arc<AtomicUsize>,
}

impl MockDeviceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a receiver and return the handle used to feed it bytes.
    pub fn plug(&self, info: DeviceInfo) -> MockSerialPort {
        let port = MockSerialPort::new(info.port_name.clone());
        *self.slot.lock() = Some((info, port.clone()));
        port
    }

    /// Detach the receiver; its open port starts failing reads.
    pub fn unplug(&self) {
        if let Some((_, port)) = self.slot.lock().take() {
            port.unplug();
        }
    }

    /// How many times the manager has opened a port.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DeviceSource for MockDeviceSource {
    fn find(&self) -> Result<DeviceInfo, DeviceError> {
        self.slot
            .lock()
            .as_ref()
            .map(|(info, _)| info.clone())
            .ok_or(DeviceError::NotFound)
    }

    fn open(
        &self,
        device: &DeviceInfo,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, DeviceError> {
        let slot = self.slot.lock();
        let (_, port) = slot
            .as_ref()
            .filter(|(info, _)| info == device)
            .ok_or(DeviceError::NotFound)?;

        let mut port = port.clone();
        port.set_timeout(config.timeout)
            .map_err(|source| DeviceError::Open {
                port: device.port_name.clone(),
                source,
            })?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(port))
    }
}
