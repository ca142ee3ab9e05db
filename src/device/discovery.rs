//! USB serial discovery through `serialport` enumeration.

use super::{DeviceError, DeviceInfo, DeviceSource};
use crate::config::DeviceConfig;
use crate::port::{PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort};
use serialport::SerialPortType;
use tracing::debug;

/// Finds the receiver by USB vendor/product id among the system's serial ports.
#[derive(Debug, Clone)]
pub struct UsbSerialSource {
    device: DeviceConfig,
}

impl UsbSerialSource {
    pub fn new(device: DeviceConfig) -> Self {
        Self { device }
    }
}

impl DeviceSource for UsbSerialSource {
    fn find(&self) -> Result<DeviceInfo, DeviceError> {
        let ports = serialport::available_ports()
            .map_err(|e| DeviceError::Enumerate(PortError::Serial(e)))?;

        ports
            .into_iter()
            .find_map(|port| match port.port_type {
                SerialPortType::UsbPort(usb) if self.device.matches(usb.vid, usb.pid) => {
                    let serial_number = usb
                        .serial_number
                        .filter(|s| usable_serial(s))
                        .or_else(|| sysfs_serial(&port.port_name));
                    Some(DeviceInfo {
                        port_name: port.port_name,
                        vid: usb.vid,
                        pid: usb.pid,
                        serial_number,
                    })
                }
                _ => None,
            })
            .ok_or(DeviceError::NotFound)
    }

    fn open(
        &self,
        device: &DeviceInfo,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, DeviceError> {
        SyncSerialPort::open(&device.port_name, config)
            .map(|port| Box::new(port) as Box<dyn SerialPortAdapter>)
            .map_err(|source| DeviceError::Open {
                port: device.port_name.clone(),
                source,
            })
    }
}

/// Serial number reported by some enumeration backends instead of the real one.
const PLACEHOLDER_SERIAL: &str = "6";

/// Whether an enumerated serial number can key the cipher.
fn usable_serial(serial: &str) -> bool {
    let serial = serial.trim();
    !serial.is_empty() && serial != PLACEHOLDER_SERIAL
}

/// Some kernels' enumeration omits the USB serial number; read it from sysfs.
#[cfg(target_os = "linux")]
fn sysfs_serial(port_name: &str) -> Option<String> {
    let tty = port_name.strip_prefix("/dev/").unwrap_or(port_name);
    let path = format!("/sys/class/tty/{tty}/device/../serial");
    let serial = std::fs::read_to_string(&path).ok()?.trim().to_string();
    debug!(%path, "Serial number read from sysfs");
    (!serial.is_empty()).then_some(serial)
}

#[cfg(not(target_os = "linux"))]
fn sysfs_serial(_port_name: &str) -> Option<String> {
    debug!("No serial number fallback on this platform");
    None
}
