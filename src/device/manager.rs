//! Serial device manager.
//!
//! Owns the physical link for the whole process lifetime:
//!
//! ```text
//!            found + opened
//! Searching ────────────────▶ Connected ──┐ bytes ─▶ codec ─▶ bridge
//!     ▲                          │        └────────────┘
//!     └──── I/O error / EOF ─────┘  (Disconnected emitted, buffer dropped)
//! ```
//!
//! The loop is blocking and runs on its own thread; it talks to the rest of
//! the agent only through the non-blocking [`Bridge`].

use super::{DeviceError, DeviceInfo, DeviceSource};
use crate::bridge::Bridge;
use crate::codec::{DecodeStep, FrameCodec, Seed};
use crate::config::DeviceConfig;
use crate::port::{PortConfiguration, SerialPortAdapter};
use crate::state::DevicePresence;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Bytes requested per read.
const READ_CHUNK: usize = 256;

/// An open connection to the receiver.
struct Link {
    port: Box<dyn SerialPortAdapter>,
    info: DeviceInfo,
    codec: FrameCodec,
    /// Rolling frame buffer; lives and dies with the link.
    buffer: Vec<u8>,
}

enum LinkState {
    Searching,
    Connected(Link),
}

pub struct DeviceManager<S> {
    source: S,
    bridge: Bridge,
    device: DeviceConfig,
    seed: Seed,
    /// Last search failure logged at warn; repeats go to debug.
    last_failure: Option<String>,
}

impl<S: DeviceSource> DeviceManager<S> {
    pub fn new(source: S, bridge: Bridge, device: DeviceConfig, seed: Seed) -> Self {
        Self {
            source,
            bridge,
            device,
            seed,
            last_failure: None,
        }
    }

    /// Run until `shutdown` turns true. Blocks the calling thread.
    pub fn run(mut self, shutdown: watch::Receiver<bool>) {
        info!(
            vid = %format!("0x{:04x}", self.device.vendor_id),
            pids = ?self.device.product_ids,
            "Device manager started"
        );

        let mut state = LinkState::Searching;
        while !*shutdown.borrow() {
            state = match state {
                LinkState::Searching => self.search(),
                LinkState::Connected(link) => self.pump(link),
            };
        }

        if let LinkState::Connected(link) = state {
            info!(port = %link.info.port_name, "Closing serial port");
        }
        info!("Device manager stopped");
    }

    /// Run on tokio's blocking pool.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()>
    where
        S: 'static,
    {
        tokio::task::spawn_blocking(move || self.run(shutdown))
    }

    fn search(&mut self) -> LinkState {
        match self.source.find().and_then(|info| self.connect(info)) {
            Ok(link) => {
                self.last_failure = None;
                LinkState::Connected(link)
            }
            Err(DeviceError::NotFound) => {
                trace!("No receiver attached");
                self.last_failure = None;
                std::thread::sleep(self.device.poll_interval());
                LinkState::Searching
            }
            Err(e) => {
                self.note_failure(&e);
                std::thread::sleep(self.device.poll_interval());
                LinkState::Searching
            }
        }
    }

    /// Warn once per distinct failure; the search loop retries several times
    /// a second.
    fn note_failure(&mut self, err: &DeviceError) -> bool {
        let message = err.to_string();
        if self.last_failure.as_deref() == Some(message.as_str()) {
            debug!("Device still unavailable: {}", message);
            return false;
        }
        warn!("Device unavailable: {}", message);
        self.last_failure = Some(message);
        true
    }

    fn connect(&self, info: DeviceInfo) -> Result<Link, DeviceError> {
        let config = PortConfiguration::snappy(self.device.baud_rate, self.device.read_timeout());
        let port = self.source.open(&info, &config)?;

        let serial = info.serial_number.as_deref().unwrap_or_default();
        if serial.is_empty() {
            warn!(port = %info.port_name, "Receiver has no serial number; frames will likely not decode");
        }
        let codec = FrameCodec::for_device(&self.seed, serial);

        info!(
            port = %info.port_name,
            pid = %format!("0x{:04x}", info.pid),
            "Receiver connected"
        );
        self.bridge.publish_status(DevicePresence::Connected {
            pid: info.pid,
            port: info.port_name.clone(),
        });

        // The firmware starts streaming a moment after the port opens.
        std::thread::sleep(self.device.settle());

        Ok(Link {
            port,
            info,
            codec,
            buffer: Vec::with_capacity(READ_CHUNK * 2),
        })
    }

    fn pump(&self, mut link: Link) -> LinkState {
        let mut chunk = [0u8; READ_CHUNK];
        match link.port.read_bytes(&mut chunk) {
            Ok(n) => {
                trace!(bytes = n, port = link.port.name(), "Read from serial port");
                link.buffer.extend_from_slice(&chunk[..n]);
                self.drain_frames(&mut link);
                LinkState::Connected(link)
            }
            Err(e) if e.is_idle() => LinkState::Connected(link),
            Err(e) => {
                let err = DeviceError::Disconnected(e);
                warn!(port = %link.info.port_name, "{}", err);
                self.bridge.publish_status(DevicePresence::Disconnected);
                // Dropping the link closes the port and discards partial frames.
                LinkState::Searching
            }
        }
    }

    fn drain_frames(&self, link: &mut Link) {
        loop {
            match link.codec.decode(&link.buffer) {
                DecodeStep::NeedMore => break,
                DecodeStep::Frame { reading, consumed } => {
                    link.buffer.drain(..consumed);
                    debug!(mac = %reading.device_id(), value = reading.value(), "Frame decoded");
                    self.bridge.publish_reading(reading, link.info.pid);
                }
                DecodeStep::Discard { error, consumed } => {
                    link.buffer.drain(..consumed);
                    debug!(port = %link.info.port_name, "Frame dropped: {}", error);
                }
            }
        }
    }
}
