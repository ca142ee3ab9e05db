//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`: service installers start the agent
//! with no arguments and no file, so the defaults must be the production setup.

use crate::codec::{Seed, DEFAULT_SEED};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event server configuration
    pub server: ServerConfig,
    /// USB serial device configuration
    pub device: DeviceConfig,
    /// Frame cipher configuration
    pub cipher: CipherConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Event server section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// First port tried by the port allocator
    pub base_port: u16,
    /// Number of consecutive ports tried, `base_port` included
    pub port_span: u16,
    /// Depth of the outbound event queue shared by all clients
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 8436,
            port_span: 100,
            event_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Last port of the allocation range, inclusive.
    pub fn last_port(&self) -> u16 {
        self.base_port
            .saturating_add(self.port_span.saturating_sub(1))
    }
}

/// Serial device section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB vendor id of the Snappy receiver
    pub vendor_id: u16,
    /// Accepted USB product ids; the first present device wins
    pub product_ids: Vec<u16>,
    /// Line speed fixed by the firmware
    pub baud_rate: u32,
    /// Delay between discovery scans while no device is present
    pub poll_interval_ms: u64,
    /// Upper bound on a single blocking read
    pub read_timeout_ms: u64,
    /// Pause after opening the port before the first read
    pub settle_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0xb1b0,
            product_ids: vec![0x5508],
            baud_rate: 230_400,
            poll_interval_ms: 200,
            read_timeout_ms: 100,
            settle_ms: 100,
        }
    }
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Whether a USB vendor/product pair is a Snappy receiver.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        vid == self.vendor_id && self.product_ids.contains(&pid)
    }
}

/// Frame cipher section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Device-family seed words mixed with each unit's serial number
    pub seed: Seed,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self { seed: DEFAULT_SEED }
    }
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. "info" or
    /// "snappy_web_agent=debug"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
