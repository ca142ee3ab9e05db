//! JSON envelopes exchanged over the `/ws` endpoint.
//!
//! ```text
//! client -> {"type":"call","event":"start-snappy","ack":7}
//! server <- {"type":"ack","ack":7,"data":{"success":true,...}}
//! server <- {"type":"event","event":"snappy-data","data":{"mac":...}}
//! ```

use crate::bridge::AgentEvent;
use crate::codec::{HardwareAddress, Reading};
use crate::state::{DevicePresence, DeviceStatus};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

/// Name of the device presence event.
pub const DEVICE_CONNECTED: &str = "device-connected";
/// Name of the reading event.
pub const SNAPPY_DATA: &str = "snappy-data";

/// Incoming client frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Invoke a command; `ack` asks for exactly one acknowledgment.
    Call {
        event: String,
        #[serde(default)]
        ack: Option<u64>,
    },
}

/// Outgoing server frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a `call` that carried an ack id
    Ack { ack: u64, data: CommandResult },
    /// Server push
    Event(PushEvent),
    /// Protocol-level error (unparseable frame)
    Error { message: String },
}

/// Named events pushed to every client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushEvent {
    DeviceConnected(DeviceStatusPayload),
    SnappyData(ReadingPayload),
}

impl From<&AgentEvent> for PushEvent {
    fn from(event: &AgentEvent) -> Self {
        match event {
            AgentEvent::Device(presence) => Self::DeviceConnected(presence.into()),
            AgentEvent::Reading { reading, pid } => Self::SnappyData(ReadingPayload::new(reading, *pid)),
        }
    }
}

/// Outcome of one command, returned through the acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub command: String,
    /// Failure detail; set exactly when `success` is false.
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            command: command.into(),
            error: None,
        }
    }

    pub fn failed(
        command: impl Into<String>,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            command: command.into(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatusPayload {
    pub status: DeviceStatus,
    pub connected: bool,
    pub pid: Option<u16>,
    pub port: Option<String>,
}

impl From<&DevicePresence> for DeviceStatusPayload {
    fn from(presence: &DevicePresence) -> Self {
        let (pid, port) = match presence {
            DevicePresence::Connected { pid, port } => (Some(*pid), Some(port.clone())),
            DevicePresence::Disconnected => (None, None),
        };
        Self {
            status: presence.status(),
            connected: presence.is_connected(),
            pid,
            port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingPayload {
    pub mac: HardwareAddress,
    pub value: u16,
    /// RFC 3339, UTC, millisecond precision
    pub timestamp: String,
    pub pid: u16,
}

impl ReadingPayload {
    pub fn new(reading: &Reading, pid: u16) -> Self {
        Self {
            mac: reading.device_id(),
            value: reading.value(),
            timestamp: reading
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            pid,
        }
    }
}
