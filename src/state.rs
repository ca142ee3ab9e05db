//! Process-wide shared state.
//!
//! One `AgentState` is created at startup and handed to the device manager
//! (through the bridge) and to the event server. It holds the only two pieces
//! of cross-task mutable state: collection state and device presence.

use crate::collection::CollectionControl;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A type alias for the shared, thread-safe agent state.
pub type SharedState = Arc<AgentState>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Connected,
    Disconnected,
}

/// Physical presence of the Snappy receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DevicePresence {
    #[default]
    Disconnected,
    Connected {
        /// USB product id of the attached unit
        pid: u16,
        /// OS path of its serial port
        port: String,
    },
}

impl DevicePresence {
    pub fn status(&self) -> DeviceStatus {
        match self {
            Self::Disconnected => DeviceStatus::Disconnected,
            Self::Connected { .. } => DeviceStatus::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == DeviceStatus::Connected
    }
}

#[derive(Debug, Default)]
pub struct AgentState {
    collection: CollectionControl,
    // Written only by the bridge, which holds this lock while broadcasting so
    // subscribers never miss or double-see a transition.
    presence: Mutex<DevicePresence>,
}

impl AgentState {
    pub fn new() -> SharedState {
        Arc::new(Self::default())
    }

    pub fn collection(&self) -> &CollectionControl {
        &self.collection
    }

    /// Snapshot of the current device presence.
    pub fn presence(&self) -> DevicePresence {
        self.presence.lock().clone()
    }

    pub(crate) fn presence_cell(&self) -> &Mutex<DevicePresence> {
        &self.presence
    }
}
