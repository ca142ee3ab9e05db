//! Broadcast bridge between the serial read loop and the event server.
//!
//! Publishing never blocks: events go into a bounded `tokio::sync::broadcast`
//! ring. A client that falls behind loses the oldest events (it sees a
//! `Lagged` error and carries on) while the serial side keeps decoding.

use crate::codec::Reading;
use crate::state::{DevicePresence, SharedState};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

/// Event fanned out to every connected client.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Device presence changed.
    Device(DevicePresence),
    /// A reading decoded while collection was running.
    Reading { reading: Reading, pid: u16 },
}

/// What a new client gets: the presence at subscription time plus every
/// event published after it.
pub struct Subscription {
    pub initial: DevicePresence,
    pub events: BroadcastStream<AgentEvent>,
}

#[derive(Clone)]
pub struct Bridge {
    state: SharedState,
    tx: broadcast::Sender<AgentEvent>,
}

impl Bridge {
    pub fn new(state: SharedState, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { state, tx }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Record a presence transition and announce it, regardless of collection
    /// state. Returns false if `presence` equals the current value.
    pub fn publish_status(&self, presence: DevicePresence) -> bool {
        let mut current = self.state.presence_cell().lock();
        if *current == presence {
            return false;
        }
        *current = presence.clone();
        debug!(status = ?presence.status(), "Device presence changed");
        // Err only means nobody is listening right now.
        let _ = self.tx.send(AgentEvent::Device(presence));
        true
    }

    /// Relay a reading if collection is running. Returns whether it was queued.
    pub fn publish_reading(&self, reading: Reading, pid: u16) -> bool {
        if !self.state.collection().is_running() {
            trace!(mac = %reading.device_id(), "Collection idle, reading dropped");
            return false;
        }
        let _ = self.tx.send(AgentEvent::Reading { reading, pid });
        true
    }

    /// Subscribe a new client.
    pub fn subscribe(&self) -> Subscription {
        // Same lock as publish_status: no transition can slip between the
        // snapshot and the receiver being registered.
        let current = self.state.presence_cell().lock();
        let rx = self.tx.subscribe();
        Subscription {
            initial: current.clone(),
            events: BroadcastStream::new(rx),
        }
    }

    /// Number of subscribed clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
