//! Collection state machine.
//!
//! Decides whether decoded readings are relayed to clients. Only the explicit
//! `start-snappy` / `stop-snappy` commands move it; device churn never does.

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionState {
    #[default]
    Idle,
    Running,
}

/// Before/after pair observed atomically by one `start` or `stop` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: CollectionState,
    pub current: CollectionState,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Single-writer holder of the collection state.
#[derive(Debug, Default)]
pub struct CollectionControl {
    state: Mutex<CollectionState>,
}

impl CollectionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> Running. Calling it while running is a successful no-op.
    pub fn start(&self) -> Transition {
        self.set(CollectionState::Running)
    }

    /// Running -> Idle. Calling it while idle is a successful no-op.
    pub fn stop(&self) -> Transition {
        self.set(CollectionState::Idle)
    }

    pub fn state(&self) -> CollectionState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CollectionState::Running
    }

    fn set(&self, next: CollectionState) -> Transition {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut *state, next);
        Transition {
            previous,
            current: next,
        }
    }
}
