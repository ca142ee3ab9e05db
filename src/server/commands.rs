//! Client command surface.
//!
//! Commands only read or flip shared state; none of them touches the serial
//! port, so every call completes before its acknowledgment is sent.

use super::protocol::CommandResult;
use super::ServerContext;
use crate::collection::CollectionState;
use crate::state::DevicePresence;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    DeviceInfo,
    StartSnappy,
    StopSnappy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "version" => Ok(Self::Version),
            "device-info" => Ok(Self::DeviceInfo),
            "start-snappy" => Ok(Self::StartSnappy),
            "stop-snappy" => Ok(Self::StopSnappy),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::DeviceInfo => "device-info",
            Self::StartSnappy => "start-snappy",
            Self::StopSnappy => "stop-snappy",
        }
    }

    pub fn execute(self, ctx: &ServerContext) -> CommandResult {
        match self {
            Self::Version => CommandResult::ok(self.name(), env!("CARGO_PKG_VERSION")),
            Self::DeviceInfo => CommandResult::ok(self.name(), device_info(ctx)),
            Self::StartSnappy => switch_collection(ctx, self, CollectionState::Running),
            Self::StopSnappy => switch_collection(ctx, self, CollectionState::Idle),
        }
    }
}

/// Parse and run a command by its wire name.
pub fn dispatch(ctx: &ServerContext, name: &str) -> CommandResult {
    match name.parse::<Command>() {
        Ok(command) => command.execute(ctx),
        Err(e) => CommandResult::failed(name, "Unknown command", e.to_string()),
    }
}

fn switch_collection(ctx: &ServerContext, command: Command, target: CollectionState) -> CommandResult {
    let collection = ctx.bridge.state().collection();
    let transition = match target {
        CollectionState::Running => collection.start(),
        CollectionState::Idle => collection.stop(),
    };

    if transition.current != target {
        error!(
            command = command.name(),
            state = ?transition.current,
            "Collection state did not reach its target"
        );
        return CommandResult::failed(
            command.name(),
            "Collection state unchanged",
            format!("invalid state: expected {target:?}, found {:?}", transition.current),
        );
    }

    let message = match (target, transition.changed()) {
        (CollectionState::Running, true) => {
            info!(pids = ?ctx.device.product_ids, "Snappy data collection started");
            format!(
                "Snappy data collection started for PIDs: [{}]",
                hex_ids(&ctx.device.product_ids)
            )
        }
        (CollectionState::Running, false) => "Snappy data collection already running".to_string(),
        (CollectionState::Idle, true) => {
            info!("Snappy data collection stopped");
            "Snappy data collection stopped".to_string()
        }
        (CollectionState::Idle, false) => "Snappy data collection already stopped".to_string(),
    };
    CommandResult::ok(command.name(), message)
}

fn device_info(ctx: &ServerContext) -> String {
    let connected = match ctx.bridge.state().presence() {
        DevicePresence::Connected { pid, port } => format!("0x{pid:04x} on {port}"),
        DevicePresence::Disconnected => "none".to_string(),
    };
    format!(
        "VID: 0x{:04x}, Supported PIDs: [{}], Connected: {}",
        ctx.device.vendor_id,
        hex_ids(&ctx.device.product_ids),
        connected
    )
}

fn hex_ids(ids: &[u16]) -> String {
    ids.iter()
        .map(|id| format!("0x{id:04x}"))
        .collect::<Vec<_>>()
        .join(", ")
}
