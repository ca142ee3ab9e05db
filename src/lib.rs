//! Snappy Web Agent Library
//!
//! Bridges a Snappy USB receiver to local WebSocket clients: the receiver's
//! encrypted serial frames are decoded and pushed as events, and clients
//! start or stop collection with acknowledged commands.
//!
//! # Modules
//!
//! - `port_alloc`: first free listening port in the agent's range
//! - `codec`: frame decryption and parsing
//! - `port`: serial transport abstraction (real + mock adapters)
//! - `device`: discovery, connect, read and reconnect loop
//! - `collection`: start/stop state machine gating readings
//! - `state`: process-wide shared state
//! - `bridge`: non-blocking fan-out from the device loop to clients
//! - `server`: axum WebSocket event server
//! - `config`: configuration management with TOML support
//! - `logging`: tracing subscriber setup
//! - `error`: process-level error type

pub mod bridge;
pub mod codec;
pub mod collection;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod port;
pub mod port_alloc;
pub mod server;
pub mod state;

// Re-export commonly used types for convenience
pub use bridge::{AgentEvent, Bridge, Subscription};
pub use codec::{DecodeStep, FrameCodec, FrameError, HardwareAddress, Reading};
pub use collection::{CollectionControl, CollectionState};
pub use device::{DeviceInfo, DeviceManager, DeviceSource, MockDeviceSource, UsbSerialSource};
pub use error::{AppError, AppResult};
pub use port::{MockSerialPort, PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort};
pub use server::{CommandResult, ServerContext};
pub use state::{AgentState, DevicePresence, DeviceStatus, SharedState};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
