//! Agent configuration.
//!
//! Configuration is resolved in this order (first hit wins):
//!
//! 1. `--config <path>` on the command line
//! 2. `SNAPPY_AGENT_CONFIG` environment variable
//! 3. `./snappy-agent.toml`
//! 4. `snappy-agent.toml` in the platform config directory
//!    (`~/.config/snappy-web-agent/` on Linux)
//! 5. Built-in defaults
//!
//! Selected values can then be overridden with `SNAPPY_AGENT_<SECTION>_<KEY>`
//! environment variables, e.g. `SNAPPY_AGENT_SERVER_BASE_PORT=9000` or
//! `SNAPPY_AGENT_LOGGING_LEVEL=debug`.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{resolve_config_path, ConfigLoader};
pub use schema::{CipherConfig, Config, DeviceConfig, LogFormat, LoggingConfig, ServerConfig};
