//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SNAPPY_AGENT";

/// Config file name
const CONFIG_FILE_NAME: &str = "snappy-agent.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SNAPPY_AGENT_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using the standard resolution order.
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let config_path = match explicit {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => resolve_config_path(),
        };

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        validate(&config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let config = load_from_file(&path)?;
        validate(&config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file, no env).
    pub fn with_defaults() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    directories::ProjectDirs::from("", "", "snappy-web-agent")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}: '{value}'")))
}

/// Apply `SNAPPY_AGENT_<SECTION>_<KEY>` overrides, reading variables through
/// `lookup`.
pub(crate) fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| format!("{ENV_PREFIX}_{key}");

    if let Some(val) = lookup(&var("SERVER_HOST")) {
        config.server.host = val;
    }
    if let Some(val) = lookup(&var("SERVER_BASE_PORT")) {
        config.server.base_port = parse_var(&var("SERVER_BASE_PORT"), &val, "port number")?;
    }
    if let Some(val) = lookup(&var("SERVER_PORT_SPAN")) {
        config.server.port_span = parse_var(&var("SERVER_PORT_SPAN"), &val, "port span")?;
    }
    if let Some(val) = lookup(&var("DEVICE_POLL_INTERVAL_MS")) {
        config.device.poll_interval_ms =
            parse_var(&var("DEVICE_POLL_INTERVAL_MS"), &val, "interval")?;
    }
    if let Some(val) = lookup(&var("LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    if let Some(val) = lookup(&var("LOGGING_FORMAT")) {
        config.logging.format = val
            .parse()
            .map_err(|message: String| ConfigError::env_parse(var("LOGGING_FORMAT"), message))?;
    }

    Ok(())
}

/// Reject values the agent cannot run with.
pub(crate) fn validate(config: &Config) -> ConfigResult<()> {
    let server = &config.server;
    if server.port_span == 0 {
        return Err(ConfigError::validation("server.port_span", "must be at least 1"));
    }
    if u32::from(server.base_port) + u32::from(server.port_span) - 1 > u32::from(u16::MAX) {
        return Err(ConfigError::validation(
            "server.port_span",
            format!("range starting at {} runs past port 65535", server.base_port),
        ));
    }
    if server.event_buffer == 0 {
        return Err(ConfigError::validation("server.event_buffer", "must be at least 1"));
    }
    if config.device.product_ids.is_empty() {
        return Err(ConfigError::validation("device.product_ids", "must not be empty"));
    }
    if config.device.poll_interval_ms == 0 {
        return Err(ConfigError::validation("device.poll_interval_ms", "must be positive"));
    }
    if config.device.read_timeout_ms == 0 {
        return Err(ConfigError::validation("device.read_timeout_ms", "must be positive"));
    }
    Ok(())
}
