//! Configuration types.

use serde::Deserialize;

use super::error::{ConfigError, ConfigResult};

/// Default size of the datagram receive buffer, in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Default number of datagrams each virtual connection queues per direction.
pub const DEFAULT_PIPE_DEPTH: usize = 1;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first invalid field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.logging.validate()
    }
}

/// Settings for a single server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network name (`tcp`, `udp`, `unix`, `unixgram`, ...).
    pub network: String,

    /// Address to listen on.
    pub address: String,

    /// Datagram receive buffer size. Longer datagrams are truncated.
    pub read_buffer_size: usize,

    /// Datagrams queued per virtual connection and direction before the
    /// writer blocks.
    pub pipe_depth: usize,

    /// Cap on concurrently running handlers. Unlimited when unset.
    pub max_concurrent_handlers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: "udp".to_string(),
            address: "127.0.0.1:7777".to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            pipe_depth: DEFAULT_PIPE_DEPTH,
            max_concurrent_handlers: None,
        }
    }
}

impl ServerConfig {
    /// Create a config for `network` and `address` with default tuning.
    #[must_use]
    pub fn new(network: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    /// Set the datagram receive buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the per-peer pipe depth.
    #[must_use]
    pub fn with_pipe_depth(mut self, depth: usize) -> Self {
        self.pipe_depth = depth;
        self
    }

    /// Cap the number of concurrently running handlers.
    #[must_use]
    pub fn with_max_concurrent_handlers(mut self, max: usize) -> Self {
        self.max_concurrent_handlers = Some(max);
        self
    }

    /// Validate the tuning values.
    ///
    /// Network and address are checked when the server binds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a size is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.read_buffer_size == 0 {
            return Err(invalid("read_buffer_size", "must be greater than zero"));
        }
        if self.pipe_depth == 0 {
            return Err(invalid("pipe_depth", "must be greater than zero"));
        }
        if self.max_concurrent_handlers == Some(0) {
            return Err(invalid(
                "max_concurrent_handlers",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }
}

/// Logging settings for the binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, overridden by `RUST_LOG`.
    pub level: String,

    /// Colorize output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Validate the logging section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the level is empty.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.level.trim().is_empty() {
            return Err(invalid("level", "cannot be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
