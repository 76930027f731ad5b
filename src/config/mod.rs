//! # Configuration
//!
//! TOML configuration for servers and the echo binary.
//!
//! ## Example Configuration
//!
//! ```toml
//! [server]
//! network = "udp"
//! address = "0.0.0.0:7777"
//! read_buffer_size = 4096
//! pipe_depth = 1
//! # max_concurrent_handlers = 256
//!
//! [logging]
//! level = "info"
//! ansi = true
//! ```

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{
    AppConfig, LoggingConfig, ServerConfig, DEFAULT_PIPE_DEPTH, DEFAULT_READ_BUFFER_SIZE,
};
