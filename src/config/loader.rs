//! Reads [`AppConfig`] from TOML files.

use std::io;
use std::path::Path;

use super::error::{ConfigError, ConfigResult};
use super::types::AppConfig;

/// Parses and validates configuration files.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Read and validate the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` for a missing file,
    /// `ConfigError::ReadError` if it cannot be read, and the errors of
    /// [`load_str`](Self::load_str) for its content.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::ReadError {
                path: path.to_path_buf(),
                source,
            },
        })?;
        self.load_str(&content)
    }

    /// Parse and validate TOML content. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` for malformed TOML and
    /// `ConfigError::InvalidValue` for a rejected setting.
    pub fn load_str(&self, content: &str) -> ConfigResult<AppConfig> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_str_overrides_defaults() {
        let config = ConfigLoader::new()
            .load_str(
                r#"
            [server]
            network = "tcp"
            address = "0.0.0.0:9000"
            max_concurrent_handlers = 8
        "#,
            )
            .unwrap();

        assert_eq!(config.server.network, "tcp");
        assert_eq!(config.server.address, "0.0.0.0:9000");
        assert_eq!(config.server.max_concurrent_handlers, Some(8));
        assert_eq!(config.server.read_buffer_size, 4096);
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("echo.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            network = "udp"
            pipe_depth = 8

            [logging]
            level = "debug"
            ansi = false
        "#,
        )
        .unwrap();

        let config = ConfigLoader::new().load(&path).unwrap();
        assert_eq!(config.server.pipe_depth, 8);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.ansi);
    }

    #[test]
    fn test_load_rejects_zero_buffer() {
        let result = ConfigLoader::new().load_str("[server]\nread_buffer_size = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_malformed() {
        let result = ConfigLoader::new().load_str("[server\nnetwork = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ConfigLoader::new().load(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_directory_is_read_error() {
        let dir = tempdir().unwrap();
        let result = ConfigLoader::new().load(dir.path());
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
