//! Logger configuration snapshot
//!
//! A `LoggerConfig` is immutable once handed to the logger. Reconfiguration
//! replaces the whole snapshot, so readers always observe a consistent set
//! of sink flags, file limits and server settings.

use super::environment::Environment;
use super::error::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FILE_LOCATION: &str = "/var/log/golog.log";
pub const DEFAULT_FILE_MAX_SIZE_MB: u64 = 128;
pub const DEFAULT_FILE_MAX_BACKUPS: usize = 3;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the batch endpoint on the log server
pub const CREATE_MANY_PATH: &str = "/log/create-many";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Deployment environment stamped on every record
    pub environment: Environment,

    /// Print records on standard output
    pub log_stdout: bool,
    /// Colour the level tag on standard output
    pub stdout_colors: bool,

    /// Append records to a rotating local file
    pub log_file: bool,
    pub file_location: PathBuf,
    /// Size in megabytes before the file is rotated
    pub file_max_size: u64,
    /// Rotated files to keep; 0 keeps all of them
    pub file_max_backups: usize,
    /// Gzip rotated files
    pub file_compress: bool,

    /// Batch records to the remote log server
    pub log_server: bool,
    pub server_api_protocol: String,
    pub server_api_host: String,
    pub server_api_port: String,
    /// Sent as the `Platform-Name` header
    pub server_platform: String,
    /// Shared secret for the window token
    pub server_key: String,
    /// Skip TLS certificate verification toward the server
    pub insecure_skip_verify: bool,

    pub flush_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            log_stdout: true,
            stdout_colors: false,
            log_file: true,
            file_location: PathBuf::from(DEFAULT_FILE_LOCATION),
            file_max_size: DEFAULT_FILE_MAX_SIZE_MB,
            file_max_backups: DEFAULT_FILE_MAX_BACKUPS,
            file_compress: false,
            log_server: false,
            server_api_protocol: String::new(),
            server_api_host: String::new(),
            server_api_port: String::new(),
            server_platform: String::new(),
            server_key: String::new(),
            insecure_skip_verify: false,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

impl LoggerConfig {
    /// Configuration with every sink disabled
    pub fn disabled() -> Self {
        Self {
            log_stdout: false,
            log_file: false,
            log_server: false,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    ///
    /// # Example
    ///
    /// ```
    /// use logrelay::LoggerConfig;
    ///
    /// let config = LoggerConfig::from_json_str(r#"{"log_file": false, "environment": "prod"}"#).unwrap();
    /// assert!(config.log_stdout);
    /// assert!(!config.log_file);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "reading logger config",
                format!("cannot read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&content)
    }

    /// Check that every enabled sink has what it needs
    pub fn validate(&self) -> Result<()> {
        if self.log_file {
            if self.file_location.as_os_str().is_empty() {
                return Err(LoggerError::config("file", "file_location is empty"));
            }
            if self.file_max_size == 0 {
                return Err(LoggerError::config("file", "file_max_size must be at least 1 MB"));
            }
        }

        if self.log_server {
            if !matches!(self.server_api_protocol.as_str(), "http" | "https") {
                return Err(LoggerError::config(
                    "server",
                    format!(
                        "server_api_protocol must be http or https, got '{}'",
                        self.server_api_protocol
                    ),
                ));
            }
            if self.server_api_host.is_empty() {
                return Err(LoggerError::config("server", "server_api_host is empty"));
            }
            if self.server_api_port.parse::<u16>().is_err() {
                return Err(LoggerError::config(
                    "server",
                    format!("server_api_port '{}' is not a port", self.server_api_port),
                ));
            }
        }

        if self.flush_interval_ms == 0 {
            return Err(LoggerError::config("dispatcher", "flush_interval_ms must be positive"));
        }
        if self.request_timeout_ms == 0 {
            return Err(LoggerError::config("server", "request_timeout_ms must be positive"));
        }

        Ok(())
    }

    /// `<protocol>://<host>:<port>/log/create-many`
    pub fn server_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.server_api_protocol, self.server_api_host, self.server_api_port, CREATE_MANY_PATH
        )
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Rotation limit in bytes
    pub fn file_max_bytes(&self) -> u64 {
        self.file_max_size.saturating_mul(1024 * 1024)
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("environment", &self.environment)
            .field("log_stdout", &self.log_stdout)
            .field("stdout_colors", &self.stdout_colors)
            .field("log_file", &self.log_file)
            .field("file_location", &self.file_location)
            .field("file_max_size", &self.file_max_size)
            .field("file_max_backups", &self.file_max_backups)
            .field("file_compress", &self.file_compress)
            .field("log_server", &self.log_server)
            .field("server_api_protocol", &self.server_api_protocol)
            .field("server_api_host", &self.server_api_host)
            .field("server_api_port", &self.server_api_port)
            .field("server_platform", &self.server_platform)
            .field("server_key", &"<redacted>")
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("flush_interval_ms", &self.flush_interval_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_config() -> LoggerConfig {
        LoggerConfig {
            log_server: true,
            server_api_protocol: "https".to_string(),
            server_api_host: "api.example.com".to_string(),
            server_api_port: "443".to_string(),
            server_platform: "billing".to_string(),
            server_key: "abc".to_string(),
            ..LoggerConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert!(config.log_stdout);
        assert!(config.log_file);
        assert!(!config.log_server);
        assert!(!config.insecure_skip_verify);
        assert_eq!(config.file_location, PathBuf::from("/var/log/golog.log"));
        assert_eq!(config.file_max_size, 128);
        assert_eq!(config.file_max_backups, 3);
        assert_eq!(config.flush_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_url() {
        assert_eq!(
            server_config().server_url(),
            "https://api.example.com:443/log/create-many"
        );
    }

    #[test]
    fn test_validate_rejects_incomplete_server() {
        let mut config = server_config();
        config.server_api_host.clear();
        assert!(matches!(
            config.validate(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));

        let mut config = server_config();
        config.server_api_port = "https".to_string();
        assert!(config.validate().is_err());

        let mut config = server_config();
        config.server_api_protocol = "ftp".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let config = LoggerConfig {
            flush_interval_ms: 0,
            ..LoggerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoggerConfig {
            request_timeout_ms: 0,
            ..LoggerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_from_json_str() {
        let config = LoggerConfig::from_json_str(
            r#"{
                "environment": "production",
                "log_file": false,
                "log_server": true,
                "server_api_protocol": "http",
                "server_api_host": "127.0.0.1",
                "server_api_port": "8080",
                "flush_interval_ms": 250
            }"#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert!(config.log_stdout);
        assert_eq!(config.flush_interval(), Duration::from_millis(250));
        assert_eq!(config.server_url(), "http://127.0.0.1:8080/log/create-many");
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let err = LoggerConfig::from_json_str(r#"{"log_sever": true}"#).unwrap_err();
        assert!(matches!(err, LoggerError::JsonError(_)));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logger.json");
        std::fs::write(&path, r#"{"log_stdout": false, "file_max_backups": 7}"#).unwrap();

        let config = LoggerConfig::from_json_file(&path).unwrap();
        assert!(!config.log_stdout);
        assert_eq!(config.file_max_backups, 7);

        let missing = LoggerConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(LoggerError::IoOperation { .. })));
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", server_config());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("\"abc\""));
    }
}
