//! # Configuration Management
//!
//! Configuration for the stream transport and the attribute codec.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`MAL_TRANSPORT_*` variables)
//!
//! ## Sections
//! - `server`: listen address, dispatch queue depth and worker count, shutdown drain
//! - `codec`: the SPP length-field width
//! - `framing`: maximum packet payload
//! - `logging`: subscriber settings used by `utils::logging`

use crate::core::WireProfile;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Current supported packet framing version
pub const PROTOCOL_VERSION: u8 = 1;

/// Max allowed packet payload size (16 MB)
pub const MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// Default time allowed for connections to drain on shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Top-level transport configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TransportConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Attribute codec configuration
    #[serde(default)]
    pub codec: CodecConfig,

    /// Packet framing configuration
    #[serde(default)]
    pub framing: FramingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TransportConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    ///
    /// Unparseable values are ignored and leave the default in place.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MAL_TRANSPORT_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(limit) = std::env::var("MAL_TRANSPORT_BACKPRESSURE_LIMIT") {
            if let Ok(val) = limit.parse::<usize>() {
                config.server.backpressure_limit = val;
            }
        }

        if let Ok(workers) = std::env::var("MAL_TRANSPORT_DISPATCH_WORKERS") {
            if let Ok(val) = workers.parse::<usize>() {
                config.server.dispatch_workers = val;
            }
        }

        if let Ok(short) = std::env::var("MAL_TRANSPORT_SHORT_LENGTH_FIELD") {
            if let Ok(val) = short.parse::<bool>() {
                config.codec.short_length_field = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Wire profile for codecs built from this configuration
    pub fn wire_profile(&self) -> WireProfile {
        self.codec.wire_profile()
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.framing.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:9000")
    pub address: String,

    /// Depth of each dispatch queue; receivers wait when it is full
    pub backpressure_limit: usize,

    /// Number of dispatch workers (and queues)
    pub dispatch_workers: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9000"),
            backpressure_limit: 32,
            dispatch_workers: 4,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:8080')",
                self.address
            ));
        }

        if self.backpressure_limit == 0 {
            errors.push("Backpressure limit must be greater than 0".to_string());
        } else if self.backpressure_limit > 1_000_000 {
            errors.push(format!(
                "Backpressure limit too large: {} (max recommended: 1,000,000)",
                self.backpressure_limit
            ));
        }

        if self.dispatch_workers == 0 {
            errors.push("Dispatch workers must be greater than 0".to_string());
        } else if self.dispatch_workers > 1024 {
            errors.push(format!(
                "Too many dispatch workers: {} (maximum: 1024)",
                self.dispatch_workers
            ));
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Attribute codec configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CodecConfig {
    /// Use 16-bit size prefixes and list counts instead of 32-bit
    pub short_length_field: bool,
}

impl CodecConfig {
    pub fn wire_profile(&self) -> WireProfile {
        WireProfile::spp(self.short_length_field)
    }
}

/// Packet framing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FramingConfig {
    /// Maximum allowed payload size in bytes
    pub max_packet_size: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl FramingConfig {
    /// Validate framing configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_packet_size == 0 {
            errors.push("Max packet size cannot be 0".to_string());
        } else if self.max_packet_size > u32::MAX as usize {
            errors.push(format!(
                "Max packet size too large: {} bytes (length header is 32-bit)",
                self.max_packet_size
            ));
        } else if self.max_packet_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max packet size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_packet_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("mal-transport"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Duration as integer milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// tracing::Level as its lowercase name
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::LengthField;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TransportConfig::default().validate().is_empty());
    }

    #[test]
    fn test_wire_profile_follows_codec_section() {
        let config = TransportConfig::default_with_overrides(|c| c.codec.short_length_field = true);
        assert_eq!(config.wire_profile().length_field, LengthField::Short);
        assert_eq!(config.wire_profile().attribute_tag_offset, -1);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = TransportConfig::from_toml("[codec]\nshort_length_field = true\n").unwrap();
        assert!(config.codec.short_length_field);
        assert_eq!(config.server.dispatch_workers, 4);
        assert_eq!(config.framing.max_packet_size, MAX_PACKET_SIZE);
    }
}
