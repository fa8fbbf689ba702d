//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use mal_transport::config::{
    CodecConfig, FramingConfig, LoggingConfig, ServerConfig, TransportConfig, MAX_PACKET_SIZE,
};
use mal_transport::core::LengthField;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = TransportConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_server_address() {
    let mut config = TransportConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = TransportConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_backpressure_limit() {
    let config = ServerConfig {
        backpressure_limit: 0,
        ..ServerConfig::default()
    };
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Backpressure limit")));
}

#[test]
fn test_zero_dispatch_workers() {
    let config = ServerConfig {
        dispatch_workers: 0,
        ..ServerConfig::default()
    };
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Dispatch workers")));
}

#[test]
fn test_shutdown_timeout_bounds() {
    let short = ServerConfig {
        shutdown_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    };
    assert!(short.validate().iter().any(|e| e.contains("too short")));

    let long = ServerConfig {
        shutdown_timeout: Duration::from_secs(120),
        ..ServerConfig::default()
    };
    assert!(long.validate().iter().any(|e| e.contains("too long")));
}

#[test]
fn test_max_packet_size_bounds() {
    let zero = FramingConfig { max_packet_size: 0 };
    assert!(!zero.validate().is_empty());

    let huge = FramingConfig {
        max_packet_size: 200 * 1024 * 1024,
    };
    assert!(huge.validate().iter().any(|e| e.contains("too large")));

    assert!(FramingConfig::default().validate().is_empty());
}

#[test]
fn test_empty_app_name() {
    let config = LoggingConfig {
        app_name: String::new(),
        ..LoggingConfig::default()
    };
    assert!(config.validate().iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_validate_strict_joins_errors() {
    let config = TransportConfig::default_with_overrides(|c| {
        c.server.address = String::new();
        c.server.dispatch_workers = 0;
    });
    let err = config.validate_strict().expect_err("should fail");
    let message = err.to_string();
    assert!(message.contains("Configuration validation failed"));
    assert!(message.contains("Dispatch workers"));
}

#[test]
fn test_toml_roundtrip() {
    let config = TransportConfig::default_with_overrides(|c| {
        c.server.address = "0.0.0.0:7000".to_string();
        c.server.shutdown_timeout = Duration::from_secs(3);
        c.codec = CodecConfig {
            short_length_field: true,
        };
        c.logging.log_level = Level::DEBUG;
    });

    let text = toml::to_string_pretty(&config).expect("serialize");
    let parsed = TransportConfig::from_toml(&text).expect("parse");

    assert_eq!(parsed.server.address, "0.0.0.0:7000");
    assert_eq!(parsed.server.shutdown_timeout, Duration::from_secs(3));
    assert!(parsed.codec.short_length_field);
    assert_eq!(parsed.logging.log_level, Level::DEBUG);
    assert_eq!(parsed.wire_profile().length_field, LengthField::Short);
}

#[test]
fn test_example_config_parses() {
    let example = TransportConfig::example_config();
    let parsed = TransportConfig::from_toml(&example).expect("example config should parse");
    assert_eq!(parsed.framing.max_packet_size, MAX_PACKET_SIZE);
}

#[test]
fn test_invalid_log_level_rejected() {
    let text = "[logging]\napp_name = \"x\"\nlog_level = \"loud\"\njson_format = false\n";
    assert!(TransportConfig::from_toml(text).is_err());
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("mal-transport-{}.toml", std::process::id()));
    let config = TransportConfig::default_with_overrides(|c| c.server.dispatch_workers = 9);

    config.save_to_file(&path).expect("save");
    let loaded = TransportConfig::from_file(&path).expect("load");
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.server.dispatch_workers, 9);
}
