//! Integration tests for configuration validation and loading

#![allow(clippy::expect_used, clippy::unwrap_used)]

use lipc::config::{LipcConfig, LoggingConfig, MAX_PAYLOAD_SIZE};
use lipc::utils::logging::LogMask;
use lipc::LipcError;
use std::io::Write;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

#[test]
fn test_default_config_validates() {
    let config = LipcConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.access_timeout, Duration::from_millis(10_000));
    assert_eq!(config.max_payload_size, MAX_PAYLOAD_SIZE);
}

#[test]
fn test_short_access_timeout() {
    let mut config = LipcConfig::default();
    config.access_timeout = Duration::from_millis(1);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Access timeout too short")));
}

#[test]
fn test_long_access_timeout() {
    let mut config = LipcConfig::default();
    config.access_timeout = Duration::from_secs(3600);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Access timeout too long")));
}

#[test]
fn test_zero_payload_size() {
    let mut config = LipcConfig::default();
    config.max_payload_size = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be 0")));
}

#[test]
fn test_small_payload_size() {
    let mut config = LipcConfig::default();
    config.max_payload_size = 512;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("too small")));
}

#[test]
fn test_empty_app_name() {
    let mut config = LipcConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_log_mask_reserved_bits() {
    let mut config = LipcConfig::default();
    config.logging.log_mask = Some(0x0000_0001);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("reserved low bits")));
}

#[test]
fn test_multiple_errors_collected() {
    let mut config = LipcConfig::default();
    config.access_timeout = Duration::from_millis(1);
    config.max_payload_size = 0;
    config.logging.app_name = String::new();

    assert_eq!(config.validate().len(), 3);
}

#[test]
fn test_validate_strict() {
    let mut config = LipcConfig::default();
    assert!(config.validate_strict().is_ok());

    config.max_payload_size = 0;
    match config.validate_strict() {
        Err(LipcError::Config(msg)) => {
            assert!(msg.contains("Configuration validation failed"));
        }
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn test_toml_roundtrip() {
    let config = LipcConfig::default_with_overrides(|c| {
        c.access_timeout = Duration::from_millis(2500);
        c.logging.log_level = Level::DEBUG;
        c.logging.log_mask = Some(LogMask::ERROR.bits());
    });

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("lipc.toml");
    config.save_to_file(&path).expect("save");

    let loaded = LipcConfig::from_file(&path).expect("load");
    assert_eq!(loaded.access_timeout, Duration::from_millis(2500));
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert_eq!(loaded.logging.log_mask, Some(LogMask::ERROR.bits()));
}

#[test]
fn test_toml_invalid_log_level() {
    let toml = r#"
        access_timeout = 100
        max_payload_size = 4096

        [logging]
        app_name = "lipc"
        log_level = "loud"
        json_format = false
    "#;
    assert!(matches!(
        LipcConfig::from_toml(toml),
        Err(LipcError::Config(_))
    ));
}

#[test]
fn test_example_config_parses() {
    let example = LipcConfig::example_config();
    let parsed = LipcConfig::from_toml(&example).expect("example config should parse");
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_timeout_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "2500").unwrap();

    let mut config = LipcConfig::default();
    assert!(config.apply_timeout_file(file.path()).unwrap());
    assert_eq!(config.access_timeout, Duration::from_millis(2500));
}

#[test]
fn test_missing_timeout_file_keeps_default() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = LipcConfig::default();
    assert!(!config
        .apply_timeout_file(dir.path().join("lipctimeout"))
        .unwrap());
    assert_eq!(config.access_timeout, Duration::from_millis(10_000));
}

#[test]
fn test_malformed_timeout_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "ten seconds").unwrap();

    let mut config = LipcConfig::default();
    assert!(matches!(
        config.apply_timeout_file(file.path()),
        Err(LipcError::Config(_))
    ));
    assert_eq!(config.access_timeout, Duration::from_millis(10_000));
}

#[test]
fn test_effective_level_prefers_mask() {
    let mut logging = LoggingConfig::default();
    assert_eq!(logging.effective_level(), LevelFilter::INFO);

    logging.log_mask = Some(LogMask::ERROR.bits());
    assert_eq!(logging.effective_level(), LevelFilter::ERROR);

    logging.log_mask = Some(LogMask::NONE.bits());
    assert_eq!(logging.effective_level(), LevelFilter::OFF);
}

#[test]
fn test_out_of_range_timeout_file_is_clamped() {
    let mut long = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(long, "900000").unwrap();
    let mut config = LipcConfig::default();
    assert!(config.apply_timeout_file(long.path()).unwrap());
    assert_eq!(config.access_timeout, Duration::from_secs(600));
    assert!(config.validate_strict().is_ok());

    let mut short = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(short, "5").unwrap();
    assert!(config.apply_timeout_file(short.path()).unwrap());
    assert_eq!(config.access_timeout, Duration::from_millis(10));
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_clamped_timeout_still_opens_connection() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "900000").unwrap();
    let mut config = LipcConfig::default();
    config.apply_timeout_file(file.path()).unwrap();

    let bus = lipc::LocalBus::new();
    let lipc = lipc::Lipc::open_with_config(bus.shared(), Some("com.example"), config)
        .expect("a clamped timeout must not block open");
    assert_eq!(lipc.prop_access_timeout(), Duration::from_secs(600));
}
