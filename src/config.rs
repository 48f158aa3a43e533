//! # Connection Configuration
//!
//! Settings read once when a LIPC connection is opened.
//!
//! The only tunable with protocol meaning is the property access timeout.
//! It is never reloaded after the connection exists.
//!
//! ## Sources
//! `LipcConfig::load()` applies, in order:
//! - Built-in defaults (10000 ms access timeout)
//! - The timeout file (`/var/local/system/lipctimeout`, a bare millisecond
//!   count; path overridable with `LIPC_TIMEOUT_FILE`)
//! - The `LIPC_ACCESS_TIMEOUT_MS` environment override
//!
//! Timeouts taken from the file or the environment are clamped to the
//! accepted range, so they never make `validate_strict` fail.
//!
//! TOML files are supported via `from_file()` / `from_toml()`.

use crate::error::{LipcError, Result};
use crate::utils::logging::LogMask;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn, Level};
use tracing_subscriber::filter::LevelFilter;

/// Max service name length in bytes
pub const MAX_SERVICE_NAME_LEN: usize = 255;

/// Default and largest accepted encoded event size
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Smallest accepted event size limit
pub const MIN_PAYLOAD_SIZE: usize = 1024;

/// Default location of the access timeout file
pub const DEFAULT_TIMEOUT_FILE: &str = "/var/local/system/lipctimeout";

/// Environment variable overriding the timeout file location
pub const TIMEOUT_FILE_ENV: &str = "LIPC_TIMEOUT_FILE";

/// Environment variable overriding the access timeout (milliseconds)
pub const ACCESS_TIMEOUT_ENV: &str = "LIPC_ACCESS_TIMEOUT_MS";

const MAX_APP_NAME_LEN: usize = 64;

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LipcConfig {
    /// Timeout for remote property access
    #[serde(with = "duration_serde")]
    pub access_timeout: Duration,

    /// Maximum encoded size of an emitted event
    pub max_payload_size: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for LipcConfig {
    fn default() -> Self {
        Self {
            access_timeout: timeout::DEFAULT_ACCESS_TIMEOUT,
            max_payload_size: MAX_PAYLOAD_SIZE,
            logging: LoggingConfig::default(),
        }
    }
}

impl LipcConfig {
    /// Defaults, then the timeout file, then the environment override.
    ///
    /// A missing timeout file is normal. An unreadable or malformed one is
    /// logged and skipped.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let path = std::env::var(TIMEOUT_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TIMEOUT_FILE));
        if let Err(e) = config.apply_timeout_file(&path) {
            warn!(error = %e, path = %path.display(), "Ignoring timeout file");
        }

        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LipcError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LipcError::Config(format!("Invalid TOML: {e}")))
    }

    /// Read the access timeout from a file holding a bare millisecond count.
    /// Values outside the accepted range are clamped to it.
    ///
    /// Returns `Ok(false)` when the file does not exist.
    pub fn apply_timeout_file<P: AsRef<Path>>(&mut self, path: P) -> Result<bool> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(false);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| LipcError::Config(format!("Failed to read timeout file: {e}")))?;
        let millis = contents.trim().parse::<u64>().map_err(|e| {
            LipcError::Config(format!("Invalid timeout {:?}: {e}", contents.trim()))
        })?;

        self.access_timeout = clamp_access_timeout(millis);
        debug!(timeout_ms = millis, path = %path.display(), "Access timeout read from file");
        Ok(true)
    }

    fn apply_env(&mut self) {
        let Ok(raw) = std::env::var(ACCESS_TIMEOUT_ENV) else {
            return;
        };
        match raw.trim().parse::<u64>() {
            Ok(millis) => self.access_timeout = clamp_access_timeout(millis),
            Err(_) => warn!(value = %raw, "Ignoring {ACCESS_TIMEOUT_ENV}"),
        }
    }

    /// Defaults with `mutator` applied on top
    pub fn default_with_overrides(mutator: impl FnOnce(&mut Self)) -> Self {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Default configuration rendered as TOML, for seeding a config file
    pub fn example_config() -> String {
        match toml::to_string_pretty(&Self::default()) {
            Ok(text) => text,
            Err(e) => format!("# example unavailable: {e}\n"),
        }
    }

    /// Write the configuration as TOML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| LipcError::Config(format!("Cannot encode config: {e}")))?;
        std::fs::write(path, text)
            .map_err(|e| LipcError::Config(format!("Cannot write config: {e}")))
    }

    /// Collect every problem with this configuration. An empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.access_timeout < timeout::MIN_ACCESS_TIMEOUT {
            problems.push(format!(
                "Access timeout too short: {:?} (minimum {:?})",
                self.access_timeout,
                timeout::MIN_ACCESS_TIMEOUT
            ));
        } else if self.access_timeout > timeout::MAX_ACCESS_TIMEOUT {
            problems.push(format!(
                "Access timeout too long: {:?} (maximum {:?})",
                self.access_timeout,
                timeout::MAX_ACCESS_TIMEOUT
            ));
        }

        match self.max_payload_size {
            0 => problems.push("Event payload limit cannot be 0".to_string()),
            n if n < MIN_PAYLOAD_SIZE => problems.push(format!(
                "Event payload limit too small: {n} bytes (minimum {MIN_PAYLOAD_SIZE})"
            )),
            n if n > MAX_PAYLOAD_SIZE => problems.push(format!(
                "Event payload limit too large: {n} bytes (maximum {MAX_PAYLOAD_SIZE})"
            )),
            _ => {}
        }

        problems.extend(self.logging.validate());
        problems
    }

    /// [`LipcConfig::validate`] folded into a single `Config` error
    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(LipcError::Config(format!(
            "Configuration validation failed: {}",
            problems.join("; ")
        )))
    }
}

/// Externally supplied timeouts never make a connection unopenable
fn clamp_access_timeout(millis: u64) -> Duration {
    let requested = Duration::from_millis(millis);
    let clamped = requested.clamp(timeout::MIN_ACCESS_TIMEOUT, timeout::MAX_ACCESS_TIMEOUT);
    if clamped != requested {
        warn!(
            requested_ms = millis,
            applied_ms = clamped.as_millis() as u64,
            "Access timeout out of range, clamped"
        );
    }
    clamped
}

/// How a connection's process logs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Name attached to every log line
    pub app_name: String,

    /// Level used when no mask is configured
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// LAB126 log mask; takes precedence over `log_level` when set
    #[serde(default)]
    pub log_mask: Option<u32>,

    /// Emit JSON lines instead of the human-readable format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: "lipc".to_string(),
            log_level: Level::INFO,
            log_mask: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Level filter derived from the mask if present, otherwise from `log_level`
    pub fn effective_level(&self) -> LevelFilter {
        match self.log_mask {
            Some(bits) => LogMask::from_bits(bits).max_level(),
            None => LevelFilter::from_level(self.log_level),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        match self.app_name.len() {
            0 => problems.push("Logging app name cannot be empty".to_string()),
            n if n > MAX_APP_NAME_LEN => problems.push(format!(
                "Logging app name is {n} bytes (maximum {MAX_APP_NAME_LEN})"
            )),
            _ => {}
        }

        if let Some(bits) = self.log_mask {
            if bits & 0xFF != 0 {
                problems.push(format!(
                    "Log mask {bits:#010x} sets reserved low bits (0x000000FF)"
                ));
            }
        }

        problems
    }
}

/// `Duration` stored as a millisecond count
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `tracing::Level` stored as its lowercase name
mod log_level_serde {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Level>()
            .map_err(|_| D::Error::custom(format!("unknown log level {name:?}")))
    }
}
