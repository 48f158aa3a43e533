//! # Logging
//!
//! LAB126-style log masks and `tracing` subscriber setup.
//!
//! The mask is process-wide state: it is installed once at startup with
//! [`install_log_mask`] and only read afterwards. The core never changes it;
//! it reads the threshold through [`log_mask`] or [`LogMask::max_level`].
//!
//! ## Mask Layout
//! ```text
//! bits  8..15  debug levels 1..8
//! bit  23      info
//! bit  24      warning
//! bit  25      error
//! bit  26      critical
//! ```

use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::sync::OnceLock;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::Result;

/// Environment variable holding an `EnvFilter` directive that overrides the config
pub const LOG_ENV_VAR: &str = "LIPC_LOG";

static LOG_MASK: OnceLock<LogMask> = OnceLock::new();

/// Bit set of enabled log categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogMask(u32);

impl LogMask {
    pub const NONE: LogMask = LogMask(0);
    pub const INFO: LogMask = LogMask(0x0080 << 16);
    pub const WARNING: LogMask = LogMask(0x0100 << 16);
    pub const ERROR: LogMask = LogMask(0x0200 << 16);
    pub const CRITICAL: LogMask = LogMask(0x0400 << 16);
    pub const DEBUG_ALL: LogMask = LogMask(0x0000_FF00);
    pub const ALL: LogMask = LogMask(0xFFFF_FF00);

    /// Default mask: everything but debug output
    pub const DEFAULT: LogMask =
        LogMask(Self::INFO.0 | Self::WARNING.0 | Self::ERROR.0 | Self::CRITICAL.0);

    /// Debug level `n` (1..=8). Out-of-range levels are clamped.
    pub const fn debug(n: u8) -> LogMask {
        let n = if n < 1 {
            1
        } else if n > 8 {
            8
        } else {
            n
        };
        LogMask((1 << (n - 1)) << 8)
    }

    pub const fn from_bits(bits: u32) -> LogMask {
        LogMask(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: LogMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Most verbose `tracing` level enabled by this mask.
    ///
    /// Debug levels 5..8 map to `TRACE`, 1..4 to `DEBUG`.
    pub fn max_level(self) -> LevelFilter {
        if self.0 & 0x0000_F000 != 0 {
            LevelFilter::TRACE
        } else if self.0 & 0x0000_0F00 != 0 {
            LevelFilter::DEBUG
        } else if self.contains(Self::INFO) {
            LevelFilter::INFO
        } else if self.contains(Self::WARNING) {
            LevelFilter::WARN
        } else if self.0 & (Self::ERROR.0 | Self::CRITICAL.0) != 0 {
            LevelFilter::ERROR
        } else {
            LevelFilter::OFF
        }
    }
}

impl Default for LogMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for LogMask {
    type Output = LogMask;

    fn bitor(self, rhs: LogMask) -> LogMask {
        LogMask(self.0 | rhs.0)
    }
}

/// Install the process-wide mask. Returns `false` if one was already installed.
pub fn install_log_mask(mask: LogMask) -> bool {
    LOG_MASK.set(mask).is_ok()
}

/// The process-wide mask, or [`LogMask::DEFAULT`] if none was installed
pub fn log_mask() -> LogMask {
    LOG_MASK.get().copied().unwrap_or_default()
}

/// Install a `tracing` subscriber according to `config`.
///
/// `LIPC_LOG` takes precedence over the configured level. Calling this when a
/// global subscriber already exists leaves the existing one in place.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if let Some(bits) = config.log_mask {
        install_log_mask(LogMask::from_bits(bits));
    }

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(config.effective_level().into()));

    let installed = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if installed.is_err() {
        debug!(app = %config.app_name, "Global subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_level_bits() {
        assert_eq!(LogMask::debug(1).bits(), 0x0100);
        assert_eq!(LogMask::debug(8).bits(), 0x8000);
        assert_eq!(LogMask::debug(0), LogMask::debug(1));
        assert_eq!(LogMask::debug(9), LogMask::debug(8));
        assert!(LogMask::DEBUG_ALL.contains(LogMask::debug(4)));
    }

    #[test]
    fn test_mask_to_level() {
        assert_eq!(LogMask::NONE.max_level(), LevelFilter::OFF);
        assert_eq!(LogMask::CRITICAL.max_level(), LevelFilter::ERROR);
        assert_eq!(
            (LogMask::WARNING | LogMask::ERROR).max_level(),
            LevelFilter::WARN
        );
        assert_eq!(LogMask::DEFAULT.max_level(), LevelFilter::INFO);
        assert_eq!(LogMask::debug(2).max_level(), LevelFilter::DEBUG);
        assert_eq!(LogMask::debug(7).max_level(), LevelFilter::TRACE);
        assert_eq!(LogMask::ALL.max_level(), LevelFilter::TRACE);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }
}
