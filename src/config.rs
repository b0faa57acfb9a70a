//! Configuration management for the echo engine
//!
//! Runtime configuration is loaded from a JSON file so channel layout and
//! ring buffer depth can be tuned without recompiling. Missing or invalid
//! files fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::EchoError;

/// Lower bound on ring buffer depth, in buffer periods
pub const MIN_RING_BUFFER_PERIODS: u32 = 2;
/// Upper bound on ring buffer depth, in buffer periods
pub const MAX_RING_BUFFER_PERIODS: u32 = 64;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Audio path configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Channels per frame for both capture and render
    pub channel_count: u16,
    /// Ring buffer capacity expressed in buffer periods
    pub ring_buffer_periods: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            // Mono capture and playback, matching the native echo path
            channel_count: 1,
            ring_buffer_periods: 8,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Maximum level: "error", "warn", "info", "debug" or "trace"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parsed level, defaulting to INFO for unknown strings
    pub fn level_filter(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

impl EchoConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing, the JSON
    /// is malformed, or the values fail validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<EchoConfig>(&contents) {
            Ok(config) => match config.validate() {
                Ok(()) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Rejected configuration from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration for the current platform
    ///
    /// Android has no bundled config file reachable from native code, so the
    /// defaults are used there.
    pub fn load() -> Self {
        #[cfg(target_os = "android")]
        {
            log::info!("[Config] Using default configuration on Android");
            Self::default()
        }

        #[cfg(not(target_os = "android"))]
        {
            Self::load_from_file("assets/echo_config.json")
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), EchoError> {
        if self.audio.channel_count == 0 {
            return Err(EchoError::UnsupportedFormat {
                reason: "channel_count must be at least 1".to_string(),
            });
        }
        let periods = self.audio.ring_buffer_periods;
        if !(MIN_RING_BUFFER_PERIODS..=MAX_RING_BUFFER_PERIODS).contains(&periods) {
            return Err(EchoError::UnsupportedFormat {
                reason: format!(
                    "ring_buffer_periods must be in {}..={} (got {})",
                    MIN_RING_BUFFER_PERIODS, MAX_RING_BUFFER_PERIODS, periods
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EchoConfig::default();
        assert_eq!(config.audio.channel_count, 1);
        assert_eq!(config.audio.ring_buffer_periods, 8);
        assert_eq!(config.logging.level_filter(), tracing::Level::INFO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_section_defaults() {
        let parsed: EchoConfig =
            serde_json::from_str(r#"{"audio":{"channel_count":2,"ring_buffer_periods":4}}"#)
                .unwrap();
        assert_eq!(parsed.audio.channel_count, 2);
        assert_eq!(parsed.audio.ring_buffer_periods, 4);
        assert_eq!(parsed.logging, LoggingConfig::default());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = EchoConfig::default();
        config.audio.ring_buffer_periods = 1;
        assert!(config.validate().is_err());

        config.audio.ring_buffer_periods = 8;
        config.audio.channel_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = EchoConfig::load_from_file("does/not/exist/echo_config.json");
        assert_eq!(config, EchoConfig::default());
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!(
            "audio_echo_config_test_{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{"audio":{"channel_count":1,"ring_buffer_periods":500}}"#).unwrap();
        let config = EchoConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(config, EchoConfig::default());
    }

    #[test]
    fn test_unknown_level_defaults_to_info() {
        let logging = LoggingConfig {
            level: "chatty".to_string(),
        };
        assert_eq!(logging.level_filter(), tracing::Level::INFO);
        let logging = LoggingConfig {
            level: "debug".to_string(),
        };
        assert_eq!(logging.level_filter(), tracing::Level::DEBUG);
    }
}
