//! Configuration management.
//!
//! One TOML file configures the whole crate:
//!
//! ```toml
//! [keys]
//! key_file = "/etc/trilat/keys.csv"
//!
//! [cache]
//! data_dir = "/var/lib/trilat"
//! match_threshold = 0.2
//! max_age = "1h"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.
//! [`KeyStore::from_config`](crate::keys::KeyStore::from_config) and
//! [`Session::from_config`](crate::session::Session::from_config) consume
//! the sections.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Key registry configuration.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Scan cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))?;

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories as
    /// needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {e}")))?;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Config(format!("cannot create {}: {e}", dir.display())))?;
        }
        std::fs::write(path, text)
            .map_err(|e| Error::Config(format!("cannot write {}: {e}", path.display())))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(Error::InvalidConfig("Cache capacity must be positive".into()));
        }

        if self.cache.min_entries > self.cache.capacity {
            return Err(Error::InvalidConfig(
                "Cache min_entries cannot exceed capacity".into(),
            ));
        }

        let threshold = self.cache.match_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::InvalidConfig(
                "Cache match_threshold must be in (0, 1]".into(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::InvalidConfig(format!(
                "Unknown log format {:?} (expected \"text\" or \"json\")",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "trilat", "trilat").map_or_else(
            || PathBuf::from("trilat.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            keys: KeysConfig {
                key_file: Some("keys.csv".into()),
            },
            cache: CacheConfig {
                data_dir: Some("/var/lib/trilat".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Key registry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Path to the CSV key file.
    pub key_file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Install the global `tracing` subscriber described by `config`.
///
/// A `RUST_LOG` environment variable overrides the configured level.
/// Fails if a subscriber has already been installed in this process.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        _ => registry.with(fmt::layer().with_ansi(config.color)).try_init(),
    };
    installed.map_err(|e| Error::Config(format!("cannot install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.keys.key_file, None);
        assert_eq!(config.cache.capacity, crate::cache::DEFAULT_CAPACITY);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert!(config.logging.color);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        // A nested path exercises parent directory creation.
        let path = dir.path().join("conf").join("config.toml");

        let mut config = Config::example();
        config.cache.capacity = 50;
        config.cache.min_entries = 8;
        config.cache.max_age = Duration::from_secs(45 * 60);
        config.logging.level = "debug".into();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.keys.key_file, Some(PathBuf::from("keys.csv")));
        assert_eq!(loaded.cache.capacity, 50);
        assert_eq!(loaded.cache.min_entries, 8);
        assert_eq!(loaded.cache.max_age, Duration::from_secs(2700));
        assert_eq!(loaded.logging.level, "debug");
    }

    #[test]
    fn test_durations_use_humantime_strings() {
        let config: Config = toml::from_str("[cache]\nmax_age = \"90m\"\n").unwrap();
        assert_eq!(config.cache.max_age, Duration::from_secs(5400));
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cache = 3").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_runs_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\ncapacity = 0\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::example();
        config.cache.capacity = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_min_entries_over_capacity() {
        let mut config = Config::example();
        config.cache.capacity = 10;
        config.cache.min_entries = 11;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        for bad in [0.0, -0.5, 1.5] {
            let mut config = Config::example();
            config.cache.match_threshold = bad;
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }

        // The upper bound is inclusive.
        let mut config = Config::example();
        config.cache.match_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::example();
        config.logging.format = "yaml".into();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_init_logging_is_one_shot() {
        let config = LoggingConfig {
            level: "debug".into(),
            format: "json".into(),
            color: false,
        };
        init_logging(&config).unwrap();
        assert!(matches!(init_logging(&config), Err(Error::Config(_))));
    }
}
