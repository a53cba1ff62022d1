//! Configuration loading for the location database.
//!
//! Configuration lives in a YAML file (`locus-config.yaml` by default).
//! Every section and field is optional and falls back to the defaults
//! below. The database path can be overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::database::DEFAULT_EVENT_CAPACITY;
use crate::sqlite::{DEFAULT_DATABASE_FILE, SqliteConfig};

/// Environment variable overriding `database.path`.
pub const DATABASE_PATH_ENV: &str = "LOCUS_DATABASE_PATH";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocusConfig {
    /// Backing store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Write-behind pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LocusConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database.path = PathBuf::from(path);
        }
    }
}

/// Backing store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Database file, or `:memory:` for a private in-memory database.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Idle connection timeout in milliseconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Build the pool configuration.
    pub fn to_sqlite_config(&self) -> SqliteConfig {
        SqliteConfig::new(&self.path)
            .with_max_connections(self.max_connections)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_idle_timeout(Duration::from_millis(self.idle_timeout_ms))
    }
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_FILE)
}

const fn default_max_connections() -> u32 {
    4
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_idle_timeout_ms() -> u64 {
    300_000
}

/// Write-behind pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Buffered pipeline events per subscriber before it starts lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

const fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let mut config = LocusConfig::default();
        config.apply_overrides(|_| None);
        assert_eq!(config.database.path, PathBuf::from("storage.db"));
        assert_eq!(config.pipeline.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: LocusConfig = serde_yml::from_str(
            "database:\n  path: data/locations.db\n  max_connections: 2\nlogging:\n  json: true\n",
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("data/locations.db"));
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.connect_timeout_ms, 5_000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn env_override_replaces_path() {
        let mut config = LocusConfig::default();
        config.apply_overrides(|name| {
            (name == DATABASE_PATH_ENV).then(|| String::from(":memory:"))
        });
        assert!(config.database.to_sqlite_config().is_in_memory());
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut config = LocusConfig::default();
        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config.database.path, PathBuf::from("storage.db"));
    }

    #[test]
    fn sqlite_config_carries_timeouts() {
        let config: LocusConfig =
            serde_yml::from_str("database:\n  connect_timeout_ms: 250\n").unwrap();
        let sqlite = config.database.to_sqlite_config();
        assert_eq!(sqlite.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            LocusConfig::parse("database: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
