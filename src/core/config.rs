//! Configuration management for the archive server
//!
//! Settings come from a TOML file, then environment variables, then command
//! line flags. Every section has defaults so a partial file is enough.

use crate::core::error::{Error, Result};
use crate::pipeline::DrainMode;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Config file read when no path is given and it exists in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "archive-server.toml";

/// Available storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Postgres through an sqlx connection pool
    Postgres,
    /// In-process tables, lost on restart
    Memory,
}

impl std::str::FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(StorageType::Postgres),
            "memory" => Ok(StorageType::Memory),
            _ => Err(Error::config(format!(
                "Invalid storage type: {}. Valid options: postgres, memory",
                s
            ))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Database connection settings
    pub database: DatabaseConfig,

    /// Storage backend selection
    pub storage: StorageConfig,

    /// View queue pipeline
    pub pipeline: PipelineConfig,

    /// Metrics and monitoring
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: SocketAddr,

    /// Request timeout
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string
    pub url: Option<String>,

    /// Pool size
    pub max_connections: u32,

    /// How long to wait for a pooled connection
    #[serde(with = "duration_str")]
    pub connect_timeout: Duration,

    /// Apply the bundled migrations at startup
    pub run_migrations: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,
}

/// View queue pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How the drain moves rows from the queue into the views table
    pub drain_mode: DrainMode,

    /// Run the drain in-process on this interval (None = external scheduler only)
    #[serde(with = "option_duration_str")]
    pub drain_interval: Option<Duration>,

    /// Bearer token required by the drain endpoint (None = open)
    pub cron_secret: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on `/metrics`
    pub enable_prometheus: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout: Duration::from_secs(10),
            run_migrations: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Postgres,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_prometheus: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus environment variables
    ///
    /// Without an explicit path, `archive-server.toml` is read if present.
    /// The result is not validated yet; callers apply CLI overrides first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, environment-style names
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        // Server overrides
        if let Some(addr) = lookup("ARCHIVE_HTTP_ADDR") {
            self.server.http_addr = addr
                .parse()
                .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
        }

        // Database overrides
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }

        if let Some(max_conn) = lookup("ARCHIVE_MAX_CONNECTIONS") {
            self.database.max_connections = max_conn
                .parse()
                .map_err(|e| Error::config(format!("Invalid max connections: {}", e)))?;
        }

        // Storage overrides
        if let Some(storage_type) = lookup("ARCHIVE_STORAGE_TYPE") {
            self.storage.storage_type = storage_type.parse()?;
        }

        // Pipeline overrides
        if let Some(mode) = lookup("ARCHIVE_DRAIN_MODE") {
            self.pipeline.drain_mode = mode.parse()?;
        }

        if let Some(interval) = lookup("ARCHIVE_DRAIN_INTERVAL") {
            self.pipeline.drain_interval = Some(
                parse_duration(&interval)
                    .map_err(|e| Error::config(format!("Invalid drain interval: {}", e)))?,
            );
        }

        if let Some(secret) = lookup("CRON_SECRET") {
            self.pipeline.cron_secret = Some(secret);
        }

        // Logging overrides
        if let Some(level) = lookup("ARCHIVE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("ARCHIVE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.storage.storage_type == StorageType::Postgres
            && self.database.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::config(
                "Postgres storage requires database.url or DATABASE_URL",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(Error::config("database.max_connections must be at least 1"));
        }

        if let Some(interval) = self.pipeline.drain_interval {
            if interval < Duration::from_secs(1) {
                return Err(Error::config("pipeline.drain_interval must be at least 1s"));
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => return Err(Error::config("Invalid log format (expected pretty or json)")),
        }

        Ok(())
    }

    /// Secret guarding the drain endpoint, ignoring empty values
    pub fn cron_secret(&self) -> Option<&str> {
        self.pipeline
            .cron_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
    }
}

/// Parse durations like `250ms`, `30s`, `5m`, `1h` or bare seconds
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        let ms: u64 = ms.parse().map_err(|_| "Invalid milliseconds")?;
        Ok(Duration::from_millis(ms))
    } else if let Some(secs) = s.strip_suffix('s') {
        let secs: u64 = secs.parse().map_err(|_| "Invalid seconds")?;
        Ok(Duration::from_secs(secs))
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins: u64 = mins.parse().map_err(|_| "Invalid minutes")?;
        let secs = mins.checked_mul(60).ok_or("Duration too large")?;
        Ok(Duration::from_secs(secs))
    } else if let Some(hours) = s.strip_suffix('h') {
        let hours: u64 = hours.parse().map_err(|_| "Invalid hours")?;
        let secs = hours.checked_mul(3600).ok_or("Duration too large")?;
        Ok(Duration::from_secs(secs))
    } else {
        let secs: u64 = s.parse().map_err(|_| "Invalid duration format")?;
        Ok(Duration::from_secs(secs))
    }
}

fn format_duration(duration: &Duration) -> String {
    if duration.subsec_nanos() != 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}s", duration.as_secs())
    }
}

mod duration_str {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }

    /// Accepts `"30s"`-style strings and bare integer seconds
    pub(super) struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration string like '30s' or '5m', or seconds")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            super::parse_duration(value).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }
    }
}

mod option_duration_str {
    use serde::de::{Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;
    use std::time::Duration;

    use super::duration_str::DurationVisitor;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => serializer.serialize_some(&super::format_duration(duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        deserializer.deserialize_option(OptionDurationVisitor)
    }

    struct OptionDurationVisitor;

    impl<'de> Visitor<'de> for OptionDurationVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an optional duration")
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(DurationVisitor).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.storage.storage_type = StorageType::Memory;
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.http_addr.port(), 8080);
        assert_eq!(config.storage.storage_type, StorageType::Postgres);
        assert_eq!(config.pipeline.drain_mode, DrainMode::Atomic);
        assert!(config.pipeline.drain_interval.is_none());
        assert!(config.metrics.enable_prometheus);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            http_addr = "127.0.0.1:9000"
            request_timeout = "15s"

            [pipeline]
            drain_mode = "copy_then_delete"
            drain_interval = "5m"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(config.server.request_timeout, Duration::from_secs(15));
        assert_eq!(config.pipeline.drain_mode, DrainMode::CopyThenDelete);
        assert_eq!(config.pipeline.drain_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[storage]\nstorage_type = \"memory\"\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.storage.storage_type, StorageType::Memory);
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/nonexistent/archive-server.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ARCHIVE_HTTP_ADDR", "127.0.0.1:7070"),
            ("DATABASE_URL", "postgres://archive@localhost/archive"),
            ("ARCHIVE_DRAIN_MODE", "copy_then_delete"),
            ("ARCHIVE_DRAIN_INTERVAL", "90s"),
            ("CRON_SECRET", "s3cret"),
            ("ARCHIVE_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.http_addr.port(), 7070);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://archive@localhost/archive")
        );
        assert_eq!(config.pipeline.drain_mode, DrainMode::CopyThenDelete);
        assert_eq!(config.pipeline.drain_interval, Some(Duration::from_secs(90)));
        assert_eq!(config.cron_secret(), Some("s3cret"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "ARCHIVE_STORAGE_TYPE").then(|| "cassandra".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_requires_database_url_for_postgres() {
        assert!(Config::default().validate().is_err());
        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = memory_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = memory_config();
        config.pipeline.drain_interval = Some(Duration::from_millis(200));
        assert!(config.validate().is_err());

        let mut config = memory_config();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_cron_secret_is_disabled() {
        let mut config = memory_config();
        config.pipeline.cron_secret = Some(String::new());
        assert_eq!(config.cron_secret(), None);
    }

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("12").unwrap(), Duration::from_secs(12));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_integer_durations_are_seconds() {
        let config = Config::from_toml(
            r#"
            [server]
            request_timeout = 15

            [pipeline]
            drain_interval = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.server.request_timeout, Duration::from_secs(15));
        assert_eq!(config.pipeline.drain_interval, Some(Duration::from_secs(300)));
        assert!(Config::from_toml("[pipeline]\ndrain_interval = -5").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert!(parse_duration("999999999999999999h").is_err());
        assert!(parse_duration("999999999999999999m").is_err());
        assert_eq!(
            parse_duration("5124095576030431h").unwrap(),
            Duration::from_secs(5124095576030431 * 3600)
        );
    }

    #[test]
    fn test_serialize_roundtrip_keeps_durations() {
        let mut config = memory_config();
        config.pipeline.drain_interval = Some(Duration::from_secs(60));
        let text = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.pipeline.drain_interval, Some(Duration::from_secs(60)));
        assert_eq!(parsed.server.request_timeout, config.server.request_timeout);
    }
}
