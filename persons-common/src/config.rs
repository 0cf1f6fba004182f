//! Bootstrap configuration
//!
//! Configuration is resolved once at startup in this priority order:
//! 1. Command-line arguments / environment variables (applied by the binary)
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)
//!
//! The resulting [`Config`] value is passed by reference into each
//! component's constructor; nothing reads configuration from global state.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "persons.toml";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Outer deadline for a whole request, enrichment and persistence included
    pub request_timeout_ms: u64,
    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_ms: 30_000,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Database connection and pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// sqlx SQLite connection string
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Close connections idle longer than this (None = never)
    pub idle_timeout_ms: Option<u64>,
    /// Recycle connections older than this (None = never)
    pub max_lifetime_ms: Option<u64>,
    /// SQLite busy timeout for lock contention
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://persons.db?mode=rwc".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_ms: 5_000,
            idle_timeout_ms: Some(600_000),
            max_lifetime_ms: Some(1_800_000),
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    /// Single-connection in-memory database that never expires
    ///
    /// An in-memory SQLite database lives only as long as its connection,
    /// so the pool must keep exactly one connection open.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout_ms: None,
            max_lifetime_ms: None,
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// True for `sqlite::memory:` and `mode=memory` URLs
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// External classifier endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub age_url: String,
    pub gender_url: String,
    pub nationality_url: String,
    /// Per-request timeout for each outbound classifier call
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            age_url: "https://api.agify.io/".to_string(),
            gender_url: "https://api.genderize.io/".to_string(),
            nationality_url: "https://api.nationalize.io/".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!("Unknown log format: {}", other))),
        }
    }
}

/// [`DEFAULT_CONFIG_FILE`] if it exists in the working directory
pub fn default_config_path() -> Option<&'static Path> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    path.exists().then_some(path)
}

impl Config {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if present
    ///
    /// A missing default file is not an error: built-in defaults are used.
    /// An explicitly named file must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(default_path) => Self::from_file(default_path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse config failed: {}", e)))
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            return Err(Error::Config("http.port must be non-zero".to_string()));
        }
        if self.http.request_timeout_ms == 0 || self.http.shutdown_timeout_ms == 0 {
            return Err(Error::Config("http timeouts must be non-zero".to_string()));
        }
        if self.database.url.trim().is_empty() {
            return Err(Error::Config("database.url must be set".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(Error::Config(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }
        if self.database.acquire_timeout_ms == 0 {
            return Err(Error::Config(
                "database.acquire_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(Error::Config(
                "classifier.timeout_ms must be non-zero".to_string(),
            ));
        }
        for (key, url) in [
            ("classifier.age_url", &self.classifier.age_url),
            ("classifier.gender_url", &self.classifier.gender_url),
            ("classifier.nationality_url", &self.classifier.nationality_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    key, url
                )));
            }
        }
        Ok(())
    }
}
