//! Configuration loading for decision-api.
//!
//! Configuration is loaded from a TOML file (default: `decision-api.toml`).

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for decision-api.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    pub http: HttpConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Pull synchronization configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Deletion relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address for HTTP server (default: 127.0.0.1:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Serve the unauthenticated DELETE routes (default: true). Disable
    /// unless the listener sits behind an authenticating proxy.
    #[serde(default = "default_deletions_enabled")]
    pub deletions_enabled: bool,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// How long ended decisions stay visible to startup pulls, in seconds
    /// (default: 1 hour).
    #[serde(default = "default_expired_retention_secs")]
    pub expired_retention_secs: u64,
}

/// Pull synchronization configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Backdating applied to the "expired since last pull" window, in
    /// milliseconds (default: 2000).
    #[serde(default = "default_expired_grace_ms")]
    pub expired_grace_ms: u64,
    /// Minimum interval between pull-timestamp writes from plain lookups,
    /// in seconds (default: 60).
    #[serde(default = "default_lookup_pull_throttle_secs")]
    pub lookup_pull_throttle_secs: u64,
}

/// Deletion relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Forward deleted decisions upstream (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Queue capacity in batches (default: 100).
    #[serde(default = "default_relay_capacity")]
    pub capacity: usize,
    /// Maximum time a request waits for queue space, in milliseconds
    /// (default: 1000).
    #[serde(default = "default_relay_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum pulls and lookups per bouncer per minute (default: 120).
    #[serde(default = "default_pulls_per_minute")]
    pub pulls_per_minute: u32,
    /// Aggregate requests per second across all bouncers (default: 1000).
    #[serde(default = "default_global_requests_per_second")]
    pub global_requests_per_second: u32,
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 600).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_deletions_enabled() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("decisions.db")
}

fn default_expired_retention_secs() -> u64 {
    3600 // 1 hour
}

fn default_expired_grace_ms() -> u64 {
    2000
}

fn default_lookup_pull_throttle_secs() -> u64 {
    60
}

fn default_relay_capacity() -> usize {
    100
}

fn default_relay_send_timeout_ms() -> u64 {
    1000
}

fn default_pulls_per_minute() -> u32 {
    120
}

fn default_global_requests_per_second() -> u32 {
    1000
}

fn default_cleanup_interval() -> u64 {
    600 // 10 minutes
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_http_bind(),
            metrics_enabled: default_metrics_enabled(),
            deletions_enabled: default_deletions_enabled(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            expired_retention_secs: default_expired_retention_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            expired_grace_ms: default_expired_grace_ms(),
            lookup_pull_throttle_secs: default_lookup_pull_throttle_secs(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_relay_capacity(),
            send_timeout_ms: default_relay_send_timeout_ms(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            pulls_per_minute: default_pulls_per_minute(),
            global_requests_per_second: default_global_requests_per_second(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
            relay: RelayConfig::default(),
            limits: LimitsConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// duration does not fit a signed timestamp offset.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every configured duration is representable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.expired_retention()?;
        self.sync.expired_grace()?;
        self.sync.lookup_pull_throttle()?;
        Ok(())
    }
}

impl StorageConfig {
    /// Retention window for ended decisions.
    pub fn expired_retention(&self) -> Result<chrono::Duration, ConfigError> {
        seconds("storage.expired_retention_secs", self.expired_retention_secs)
    }
}

impl SyncConfig {
    /// Backdating of the incremental expired window.
    pub fn expired_grace(&self) -> Result<chrono::Duration, ConfigError> {
        i64::try_from(self.expired_grace_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .ok_or(ConfigError::OutOfRange {
                field: "sync.expired_grace_ms",
                value: self.expired_grace_ms,
            })
    }

    /// Minimum interval between lookup-driven pull writes.
    pub fn lookup_pull_throttle(&self) -> Result<chrono::Duration, ConfigError> {
        seconds("sync.lookup_pull_throttle_secs", self.lookup_pull_throttle_secs)
    }
}

fn seconds(field: &'static str, value: u64) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or(ConfigError::OutOfRange { field, value })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A duration setting is too large.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Offending key.
        field: &'static str,
        /// Configured value.
        value: u64,
    },
}
