//! Configuration module for Notesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ConflictPolicy;

/// Environment variable that overrides `remote.api_token`.
pub const API_TOKEN_ENV: &str = "NOTESYNC_API_TOKEN";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Notesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub assets: AssetsConfig,
    pub conflicts: ConflictsConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic sync cycles.
    pub poll_interval: u64,
    /// Maximum records per batch save/delete call.
    pub batch_size: usize,
    /// Records requested per query page when pulling.
    pub page_size: usize,
}

/// Remote record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Root URL of the record store API.
    pub base_url: String,
    /// Container (database) name under the base URL.
    pub container: String,
    /// Bearer token; `NOTESYNC_API_TOKEN` takes precedence when set.
    pub api_token: Option<String>,
    /// Transport timeout per request, in seconds.
    pub request_timeout_secs: u64,
}

/// Asset compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Deflate level (1-9) for user photos.
    pub photo_quality: u32,
    /// Deflate level (1-9) for generated images. Must be at least `photo_quality`.
    pub generated_quality: u32,
    /// Maximum size of a compressed asset, in KiB.
    pub max_asset_kb: u64,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Default conflict strategy: `manual`, `keep_local`, `keep_remote`, or `last_writer_wins`.
    pub default_strategy: String,
}

/// Network reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host the probe connects to.
    pub probe_host: String,
    pub probe_port: u16,
    /// Seconds between probes.
    pub probe_interval_secs: u64,
}

/// Local database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/notesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("notesync")
            .join("config.yaml")
    }
}

impl RemoteConfig {
    /// The API token to use, preferring the environment over the file.
    pub fn resolved_api_token(&self) -> Option<String> {
        std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.api_token.clone())
    }
}

impl ConflictsConfig {
    /// The configured policy; an unparseable value falls back to `manual`.
    pub fn policy(&self) -> ConflictPolicy {
        self.default_strategy.parse().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            batch_size: 100,
            page_size: 100,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notesync.app/v1".to_string(),
            container: "default".to_string(),
            api_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            photo_quality: 6,
            generated_quality: 9,
            max_asset_kb: 10 * 1024,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "manual".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_host: "api.notesync.app".to_string(),
            probe_port: 443,
            probe_interval_secs: 15,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("notesync")
                .join("notesync.db"),
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

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

/// Valid values for `conflicts.default_strategy`.
const VALID_CONFLICT_STRATEGIES: &[&str] = &["manual", "keep_local", "keep_remote", "last_writer_wins"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- sync ---
        if self.sync.poll_interval == 0 {
            push("sync.poll_interval", "must be greater than 0".into());
        }
        if self.sync.batch_size == 0 {
            push("sync.batch_size", "must be greater than 0".into());
        }
        if self.sync.page_size == 0 {
            push("sync.page_size", "must be greater than 0".into());
        }

        // --- remote ---
        if !(self.remote.base_url.starts_with("http://") || self.remote.base_url.starts_with("https://")) {
            push(
                "remote.base_url",
                format!("must be an http(s) URL, got '{}'", self.remote.base_url),
            );
        }
        if self.remote.container.is_empty() || self.remote.container.contains('/') {
            push("remote.container", "must be a non-empty name without '/'".into());
        }
        if self.remote.request_timeout_secs == 0 {
            push("remote.request_timeout_secs", "must be greater than 0".into());
        }

        // --- assets ---
        if !(1..=9).contains(&self.assets.photo_quality) {
            push("assets.photo_quality", "must be in range 1..=9".into());
        }
        if !(1..=9).contains(&self.assets.generated_quality) {
            push("assets.generated_quality", "must be in range 1..=9".into());
        }
        if self.assets.generated_quality < self.assets.photo_quality {
            push(
                "assets.generated_quality",
                format!(
                    "generated_quality ({}) must not be below photo_quality ({})",
                    self.assets.generated_quality, self.assets.photo_quality
                ),
            );
        }
        if self.assets.max_asset_kb == 0 {
            push("assets.max_asset_kb", "must be greater than 0".into());
        }

        // --- conflicts ---
        if !VALID_CONFLICT_STRATEGIES.contains(&self.conflicts.default_strategy.as_str()) {
            push(
                "conflicts.default_strategy",
                format!(
                    "invalid strategy '{}'; valid options: {}",
                    self.conflicts.default_strategy,
                    VALID_CONFLICT_STRATEGIES.join(", ")
                ),
            );
        }

        // --- network ---
        if self.network.probe_host.is_empty() {
            push("network.probe_host", "must not be empty".into());
        }
        if self.network.probe_port == 0 {
            push("network.probe_port", "must be greater than 0".into());
        }
        if self.network.probe_interval_secs == 0 {
            push("network.probe_interval_secs", "must be greater than 0".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use notesync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .remote_base_url("https://records.example.com/v1")
///     .sync_batch_size(50)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_batch_size(mut self, n: usize) -> Self {
        self.config.sync.batch_size = n;
        self
    }

    pub fn sync_page_size(mut self, n: usize) -> Self {
        self.config.sync.page_size = n;
        self
    }

    // --- remote ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_container(mut self, container: impl Into<String>) -> Self {
        self.config.remote.container = container.into();
        self
    }

    pub fn remote_api_token(mut self, token: impl Into<String>) -> Self {
        self.config.remote.api_token = Some(token.into());
        self
    }

    pub fn remote_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.request_timeout_secs = seconds;
        self
    }

    // --- assets ---

    pub fn assets_photo_quality(mut self, level: u32) -> Self {
        self.config.assets.photo_quality = level;
        self
    }

    pub fn assets_generated_quality(mut self, level: u32) -> Self {
        self.config.assets.generated_quality = level;
        self
    }

    pub fn assets_max_asset_kb(mut self, kb: u64) -> Self {
        self.config.assets.max_asset_kb = kb;
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.default_strategy = strategy.into();
        self
    }

    // --- network ---

    pub fn network_probe(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.network.probe_host = host.into();
        self.config.network.probe_port = port;
        self
    }

    pub fn network_probe_interval_secs(mut self, seconds: u64) -> Self {
        self.config.network.probe_interval_secs = seconds;
        self
    }

    // --- storage ---

    pub fn storage_database_path(mut self, path: PathBuf) -> Self {
        self.config.storage.database_path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
