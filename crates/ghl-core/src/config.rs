//! Configuration module for the `ghl` CLI.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, saving, validation, defaults, dot-notation updates, and a
//! builder pattern for programmatic use.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::storage;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub rate_limiting: RateLimitingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    /// Default location (sub-account) used when no profile or env var sets one.
    pub location_id: Option<String>,
}

/// Upstream API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the v2 API.
    pub base_url: String,
    /// Value sent in the `Version` header.
    pub version: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on pages fetched by a single paginated operation.
    pub max_pages: u32,
}

/// Retry / backoff settings for a single logical operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total sends allowed for transient failures (first try included).
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub growth_factor: f64,
    pub max_delay_ms: u64,
    /// 5xx statuses treated as transient. 429 is always retried.
    pub retryable_statuses: Vec<u16>,
    /// How many 429 responses a single operation tolerates.
    pub max_rate_limit_retries: u32,
    /// Retry POST/PUT/PATCH/DELETE on a retryable 5xx.
    pub retry_writes_on_server_error: bool,
}

/// Client-side rate limiter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    pub burst_limit: u32,
    pub burst_period_secs: u64,
    pub daily_limit: u32,
    pub daily_period_secs: u64,
    /// Pause after a response whose `X-RateLimit-Remaining` is below this.
    pub low_remaining_threshold: u32,
    pub low_remaining_pause_ms: u64,
}

/// Output rendering settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// How command results are rendered on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Quiet,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [Self::Table, Self::Json, Self::Csv, Self::Quiet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Quiet => "quiet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown output format '{s}' (expected table, json, csv or quiet)"))
    }
}

// ---------------------------------------------------------------------------
// Config::load() / save()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                }
                Self::default()
            }
        }
    }

    /// Write the configuration to `path` as YAML with owner-only permissions.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self).context("failed to serialize config")?;
        storage::write_private(path, &yaml)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ghl/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        storage::config_dir().join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default base URL of the GoHighLevel v2 API.
pub const DEFAULT_BASE_URL: &str = "https://services.leadconnectorhq.com";

/// Default value of the `Version` header.
pub const DEFAULT_API_VERSION: &str = "2021-07-28";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 30,
            max_pages: 50,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            growth_factor: 2.0,
            max_delay_ms: 30_000,
            retryable_statuses: vec![500, 502, 503, 504],
            max_rate_limit_retries: 5,
            retry_writes_on_server_error: false,
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            burst_limit: 100,
            burst_period_secs: 10,
            daily_limit: 200_000,
            daily_period_secs: 86_400,
            low_remaining_threshold: 5,
            low_remaining_pause_ms: 500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.max_attempts"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- api ---
        match url::Url::parse(&self.api.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError {
                field: "api.base_url".into(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError {
                field: "api.base_url".into(),
                message: format!("not a valid URL: {e}"),
            }),
        }
        if self.api.version.trim().is_empty() {
            errors.push(ValidationError {
                field: "api.version".into(),
                message: "must not be empty".into(),
            });
        }
        positive(&mut errors, "api.timeout_secs", self.api.timeout_secs);
        positive(&mut errors, "api.max_pages", self.api.max_pages.into());

        // --- retry ---
        positive(&mut errors, "retry.max_attempts", self.retry.max_attempts.into());
        positive(&mut errors, "retry.base_delay_ms", self.retry.base_delay_ms);
        if !(self.retry.growth_factor.is_finite() && self.retry.growth_factor >= 1.0) {
            errors.push(ValidationError {
                field: "retry.growth_factor".into(),
                message: format!("must be a finite number >= 1.0, got {}", self.retry.growth_factor),
            });
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            errors.push(ValidationError {
                field: "retry.max_delay_ms".into(),
                message: format!(
                    "must be >= retry.base_delay_ms ({} < {})",
                    self.retry.max_delay_ms, self.retry.base_delay_ms
                ),
            });
        }
        for status in &self.retry.retryable_statuses {
            if !(500..=599).contains(status) {
                errors.push(ValidationError {
                    field: "retry.retryable_statuses".into(),
                    message: format!("{status} is not a 5xx status"),
                });
            }
        }

        // --- rate_limiting ---
        positive(&mut errors, "rate_limiting.burst_limit", self.rate_limiting.burst_limit.into());
        positive(&mut errors, "rate_limiting.burst_period_secs", self.rate_limiting.burst_period_secs);
        positive(&mut errors, "rate_limiting.daily_limit", self.rate_limiting.daily_limit.into());
        positive(&mut errors, "rate_limiting.daily_period_secs", self.rate_limiting.daily_period_secs);
        if self.rate_limiting.daily_limit < self.rate_limiting.burst_limit {
            errors.push(ValidationError {
                field: "rate_limiting.daily_limit".into(),
                message: "must be >= rate_limiting.burst_limit".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid log level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- location_id ---
        if let Some(location) = &self.location_id {
            if let Err(e) = crate::domain::LocationId::new(location.clone()) {
                errors.push(ValidationError {
                    field: "location_id".into(),
                    message: e.to_string(),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Dot-notation updates (`ghl config set retry.max_attempts 6`)
// ---------------------------------------------------------------------------

impl Config {
    /// Every settable dotted key, in file order.
    pub fn keys() -> Vec<String> {
        let mut keys = Vec::new();
        if let Ok(serde_yaml::Value::Mapping(root)) = serde_yaml::to_value(Config::default()) {
            for (section, value) in root {
                let Some(section) = section.as_str() else { continue };
                match value {
                    serde_yaml::Value::Mapping(fields) => {
                        for field in fields.keys().filter_map(|k| k.as_str()) {
                            keys.push(format!("{section}.{field}"));
                        }
                    }
                    _ => keys.push(section.to_string()),
                }
            }
        }
        keys
    }

    /// Set a single value addressed by a dotted key.
    ///
    /// `value` is parsed as a YAML scalar (or flow sequence), so numbers,
    /// booleans and `[500, 503]` lists work as expected. An empty value or
    /// `null` clears optional keys. The resulting config must still
    /// deserialize; type mismatches are reported as errors.
    pub fn set_value(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if !Self::keys().iter().any(|k| k == key) {
            anyhow::bail!("unknown config key '{key}'");
        }

        let root = serde_yaml::to_value(&*self).context("failed to serialize config")?;
        let parsed: serde_yaml::Value = if value.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(value).unwrap_or_else(|_| serde_yaml::Value::String(value.to_string()))
        };

        let attempt = |replacement: serde_yaml::Value| -> anyhow::Result<Config> {
            let mut root = root.clone();
            let mut slot = &mut root;
            for part in key.split('.') {
                slot = slot
                    .get_mut(part)
                    .with_context(|| format!("unknown config key '{key}'"))?;
            }
            *slot = replacement;
            serde_yaml::from_value(root)
                .with_context(|| format!("invalid value '{value}' for '{key}'"))
        };

        // `location_id: 12345` parses as a number; fall back to the raw string.
        let updated = match attempt(parsed.clone()) {
            Ok(config) => config,
            Err(_) if !parsed.is_string() && !parsed.is_null() => {
                attempt(serde_yaml::Value::String(value.to_string()))?
            }
            Err(e) => return Err(e),
        };
        *self = updated;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
///
/// ```
/// use ghl_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .base_url("http://127.0.0.1:8080")
///     .max_attempts(2)
///     .build();
/// assert_eq!(config.retry.max_attempts, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api.version = version.into();
        self
    }

    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.timeout_secs = seconds;
        self
    }

    pub fn max_pages(mut self, pages: u32) -> Self {
        self.config.api.max_pages = pages;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay_ms = ms;
        self
    }

    pub fn max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_rate_limit_retries = retries;
        self
    }

    pub fn retry_writes_on_server_error(mut self, enabled: bool) -> Self {
        self.config.retry.retry_writes_on_server_error = enabled;
        self
    }

    pub fn burst(mut self, limit: u32, period_secs: u64) -> Self {
        self.config.rate_limiting.burst_limit = limit;
        self.config.rate_limiting.burst_period_secs = period_secs;
        self
    }

    pub fn daily(mut self, limit: u32, period_secs: u64) -> Self {
        self.config.rate_limiting.daily_limit = limit;
        self.config.rate_limiting.daily_period_secs = period_secs;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output.format = format;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn location_id(mut self, location: impl Into<String>) -> Self {
        self.config.location_id = Some(location.into());
        self
    }

    /// Build the configuration without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate; returns the errors if any.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
