//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream API and HTTP behavior
    #[serde(default)]
    pub source: SourceConfig,

    /// Crawl loop settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Clip store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Query API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Snapshot storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override selected values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(env) = std::env::var("CLIPDEX_ENV") {
            match env.parse() {
                Ok(environment) => self.crawler.environment = environment,
                Err(e) => log::warn!("Ignoring CLIPDEX_ENV: {}", e),
            }
        }

        if let Ok(base) = std::env::var("CLIPDEX_API_BASE") {
            self.source.api_base_url = base;
        }

        if let Ok(min) = std::env::var("CLIPDEX_MIN_VIEWERS") {
            if let Ok(n) = min.parse() {
                self.crawler.min_viewers = n;
            }
        }

        if let Ok(bind) = std::env::var("CLIPDEX_BIND") {
            self.server.bind = bind;
        }

        if let Ok(dir) = std::env::var("CLIPDEX_STORAGE_DIR") {
            self.storage.local_dir = dir;
        }

        if let Ok(bucket) = std::env::var("S3_BUCKET") {
            self.storage.backend = StorageBackend::S3;
            self.storage.s3_bucket = bucket;
        }

        if let Ok(prefix) = std::env::var("S3_PREFIX") {
            self.storage.s3_prefix = prefix;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.source.api_base_url)
            .map_err(|e| AppError::validation(format!("source.api_base_url: {e}")))?;
        if self.source.max_pages == 0 {
            return Err(AppError::validation("source.max_pages must be > 0"));
        }
        if self.source.max_attempts == 0 {
            return Err(AppError::validation("source.max_attempts must be > 0"));
        }
        if self.crawler.cycle_interval_secs == 0 {
            return Err(AppError::validation(
                "crawler.cycle_interval_secs must be > 0",
            ));
        }
        if self.crawler.progress_every == 0 {
            return Err(AppError::validation("crawler.progress_every must be > 0"));
        }
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(AppError::validation(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.s3_bucket.trim().is_empty() {
            return Err(AppError::validation("storage.s3_bucket is empty"));
        }
        Ok(())
    }
}

/// Upstream API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL for API requests
    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,

    /// Base URL for shareable clip links
    #[serde(default = "defaults::web_base_url")]
    pub web_base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between channel listing pages in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Upper bound on channel listing pages per discovery
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Only keep channels with this language tag
    #[serde(default)]
    pub language: Option<String>,

    /// Base delay for rate limit backoff in milliseconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Consecutive 429 responses tolerated per request
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Maximum number of cached game names
    #[serde(default = "defaults::game_cache_capacity")]
    pub game_cache_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::api_base_url(),
            web_base_url: defaults::web_base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            page_delay_ms: defaults::page_delay(),
            max_pages: defaults::max_pages(),
            language: None,
            base_delay_ms: defaults::base_delay(),
            max_attempts: defaults::max_attempts(),
            game_cache_capacity: defaults::game_cache_capacity(),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl std::str::FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(AppError::config(format!("unknown environment '{other}'"))),
        }
    }
}

/// Crawl loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default)]
    pub environment: Environment,

    /// Viewer floor for channel discovery in production
    #[serde(default = "defaults::min_viewers")]
    pub min_viewers: u64,

    /// Viewer floor in development, kept high to bound cost
    #[serde(default = "defaults::dev_min_viewers")]
    pub dev_min_viewers: u64,

    /// Seconds between crawl cycles
    #[serde(default = "defaults::cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Refresh period of the "next update" status in milliseconds
    #[serde(default = "defaults::status_refresh")]
    pub status_refresh_ms: u64,

    /// Publish a progress status every N channels
    #[serde(default = "defaults::progress_every")]
    pub progress_every: usize,

    /// How long the per-cycle "Found ..." summaries stay pinned, in seconds
    #[serde(default = "defaults::summary_status")]
    pub summary_status_secs: u64,
}

impl CrawlerConfig {
    /// Viewer floor for the configured environment.
    pub fn effective_min_viewers(&self) -> u64 {
        match self.environment {
            Environment::Production => self.min_viewers,
            Environment::Development => self.dev_min_viewers,
        }
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn status_refresh(&self) -> Duration {
        Duration::from_millis(self.status_refresh_ms.max(1))
    }

    /// Pin time of the cycle summaries. `None` leaves them unpinned.
    pub fn summary_status_ttl(&self) -> Option<Duration> {
        (self.summary_status_secs > 0).then(|| Duration::from_secs(self.summary_status_secs))
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            min_viewers: defaults::min_viewers(),
            dev_min_viewers: defaults::dev_min_viewers(),
            cycle_interval_secs: defaults::cycle_interval(),
            status_refresh_ms: defaults::status_refresh(),
            progress_every: defaults::progress_every(),
            summary_status_secs: defaults::summary_status(),
        }
    }
}

/// Clip store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Acquire timeout for housekeeping reads in milliseconds
    #[serde(default = "defaults::housekeeping_timeout")]
    pub housekeeping_timeout_ms: u64,
}

impl StoreConfig {
    pub fn housekeeping_timeout(&self) -> Duration {
        Duration::from_millis(self.housekeeping_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            housekeeping_timeout_ms: defaults::housekeeping_timeout(),
        }
    }
}

/// Query API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "defaults::bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
        }
    }
}

/// Where snapshots are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// No snapshots
    None,
    #[default]
    Local,
    S3,
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the local backend
    #[serde(default = "defaults::local_dir")]
    pub local_dir: String,

    #[serde(default)]
    pub s3_bucket: String,

    #[serde(default = "defaults::s3_prefix")]
    pub s3_prefix: String,

    /// Minimum seconds between two backups
    #[serde(default = "defaults::backup_interval")]
    pub backup_interval_secs: u64,
}

impl StorageConfig {
    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_dir: defaults::local_dir(),
            s3_bucket: String::new(),
            s3_prefix: defaults::s3_prefix(),
            backup_interval_secs: defaults::backup_interval(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn api_base_url() -> String {
        "https://mixer.com/".into()
    }
    pub fn web_base_url() -> String {
        "https://mixer.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; clipdex/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn page_delay() -> u64 {
        10
    }
    pub fn max_pages() -> u32 {
        1000
    }
    pub fn base_delay() -> u64 {
        500
    }
    pub fn max_attempts() -> u32 {
        10
    }
    pub fn game_cache_capacity() -> usize {
        10_000
    }

    // Crawler defaults
    pub fn min_viewers() -> u64 {
        2
    }
    pub fn dev_min_viewers() -> u64 {
        500
    }
    pub fn cycle_interval() -> u64 {
        300
    }
    pub fn status_refresh() -> u64 {
        1000
    }
    pub fn progress_every() -> usize {
        5
    }
    pub fn summary_status() -> u64 {
        10
    }

    // Store defaults
    pub fn housekeeping_timeout() -> u64 {
        5
    }

    // Server defaults
    pub fn bind() -> String {
        "0.0.0.0:8080".into()
    }

    // Storage defaults
    pub fn local_dir() -> String {
        "storage".into()
    }
    pub fn s3_prefix() -> String {
        "clipdex".into()
    }
    pub fn backup_interval() -> u64 {
        30 * 60
    }
}
