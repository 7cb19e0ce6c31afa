//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.huginn/secrets.toml` (user, must be 0600)
//! 2. `/etc/huginn/secrets.toml` (system, must be 0600)
//!
//! Every credential falls back to its `HUGINN_*` environment variable.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Credentials;
use crate::fetch::FetchStrategy;
use crate::{HuginnError, Result};

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub topics: TopicsConfig,
}

/// Upstream endpoint and HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source tag (default: "reddit").
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Listing base URL; derived from whether credentials exist when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Connect timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            base_url: None,
            token_url: None,
            user_agent: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_tag() -> String {
    crate::upstream::DEFAULT_SOURCE_TAG.to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

/// Request budget.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per window (default: 60).
    #[serde(default = "default_requests")]
    pub requests: u32,
    /// Window length in seconds (default: 60).
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            window_secs: default_window(),
        }
    }
}

fn default_requests() -> u32 {
    60
}

fn default_window() -> u64 {
    60
}

/// Queue sizing and persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Snapshot directory (default: `~/.cache/huginn`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Never touch disk (default: false).
    #[serde(default)]
    pub in_memory: bool,
    /// Snapshot TTL in seconds (default: 600).
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,
    /// Queue capacity per topic (default: 200).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Refill below this many queued candidates (default: 20).
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: usize,
    /// Refill at least this often, in seconds (default: 1800).
    #[serde(default = "default_refill_interval")]
    pub refill_interval_secs: u64,
    /// Topic validity cache capacity (default: 1000).
    #[serde(default = "default_validity_capacity")]
    pub validity_capacity: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: None,
            in_memory: false,
            snapshot_ttl_secs: default_snapshot_ttl(),
            capacity: default_capacity(),
            low_water_mark: default_low_water_mark(),
            refill_interval_secs: default_refill_interval(),
            validity_capacity: default_validity_capacity(),
        }
    }
}

fn default_snapshot_ttl() -> u64 {
    600
}

fn default_capacity() -> usize {
    200
}

fn default_low_water_mark() -> usize {
    20
}

fn default_refill_interval() -> u64 {
    1800
}

fn default_validity_capacity() -> u64 {
    1000
}

/// Refill fan-out and normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSection {
    /// Posts per page (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Per-strategy timeout in seconds (default: 20).
    #[serde(default = "default_strategy_timeout")]
    pub strategy_timeout_secs: u64,
    /// Concurrent strategies (default: 3).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Serve NSFW posts (default: false).
    #[serde(default)]
    pub allow_nsfw: bool,
    /// Minimum asset width when known (default: 400).
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    /// Minimum asset height when known (default: 300).
    #[serde(default = "default_min_height")]
    pub min_height: u32,
    /// Extra hosts trusted without a file extension.
    #[serde(default)]
    pub trusted_hosts: Vec<String>,
    /// Strategies; the built-in set when empty.
    #[serde(default)]
    pub strategies: Vec<FetchStrategy>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            strategy_timeout_secs: default_strategy_timeout(),
            max_workers: default_max_workers(),
            allow_nsfw: false,
            min_width: default_min_width(),
            min_height: default_min_height(),
            trusted_hosts: Vec::new(),
            strategies: Vec::new(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_strategy_timeout() -> u64 {
    20
}

fn default_max_workers() -> usize {
    3
}

fn default_min_width() -> u32 {
    400
}

fn default_min_height() -> u32 {
    300
}

/// Seed topics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicsConfig {
    /// Random-topic seeds; the built-in list when empty.
    #[serde(default)]
    pub seeds: Vec<String>,
    /// Seeds probed per draw (default: 5).
    #[serde(default)]
    pub max_attempts: Option<usize>,
}

impl SourceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Secrets configuration (app credentials).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Environment variables consulted when a secret is missing from the file.
pub const CLIENT_ID_ENV: &str = "HUGINN_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "HUGINN_CLIENT_SECRET";
pub const USERNAME_ENV: &str = "HUGINN_USERNAME";
pub const PASSWORD_ENV: &str = "HUGINN_PASSWORD";

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    ///
    /// Without an explicit path and without any file, the defaults are used.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(explicit_path)? else {
            return Ok(Config::default());
        };
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.huginn/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/huginn/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (credentials may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".huginn").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/huginn/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    pub fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(HuginnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// App credentials, each field falling back to its environment variable.
    ///
    /// `None` unless both client id and secret are known. The password grant
    /// is used only when username and password are both present.
    pub fn credentials(&self) -> Option<Credentials> {
        let client_id = or_env(&self.client_id, CLIENT_ID_ENV)?;
        let client_secret = or_env(&self.client_secret, CLIENT_SECRET_ENV)?;
        let credentials = Credentials::new(client_id, client_secret);
        match (
            or_env(&self.username, USERNAME_ENV),
            or_env(&self.password, PASSWORD_ENV),
        ) {
            (Some(user), Some(pass)) => Some(credentials.with_password(user, pass)),
            _ => Some(credentials),
        }
    }
}

fn or_env(value: &Option<String>, var: &str) -> Option<String> {
    value
        .clone()
        .or_else(|| std::env::var(var).ok())
        .filter(|v| !v.trim().is_empty())
}
