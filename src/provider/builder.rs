//! Builder for configuring media providers

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use super::{Inner, MediaProvider, TopicPreferences};
use crate::auth::{AccessTokenProvider, Credentials, DEFAULT_TOKEN_URL};
use crate::cache::{
    DEFAULT_VALIDITY_CACHE_MAX, PersistentCacheStore, QUEUES_FILE, QueueConfig, TOPICS_FILE,
    TopicValidityCache, ValidityStore,
};
use crate::config::{Config, Secrets};
use crate::fetch::{FetchConfig, FetchOrchestrator, FetchStrategy};
use crate::normalize::{NormalizerConfig, PostNormalizer, ValidityFilter};
use crate::ratelimit::{RateLimit, RateLimiter};
use crate::topic::{DEFAULT_MAX_ATTEMPTS, TopicKeyResolver};
use crate::types::TopicKey;
use crate::upstream::{
    DEFAULT_BASE_URL, DEFAULT_SOURCE_TAG, GuardedSource, HttpConfig, HttpListingClient,
    ListingSource,
};
use crate::{HuginnError, Result};

/// Listing host used when no credentials are configured.
pub const PUBLIC_BASE_URL: &str = "https://www.reddit.com";

/// Default snapshot time-to-live.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(10 * 60);

/// Seed topics used when none are configured.
pub const DEFAULT_SEED_TOPICS: &[&str] = &[
    "pics",
    "earthporn",
    "aww",
    "itookapicture",
    "mildlyinteresting",
    "cityporn",
    "wallpapers",
    "cats",
];

/// Default cache directory: `~/.cache/huginn`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("huginn")
}

/// Builder for [`MediaProvider`].
///
/// ```rust,no_run
/// # use huginn::{Credentials, MediaProvider, QueueConfig};
/// # fn main() -> huginn::Result<()> {
/// let provider = MediaProvider::builder()
///     .credentials(Credentials::new("client-id", "client-secret"))
///     .user_agent("my-bot/1.0 by u/someone")
///     .queue(QueueConfig::new().capacity(100))
///     .seed_topics(["pics", "aww"])
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct MediaProviderBuilder {
    source_tag: String,
    base_url: Option<String>,
    token_url: Option<String>,
    credentials: Option<Credentials>,
    http: HttpConfig,
    rate_limit: RateLimit,
    rate_limiter: Option<Arc<RateLimiter>>,
    cache_dir: Option<PathBuf>,
    in_memory: bool,
    snapshot_ttl: Duration,
    queue: QueueConfig,
    fetch: FetchConfig,
    strategies: Vec<FetchStrategy>,
    normalizer: NormalizerConfig,
    seed_topics: Vec<String>,
    max_topic_attempts: usize,
    validity_capacity: u64,
    preferences: Option<Arc<dyn TopicPreferences>>,
    listing_source: Option<Arc<dyn ListingSource>>,
}

impl Default for MediaProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProviderBuilder {
    pub fn new() -> Self {
        Self {
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            base_url: None,
            token_url: None,
            credentials: None,
            http: HttpConfig::default(),
            rate_limit: RateLimit::default(),
            rate_limiter: None,
            cache_dir: None,
            in_memory: false,
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            queue: QueueConfig::default(),
            fetch: FetchConfig::default(),
            strategies: FetchStrategy::defaults(),
            normalizer: NormalizerConfig::default(),
            seed_topics: DEFAULT_SEED_TOPICS.iter().map(|s| s.to_string()).collect(),
            max_topic_attempts: DEFAULT_MAX_ATTEMPTS,
            validity_capacity: DEFAULT_VALIDITY_CACHE_MAX,
            preferences: None,
            listing_source: None,
        }
    }

    /// A builder preloaded from file configuration and secrets.
    ///
    /// Credentials are applied when the secrets (or their environment
    /// fallbacks) carry a client id and secret.
    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        let mut builder = Self::new()
            .source_tag(config.source.tag.clone())
            .http(HttpConfig {
                user_agent: config
                    .source
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| HttpConfig::default().user_agent),
                connect_timeout: config.source.connect_timeout(),
                request_timeout: config.source.request_timeout(),
            })
            .rate_limit(RateLimit::new(
                config.rate_limit.requests,
                Duration::from_secs(config.rate_limit.window_secs),
            ))
            .snapshot_ttl(Duration::from_secs(config.cache.snapshot_ttl_secs))
            .queue(
                QueueConfig::new()
                    .capacity(config.cache.capacity)
                    .low_water_mark(config.cache.low_water_mark)
                    .refill_interval(Duration::from_secs(config.cache.refill_interval_secs)),
            )
            .validity_capacity(config.cache.validity_capacity)
            .fetch(
                FetchConfig::new()
                    .page_size(config.fetch.page_size)
                    .strategy_timeout(Duration::from_secs(config.fetch.strategy_timeout_secs))
                    .max_workers(config.fetch.max_workers),
            );

        let mut filter =
            ValidityFilter::new().min_dimensions(config.fetch.min_width, config.fetch.min_height);
        for host in &config.fetch.trusted_hosts {
            filter = filter.trusted_host(host.clone());
        }
        builder = builder.normalizer(
            NormalizerConfig::new()
                .filter(filter)
                .allow_nsfw(config.fetch.allow_nsfw),
        );

        if !config.fetch.strategies.is_empty() {
            builder = builder.strategies(config.fetch.strategies.clone());
        }
        if !config.topics.seeds.is_empty() {
            builder = builder.seed_topics(config.topics.seeds.iter().cloned());
        }
        if let Some(attempts) = config.topics.max_attempts {
            builder = builder.max_topic_attempts(attempts);
        }
        if let Some(url) = &config.source.base_url {
            builder = builder.base_url(url.clone());
        }
        if let Some(url) = &config.source.token_url {
            builder = builder.token_url(url.clone());
        }
        if config.cache.in_memory {
            builder = builder.in_memory();
        } else if let Some(dir) = &config.cache.dir {
            builder = builder.cache_dir(dir.clone());
        }
        if let Some(credentials) = secrets.credentials() {
            builder = builder.credentials(credentials);
        }
        builder
    }

    /// Source tag used for logs, metrics, rate limiting and the cache
    /// subdirectory. Default: "reddit".
    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = tag.into();
        self
    }

    /// Listing API base URL. Defaults to the authenticated host when
    /// credentials are set and the public host otherwise.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Authenticate upstream calls with these app credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.http.user_agent = agent.into();
        self
    }

    /// HTTP timeouts and user agent.
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Request budget for this source. Default: 60 per minute.
    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = limit;
        self
    }

    /// Share an existing limiter (e.g. across providers); overrides
    /// [`rate_limit`](Self::rate_limit).
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Directory for queue and topic snapshots. Default: `~/.cache/huginn`.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self.in_memory = false;
        self
    }

    /// Keep all state in memory; nothing is read from or written to disk.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Snapshot entries older than this are discarded on load. Default: 10 minutes.
    pub fn snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }

    pub fn queue(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    pub fn fetch(mut self, config: FetchConfig) -> Self {
        self.fetch = config;
        self
    }

    /// Replace the default strategies (`hot`, `top-week`, `new`).
    pub fn strategies(mut self, strategies: Vec<FetchStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn normalizer(mut self, config: NormalizerConfig) -> Self {
        self.normalizer = config;
        self
    }

    /// Topics drawn from when no topic is requested.
    pub fn seed_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Seeds probed per random-topic draw. Default: 5.
    pub fn max_topic_attempts(mut self, attempts: usize) -> Self {
        self.max_topic_attempts = attempts;
        self
    }

    /// Capacity of the topic validity cache. Default: 1,000.
    pub fn validity_capacity(mut self, capacity: u64) -> Self {
        self.validity_capacity = capacity;
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn TopicPreferences>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Use a custom listing source instead of the HTTP client.
    pub fn listing_source(mut self, source: Arc<dyn ListingSource>) -> Self {
        self.listing_source = Some(source);
        self
    }

    /// Build the provider.
    ///
    /// Opens (or creates) the snapshot files; unreadable snapshots start
    /// empty. Fails on invalid seed topics or an HTTP client that cannot be
    /// built.
    pub fn build(self) -> Result<MediaProvider> {
        let seeds = self
            .seed_topics
            .iter()
            .map(|raw| {
                TopicKey::parse(raw).map_err(|e| {
                    HuginnError::Configuration(format!("invalid seed topic '{raw}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let http = self.http.build_client()?;

        let source: Arc<dyn ListingSource> = match self.listing_source {
            Some(source) => source,
            None => {
                let base_url = self.base_url.clone().unwrap_or_else(|| {
                    if self.credentials.is_some() {
                        DEFAULT_BASE_URL.to_string()
                    } else {
                        PUBLIC_BASE_URL.to_string()
                    }
                });
                Arc::new(
                    HttpListingClient::with_base_url(http.clone(), base_url)
                        .source_tag(self.source_tag.clone()),
                )
            }
        };
        let source_tag = source.name().to_string();

        let tokens = self.credentials.map(|credentials| {
            Arc::new(AccessTokenProvider::new(
                http.clone(),
                self.token_url
                    .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                credentials,
                source_tag.clone(),
            ))
        });
        let limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(self.rate_limit)));
        let guarded = GuardedSource::new(source, Arc::clone(&limiter), tokens);

        let (store, validity_store) = if self.in_memory {
            (
                PersistentCacheStore::in_memory(),
                ValidityStore::in_memory(self.validity_capacity as usize),
            )
        } else {
            let dir = self
                .cache_dir
                .unwrap_or_else(default_cache_dir)
                .join(&source_tag);
            (
                PersistentCacheStore::open(dir.join(QUEUES_FILE)),
                ValidityStore::open(dir.join(TOPICS_FILE), self.validity_capacity as usize),
            )
        };

        let resolver = TopicKeyResolver::new(
            guarded.clone(),
            Arc::new(TopicValidityCache::with_max_entries(self.validity_capacity)),
        )
        .with_store(Arc::new(validity_store))
        .with_seeds(seeds)
        .max_attempts(self.max_topic_attempts);

        let normalizer = Arc::new(PostNormalizer::new(source_tag.clone(), self.normalizer));
        let orchestrator = FetchOrchestrator::new(guarded, normalizer, self.strategies, self.fetch);

        info!(
            source = %source_tag,
            strategies = orchestrator.strategies().len(),
            seeds = resolver.seeds().len(),
            persistent = !self.in_memory,
            "media provider ready"
        );

        Ok(MediaProvider {
            inner: Arc::new(Inner {
                source_tag,
                resolver,
                orchestrator,
                store: Arc::new(store),
                limiter,
                preferences: self.preferences,
                queue_config: self.queue,
                snapshot_ttl: self.snapshot_ttl,
                slots: Mutex::new(HashMap::new()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_seed_topics() {
        let result = MediaProviderBuilder::new()
            .in_memory()
            .seed_topics(["pics", "not a topic"])
            .build();
        assert!(matches!(result, Err(HuginnError::Configuration(_))));
    }

    #[test]
    fn builds_in_memory_with_defaults() {
        let provider = MediaProviderBuilder::new().in_memory().build().unwrap();
        assert_eq!(provider.source_tag(), DEFAULT_SOURCE_TAG);
        assert_eq!(provider.rate_limiter().limit_for("reddit"), RateLimit::default());
    }

    #[test]
    fn creates_cache_files_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let _provider = MediaProviderBuilder::new()
            .cache_dir(dir.path())
            .build()
            .unwrap();
        // nothing is written until the first snapshot
        assert!(!dir.path().join("reddit").join(QUEUES_FILE).exists());
    }

    #[test]
    fn from_config_applies_sections() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            in_memory = true
            capacity = 10

            [rate_limit]
            requests = 5
            window_secs = 1

            [topics]
            seeds = ["aww"]
        "#,
        )
        .unwrap();
        let builder = MediaProviderBuilder::from_config(&config, &Secrets::default());
        assert!(builder.in_memory);
        assert_eq!(builder.queue.capacity, 10);
        assert_eq!(builder.seed_topics, vec!["aww"]);

        let provider = builder.build().unwrap();
        assert_eq!(
            provider.rate_limiter().limit_for("reddit"),
            RateLimit::new(5, Duration::from_secs(1))
        );
    }
}
