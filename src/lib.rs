//! Huginn - content acquisition and caching engine for random-media chat bots
//!
//! Huginn fetches posts from a community listing API, normalizes them into
//! [`MediaCandidate`]s, and keeps a per-topic queue of unseen candidates so a
//! bot can answer "show me something random" instantly. Queues are refilled
//! in the background from several listing strategies, survive restarts via
//! disk snapshots, and every upstream call goes through a per-source rate
//! limiter.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{Credentials, MediaProvider};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let provider = MediaProvider::builder()
//!         .credentials(Credentials::new("client-id", "client-secret"))
//!         .user_agent("my-bot/1.0 by u/someone")
//!         .build()?;
//!
//!     // explicit topic
//!     let media = provider.get_random_media(Some("earthporn"), None).await?;
//!     println!("{} -> {}", media.title, media.asset_url);
//!
//!     // random seed topic
//!     let media = provider.get_random_media(None, None).await?;
//!     println!("{} ({})", media.title, media.description);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod provider;
pub mod ratelimit;
pub mod telemetry;
pub mod topic;
pub mod types;
pub mod upstream;
pub mod version;

// Re-export main types at crate root
pub use auth::{AccessTokenProvider, Credentials};
pub use cache::{PersistentCacheStore, QueueConfig, TopicValidityCache, ValidityStore};
pub use config::{Config, Secrets};
pub use error::{HuginnError, Result};
pub use fetch::{FetchConfig, FetchOrchestrator, FetchStrategy};
pub use normalize::{NormalizerConfig, PostNormalizer, ValidityFilter};
pub use provider::{MediaProvider, MediaProviderBuilder, StaticPreferences, TopicPreferences};
pub use ratelimit::{RateLimit, RateLimitStatus, RateLimiter};
pub use topic::TopicKeyResolver;
pub use types::{MediaCandidate, RawPost, TopicKey};
pub use upstream::{HttpListingClient, ListingSource, Sort, TimeWindow};
pub use version::{PKG_VERSION, version_string};
