//! Rate-limit and credential decorator for listing sources.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::traits::{ListingPage, ListingSource, PageRequest};
use crate::auth::AccessTokenProvider;
use crate::ratelimit::RateLimiter;
use crate::telemetry;
use crate::types::TopicKey;
use crate::{HuginnError, Result};

/// Block applied when an upstream 429 carries no `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Wraps a [`ListingSource`] so that every call is first admitted by the
/// [`RateLimiter`] and carries a bearer token when credentials are set.
///
/// A denied call never reaches the network and fails with
/// [`HuginnError::RateLimited`]. An upstream 429 blocks the source for its
/// `Retry-After`; an upstream 401 drops the cached token.
#[derive(Clone)]
pub struct GuardedSource {
    source: Arc<dyn ListingSource>,
    limiter: Arc<RateLimiter>,
    tokens: Option<Arc<AccessTokenProvider>>,
}

impl GuardedSource {
    pub fn new(
        source: Arc<dyn ListingSource>,
        limiter: Arc<RateLimiter>,
        tokens: Option<Arc<AccessTokenProvider>>,
    ) -> Self {
        Self {
            source,
            limiter,
            tokens,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch one listing page under the guard.
    pub async fn fetch_page(&self, topic: &TopicKey, request: &PageRequest) -> Result<ListingPage> {
        self.admit()?;
        let token = self.token().await?;
        let result = self
            .source
            .fetch_page(topic, request, token.as_deref())
            .await;
        self.observe(result).await
    }

    /// Probe topic existence under the guard.
    pub async fn probe(&self, topic: &TopicKey) -> Result<bool> {
        self.admit()?;
        let token = self.token().await?;
        let result = self.source.probe(topic, token.as_deref()).await;
        self.observe(result).await
    }

    fn admit(&self) -> Result<()> {
        let name = self.source.name();
        if self.limiter.allow(name) {
            return Ok(());
        }
        metrics::counter!(telemetry::RATE_LIMITED_TOTAL, "source" => name.to_owned())
            .increment(1);
        let status = self.limiter.status(name);
        let retry_after = status
            .blocked_for
            .or(Some(status.resets_in).filter(|d| !d.is_zero()));
        Err(HuginnError::RateLimited {
            source_tag: name.to_string(),
            retry_after,
        })
    }

    async fn token(&self) -> Result<Option<String>> {
        match &self.tokens {
            Some(tokens) => tokens.get_token().await.map(Some),
            None => Ok(None),
        }
    }

    async fn observe<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Err(HuginnError::RateLimited { retry_after, .. }) => {
                let block = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                warn!(source = self.source.name(), block_secs = block.as_secs(), "upstream returned 429");
                self.limiter.trigger(self.source.name(), block);
            }
            Err(HuginnError::Api { status: 401, .. }) => {
                if let Some(tokens) = &self.tokens {
                    tokens.invalidate().await;
                }
            }
            _ => {}
        }
        result
    }
}
