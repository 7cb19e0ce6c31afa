//! Topic existence checks and random topic selection.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::cache::{TopicValidityCache, ValidityStore};
use crate::telemetry;
use crate::types::TopicKey;
use crate::upstream::GuardedSource;
use crate::{HuginnError, Result};

/// Default number of seed topics probed by [`TopicKeyResolver::random_key`].
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Validates topic keys against the upstream and supplies random valid ones.
///
/// Answers are cached in a bounded [`TopicValidityCache`] and mirrored to a
/// [`ValidityStore`] when one is attached. Only definite answers are cached;
/// a probe that fails (transport error, rate limit) is retried next time.
/// [`exists`](TopicKeyResolver::exists) reads such a failure as "does not
/// exist"; [`try_exists`](TopicKeyResolver::try_exists) and
/// [`random_key`](TopicKeyResolver::random_key) return the error.
pub struct TopicKeyResolver {
    source: GuardedSource,
    cache: Arc<TopicValidityCache>,
    store: Option<Arc<ValidityStore>>,
    seeds: Vec<TopicKey>,
    max_attempts: usize,
}

impl TopicKeyResolver {
    pub fn new(source: GuardedSource, cache: Arc<TopicValidityCache>) -> Self {
        Self {
            source,
            cache,
            store: None,
            seeds: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Persist answers to `store` and warm the cache from it.
    pub fn with_store(mut self, store: Arc<ValidityStore>) -> Self {
        for (key, exists) in store.entries() {
            self.cache.insert(key, exists);
        }
        self.store = Some(store);
        self
    }

    /// Topics [`random_key`](Self::random_key) draws from.
    pub fn with_seeds(mut self, seeds: Vec<TopicKey>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn seeds(&self) -> &[TopicKey] {
        &self.seeds
    }

    /// Whether `key` exists upstream; `false` when the probe fails.
    pub async fn exists(&self, key: &TopicKey) -> bool {
        self.try_exists(key).await.unwrap_or(false)
    }

    /// Whether `key` exists upstream.
    ///
    /// # Errors
    ///
    /// The probe's error (`RateLimited`, `Http`, `Api`, ...) when the
    /// upstream gave no definite answer.
    pub async fn try_exists(&self, key: &TopicKey) -> Result<bool> {
        if let Some(cached) = self.cache.get(key) {
            return Ok(cached);
        }

        let source = self.source.name().to_owned();
        match self.source.probe(key).await {
            Ok(exists) => {
                let status = if exists { "exists" } else { "missing" };
                metrics::counter!(telemetry::TOPIC_PROBES_TOTAL, "source" => source, "status" => status)
                    .increment(1);
                debug!(topic = %key, exists, "topic probed");
                self.cache.insert(key.clone(), exists);
                if let Some(store) = &self.store
                    && let Err(e) = store.record(key, exists)
                {
                    warn!(topic = %key, error = %e, "failed to persist topic validity");
                }
                Ok(exists)
            }
            Err(e) => {
                metrics::counter!(telemetry::TOPIC_PROBES_TOTAL, "source" => source, "status" => "error")
                    .increment(1);
                warn!(topic = %key, error = %e, "topic probe failed");
                Err(e)
            }
        }
    }

    /// A random seed topic that exists, probing at most `max_attempts` seeds.
    ///
    /// # Errors
    ///
    /// - `RateLimited` as soon as the source is throttled
    /// - the last probe error when no seed could be confirmed and some probe
    ///   failed
    /// - `NoValidTopic` when every probed seed is missing
    pub async fn random_key(&self) -> Result<TopicKey> {
        let mut candidates = self.seeds.clone();
        candidates.shuffle(&mut rand::thread_rng());

        let mut attempts = 0;
        let mut last_error = None;
        for key in candidates.into_iter().take(self.max_attempts) {
            attempts += 1;
            match self.try_exists(&key).await {
                Ok(true) => return Ok(key),
                Ok(false) => {}
                Err(e @ HuginnError::RateLimited { .. }) => return Err(e),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or(HuginnError::NoValidTopic { attempts }))
    }
}
