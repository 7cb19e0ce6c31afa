//! The public entry point: one [`MediaProvider`] per upstream source.
//!
//! # Serving path
//!
//! `get_random_media` resolves a topic (explicit, then the user's preferred
//! topic, then a random seed), loads that topic's queue (from the disk
//! snapshot on first touch), makes sure there is something to serve, pops one
//! candidate and snapshots the queue.
//!
//! An empty queue blocks on a refill (cold path). A queue that merely needs a
//! refill serves immediately and refills in the background (warm path).
//! Refills are single-flight per topic: a caller that waited for an in-flight
//! refill does not start another one.

mod builder;
mod preferences;

pub use builder::MediaProviderBuilder;
pub use preferences::{StaticPreferences, TopicPreferences};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::cache::{CandidateQueue, PersistentCacheStore, QueueConfig};
use crate::fetch::FetchOrchestrator;
use crate::ratelimit::RateLimiter;
use crate::telemetry;
use crate::topic::TopicKeyResolver;
use crate::types::{MediaCandidate, TopicKey};
use crate::{HuginnError, Result};

/// Per-topic state: the queue plus the refill single-flight machinery.
struct TopicSlot {
    queue: Mutex<CandidateQueue>,
    refill_lock: Arc<tokio::sync::Mutex<()>>,
    /// Completed refills; lets a waiter detect that a refill finished while
    /// it queued for the lock.
    generation: AtomicU64,
}

impl TopicSlot {
    fn queue(&self) -> MutexGuard<'_, CandidateQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Copy)]
enum RefillPath {
    Cold,
    Warm,
}

impl RefillPath {
    fn as_str(self) -> &'static str {
        match self {
            RefillPath::Cold => "cold",
            RefillPath::Warm => "warm",
        }
    }
}

struct Inner {
    source_tag: String,
    resolver: TopicKeyResolver,
    orchestrator: FetchOrchestrator,
    store: Arc<PersistentCacheStore>,
    limiter: Arc<RateLimiter>,
    preferences: Option<Arc<dyn TopicPreferences>>,
    queue_config: QueueConfig,
    snapshot_ttl: Duration,
    slots: Mutex<HashMap<TopicKey, Arc<TopicSlot>>>,
}

/// Random media for one upstream source.
///
/// Cheap to clone; clones share all caches. Build with
/// [`MediaProvider::builder`] or [`MediaProviderBuilder::from_config`].
#[derive(Clone)]
pub struct MediaProvider {
    inner: Arc<Inner>,
}

impl MediaProvider {
    pub fn builder() -> MediaProviderBuilder {
        MediaProviderBuilder::new()
    }

    /// Source tag of this provider (e.g. "reddit").
    pub fn source_tag(&self) -> &str {
        &self.inner.source_tag
    }

    /// The rate limiter guarding this provider's upstream, for operator
    /// overrides (`trigger`, `reset`, `status`).
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    /// Serve one random candidate.
    ///
    /// `topic` wins when given; otherwise the preferred topic of `user_id` is
    /// tried, then a random seed topic.
    ///
    /// # Errors
    ///
    /// - `InvalidTopic` / `TopicNotFound` for a bad explicit topic
    /// - `RateLimited` (or another upstream error) when a topic could not be
    ///   checked
    /// - `NoValidTopic` when no seed topic could be validated
    /// - `ContentUnavailable` when the queue is still empty after a refill
    pub async fn get_random_media(
        &self,
        topic: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<MediaCandidate> {
        let key = self.resolve_key(topic, user_id).await?;
        let slot = self.inner.slot(&key);

        let (empty, due) = {
            let queue = slot.queue();
            (queue.is_empty(), queue.needs_refill())
        };
        if empty {
            Inner::refill_shared(&self.inner, &key, &slot).await;
        } else if due {
            self.spawn_refill(&key, &slot);
        }

        let (candidate, remaining) = {
            let mut queue = slot.queue();
            let Some(candidate) = queue.pop() else {
                return Err(HuginnError::ContentUnavailable {
                    topic: key.to_string(),
                });
            };
            // staged under the queue lock so snapshots land in pop order
            self.inner.store.stage(&key, &queue.snapshot());
            (candidate, queue.len())
        };
        self.inner.persist(&key).await;

        metrics::counter!(telemetry::CANDIDATES_SERVED_TOTAL, "source" => self.inner.source_tag.clone())
            .increment(1);
        debug!(source = %self.inner.source_tag, topic = %key, remaining, "served candidate");
        Ok(candidate)
    }

    /// Whether `topic` exists upstream (cached).
    ///
    /// Fails with the probe's error (e.g. `RateLimited`) when the upstream
    /// gave no definite answer.
    pub async fn topic_exists(&self, topic: &str) -> Result<bool> {
        let key = TopicKey::parse(topic)?;
        self.inner.resolver.try_exists(&key).await
    }

    /// A random valid seed topic.
    pub async fn random_topic(&self) -> Result<TopicKey> {
        self.inner.resolver.random_key().await
    }

    /// Number of queued candidates for `topic`, loading its snapshot if the
    /// topic was not touched yet.
    pub fn queue_len(&self, topic: &str) -> Result<usize> {
        let key = TopicKey::parse(topic)?;
        Ok(self.inner.slot(&key).queue().len())
    }

    async fn resolve_key(&self, topic: Option<&str>, user_id: Option<&str>) -> Result<TopicKey> {
        let resolver = &self.inner.resolver;

        if let Some(raw) = topic {
            let key = TopicKey::parse(raw)?;
            if !resolver.try_exists(&key).await? {
                return Err(HuginnError::TopicNotFound(key.to_string()));
            }
            return Ok(key);
        }

        if let (Some(user), Some(preferences)) = (user_id, &self.inner.preferences)
            && let Some(raw) = preferences.preferred_topic(user).await
        {
            match TopicKey::parse(&raw) {
                Ok(key) => match resolver.try_exists(&key).await {
                    Ok(true) => return Ok(key),
                    Ok(false) => debug!(user, topic = %key, "preferred topic does not exist"),
                    Err(e) => debug!(user, topic = %key, error = %e, "preferred topic unchecked"),
                },
                Err(e) => debug!(user, error = %e, "preferred topic is invalid"),
            }
        }

        resolver.random_key().await
    }

    /// Start a background refill unless one is already running.
    fn spawn_refill(&self, key: &TopicKey, slot: &Arc<TopicSlot>) {
        let Ok(guard) = Arc::clone(&slot.refill_lock).try_lock_owned() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        let slot = Arc::clone(slot);
        tokio::spawn(async move {
            inner.refill_locked(&key, &slot, RefillPath::Warm, guard).await;
        });
    }
}

impl Inner {
    /// The slot for `key`, seeding a new one from the snapshot.
    fn slot(&self, key: &TopicKey) -> Arc<TopicSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }

        let mut queue = CandidateQueue::new(self.queue_config.clone());
        let restored = queue.seed(self.store.load(key, self.snapshot_ttl));
        if restored > 0 {
            info!(source = %self.source_tag, topic = %key, restored, "queue restored from snapshot");
        }
        let slot = Arc::new(TopicSlot {
            queue: Mutex::new(queue),
            refill_lock: Arc::new(tokio::sync::Mutex::new(())),
            generation: AtomicU64::new(0),
        });
        slots.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    /// Cold path: wait for the refill lock and refill, unless a refill
    /// completed while waiting.
    async fn refill_shared(inner: &Arc<Inner>, key: &TopicKey, slot: &Arc<TopicSlot>) {
        let observed = slot.generation.load(Ordering::Acquire);
        let guard = Arc::clone(&slot.refill_lock).lock_owned().await;
        if slot.generation.load(Ordering::Acquire) != observed {
            debug!(topic = %key, "joined in-flight refill");
            return;
        }
        inner
            .refill_locked(key, slot, RefillPath::Cold, guard)
            .await;
    }

    async fn refill_locked(
        &self,
        key: &TopicKey,
        slot: &TopicSlot,
        path: RefillPath,
        _guard: OwnedMutexGuard<()>,
    ) {
        let candidates = self.orchestrator.refill(key).await;
        let fetched = candidates.len();
        let (added, queued) = {
            let mut queue = slot.queue();
            let added = queue.push(candidates);
            queue.mark_refilled();
            self.store.stage(key, &queue.snapshot());
            (added, queue.len())
        };
        slot.generation.fetch_add(1, Ordering::Release);
        self.persist(key).await;

        metrics::counter!(telemetry::REFILLS_TOTAL,
            "source" => self.source_tag.clone(),
            "path" => path.as_str(),
        )
        .increment(1);
        info!(
            source = %self.source_tag,
            topic = %key,
            path = path.as_str(),
            fetched,
            added,
            queued,
            "refill complete"
        );
    }

    /// Flush staged snapshots on the blocking pool. Failures are logged,
    /// never returned.
    async fn persist(&self, key: &TopicKey) {
        if self.store.path().is_none() {
            return;
        }
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(source = %self.source_tag, topic = %key, error = %e, "queue snapshot failed");
            }
            Err(e) => {
                warn!(source = %self.source_tag, topic = %key, error = %e, "queue snapshot task failed");
            }
        }
    }
}
