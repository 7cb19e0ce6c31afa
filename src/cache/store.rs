//! Disk snapshots of candidate queues and topic validity.
//!
//! Each source owns a directory holding two documents:
//!
//! - `queues.json`: topic → queued candidates, rewritten after every refill
//!   and every pop.
//! - `topics.json`: topic → exists, rewritten whenever a probe result is
//!   cached.
//!
//! Missing or corrupt files start empty with a warning. Writes are atomic and
//! serialized per document. Queue snapshots can be staged in memory and
//! flushed later, so the disk write can run off the async workers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::disk::{read_document, write_document};
use crate::Result;
use crate::types::{MediaCandidate, TopicKey};

/// File name of the queue snapshot document.
pub const QUEUES_FILE: &str = "queues.json";
/// File name of the topic validity document.
pub const TOPICS_FILE: &str = "topics.json";

/// On-disk form of a candidate. The fingerprint is recomputed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedCandidate {
    asset_url: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    source_tag: String,
    /// Entries without a timestamp cannot be proven fresh and are dropped.
    #[serde(default)]
    discovered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    placeholder_text: Option<String>,
    #[serde(default)]
    quality_score: u64,
}

impl From<&MediaCandidate> for PersistedCandidate {
    fn from(c: &MediaCandidate) -> Self {
        Self {
            asset_url: c.asset_url.clone(),
            title: c.title.clone(),
            description: c.description.clone(),
            source_tag: c.source_tag.clone(),
            discovered_at: Some(c.discovered_at),
            placeholder_text: c.placeholder_text.clone(),
            quality_score: c.quality_score,
        }
    }
}

impl PersistedCandidate {
    fn restore(self, at: DateTime<Utc>) -> MediaCandidate {
        let mut candidate = MediaCandidate::new(
            self.asset_url,
            self.title,
            self.description,
            self.source_tag,
            self.quality_score,
        )
        .discovered_at(at);
        candidate.placeholder_text = self.placeholder_text;
        candidate
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot store for per-topic candidate queues.
///
/// ```rust
/// # use huginn::{PersistentCacheStore, TopicKey, MediaCandidate};
/// # use std::time::Duration;
/// let store = PersistentCacheStore::in_memory();
/// let key = TopicKey::parse("aww").unwrap();
/// let item = MediaCandidate::new("https://i.redd.it/a.jpg", "a", "", "reddit", 0);
/// store.snapshot(&key, &[item.clone()]).unwrap();
/// assert_eq!(store.load(&key, Duration::from_secs(600)), vec![item]);
/// ```
#[derive(Debug)]
pub struct PersistentCacheStore {
    path: Option<PathBuf>,
    topics: Mutex<BTreeMap<String, Vec<PersistedCandidate>>>,
    /// Set when `topics` changed since the last successful flush.
    dirty: AtomicBool,
    writer: Mutex<()>,
}

impl PersistentCacheStore {
    /// Open the queue document at `path`, starting empty when it is missing
    /// or corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let topics = read_document(&path).unwrap_or_default();
        let store = Self {
            path: Some(path),
            topics: Mutex::new(topics),
            dirty: AtomicBool::new(false),
            writer: Mutex::new(()),
        };
        info!(path = ?store.path, topics = store.topic_count(), "opened queue snapshot");
        store
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            topics: Mutex::new(BTreeMap::new()),
            dirty: AtomicBool::new(false),
            writer: Mutex::new(()),
        }
    }

    /// Backing file; `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of topics with a snapshot.
    pub fn topic_count(&self) -> usize {
        lock(&self.topics).len()
    }

    /// Replace the snapshot for `key` and write the document.
    pub fn snapshot(&self, key: &TopicKey, candidates: &[MediaCandidate]) -> Result<()> {
        self.stage(key, candidates);
        self.flush()
    }

    /// Replace the snapshot for `key` in memory only; [`flush`](Self::flush)
    /// writes it.
    pub fn stage(&self, key: &TopicKey, candidates: &[MediaCandidate]) {
        let mut topics = lock(&self.topics);
        if candidates.is_empty() {
            topics.remove(key.as_str());
        } else {
            topics.insert(
                key.as_str().to_string(),
                candidates.iter().map(PersistedCandidate::from).collect(),
            );
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Write the staged document. No-op when nothing changed since the last
    /// flush.
    ///
    /// Flushes are serialized and each one writes the state current when it
    /// took the writer lock, so the last flush to finish carries every
    /// snapshot staged before it started.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _writer = lock(&self.writer);
        let topics = {
            let topics = lock(&self.topics);
            if !self.dirty.swap(false, Ordering::AcqRel) {
                return Ok(());
            }
            topics.clone()
        };
        if let Err(e) = write_document(path, &topics) {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        debug!(path = %path.display(), topics = topics.len(), "queue snapshot written");
        Ok(())
    }

    /// Snapshot for `key`, minus entries discovered more than `ttl` ago.
    pub fn load(&self, key: &TopicKey, ttl: Duration) -> Vec<MediaCandidate> {
        let Some(entries) = lock(&self.topics).get(key.as_str()).cloned() else {
            return Vec::new();
        };
        let now = Utc::now();
        let total = entries.len();
        let fresh: Vec<MediaCandidate> = entries
            .into_iter()
            .filter_map(|entry| {
                let at = entry.discovered_at?;
                // future timestamps (clock skew) count as fresh
                let age = now.signed_duration_since(at).to_std().unwrap_or(Duration::ZERO);
                (age <= ttl).then(|| entry.restore(at))
            })
            .collect();
        debug!(topic = %key, kept = fresh.len(), expired = total - fresh.len(), "queue snapshot loaded");
        fresh
    }
}

/// Persisted topic existence results.
///
/// Bounded like the in-memory validity cache: once full, the
/// lexicographically first entry makes room for a new one.
#[derive(Debug)]
pub struct ValidityStore {
    path: Option<PathBuf>,
    max_entries: usize,
    topics: Mutex<BTreeMap<String, bool>>,
}

impl ValidityStore {
    /// Open the validity document at `path`, starting empty when it is
    /// missing or corrupt.
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let mut topics: BTreeMap<String, bool> = read_document(&path).unwrap_or_default();
        // drop anything that is no longer a valid key
        topics.retain(|k, _| TopicKey::parse(k).is_ok_and(|key| key.as_str() == k.as_str()));
        while topics.len() > max_entries {
            topics.pop_first();
        }
        Self {
            path: Some(path),
            max_entries,
            topics: Mutex::new(topics),
        }
    }

    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            path: None,
            max_entries,
            topics: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &TopicKey) -> Option<bool> {
        lock(&self.topics).get(key.as_str()).copied()
    }

    /// All persisted results, for warming the in-memory cache.
    pub fn entries(&self) -> Vec<(TopicKey, bool)> {
        lock(&self.topics)
            .iter()
            .filter_map(|(k, v)| TopicKey::parse(k).ok().map(|key| (key, *v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.topics).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a result and write the document.
    pub fn record(&self, key: &TopicKey, exists: bool) -> Result<()> {
        let mut topics = lock(&self.topics);
        if !topics.contains_key(key.as_str()) {
            while !topics.is_empty() && topics.len() >= self.max_entries {
                topics.pop_first();
            }
        }
        if self.max_entries > 0 {
            topics.insert(key.as_str().to_string(), exists);
        }
        if let Some(path) = &self.path {
            write_document(path, &*topics)?;
        }
        Ok(())
    }
}
