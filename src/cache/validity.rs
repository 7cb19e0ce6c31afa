//! In-memory topic validity cache.

use crate::types::TopicKey;

/// Default maximum number of remembered topics.
pub const DEFAULT_VALIDITY_CACHE_MAX: u64 = 1_000;

/// Thread-safe map of topic → exists.
///
/// Bounded by a moka cache so long-running processes never grow it past its
/// capacity; least-recently used topics are evicted first.
pub struct TopicValidityCache {
    entries: moka::sync::Cache<TopicKey, bool>,
}

impl TopicValidityCache {
    /// Create an empty cache with the default max capacity (1,000).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_VALIDITY_CACHE_MAX)
    }

    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: moka::sync::Cache::new(max),
        }
    }

    /// Cached result for a topic; `None` on miss.
    pub fn get(&self, key: &TopicKey) -> Option<bool> {
        self.entries.get(key)
    }

    pub fn insert(&self, key: TopicKey, exists: bool) {
        self.entries.insert(key, exists);
    }

    /// Approximate number of entries (pending evictions may not be applied yet).
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending evictions now.
    pub fn sync(&self) {
        self.entries.run_pending_tasks();
    }
}

impl Default for TopicValidityCache {
    fn default() -> Self {
        Self::new()
    }
}
