//! Per-topic candidate queue.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::time::Instant;

use crate::types::MediaCandidate;

/// Sizing and refill policy for a [`CandidateQueue`].
///
/// ```rust
/// # use huginn::QueueConfig;
/// # use std::time::Duration;
/// let config = QueueConfig::new()
///     .capacity(50)
///     .low_water_mark(5)
///     .refill_interval(Duration::from_secs(600));
/// assert_eq!(config.capacity, 50);
/// ```
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum queued candidates per topic. Default: 200.
    pub capacity: usize,
    /// Below this size a refill is due. Default: 20.
    pub low_water_mark: usize,
    /// A refill is due once this much time has passed since the last one.
    /// Default: 30 minutes.
    pub refill_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            low_water_mark: 20,
            refill_interval: Duration::from_secs(30 * 60),
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn low_water_mark(mut self, mark: usize) -> Self {
        self.low_water_mark = mark;
        self
    }

    pub fn refill_interval(mut self, interval: Duration) -> Self {
        self.refill_interval = interval;
        self
    }
}

/// Bounded, deduplicated queue of candidates for one topic.
///
/// A seen-set of fingerprints rejects anything already queued or recently
/// served. Once the seen-set grows past twice the capacity it is cleared and
/// re-seeded with the fingerprints still queued, so old items may come back
/// but queued items never repeat.
///
/// Not synchronized; the owner wraps it in a lock.
#[derive(Debug)]
pub struct CandidateQueue {
    items: VecDeque<MediaCandidate>,
    seen: HashSet<String>,
    config: QueueConfig,
    last_refill: Option<Instant>,
}

impl CandidateQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            items: VecDeque::with_capacity(config.capacity),
            seen: HashSet::new(),
            config,
            last_refill: None,
        }
    }

    /// Add fresh candidates in random order. Returns how many were appended.
    pub fn push(&mut self, candidates: Vec<MediaCandidate>) -> usize {
        let mut fresh = self.unseen(candidates);
        fresh.shuffle(&mut rand::thread_rng());
        self.append(fresh)
    }

    /// Fill from a restored snapshot, keeping its order.
    pub fn seed(&mut self, candidates: Vec<MediaCandidate>) -> usize {
        let fresh = self.unseen(candidates);
        self.append(fresh)
    }

    /// Remove and return the head of the queue.
    pub fn pop(&mut self) -> Option<MediaCandidate> {
        self.items.pop_front()
    }

    /// Whether the queue is below its low-water mark or its refill interval
    /// has elapsed (or it was never refilled).
    pub fn needs_refill(&self) -> bool {
        self.items.len() < self.config.low_water_mark
            || self
                .last_refill
                .is_none_or(|at| at.elapsed() >= self.config.refill_interval)
    }

    /// Record that a refill just completed.
    pub fn mark_refilled(&mut self) {
        self.last_refill = Some(Instant::now());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of fingerprints currently remembered.
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Clone of the queued candidates, head first.
    pub fn snapshot(&self) -> Vec<MediaCandidate> {
        self.items.iter().cloned().collect()
    }

    /// Drop candidates already seen or repeated within the batch.
    fn unseen(&self, candidates: Vec<MediaCandidate>) -> Vec<MediaCandidate> {
        let mut batch = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| !self.seen.contains(&c.fingerprint) && batch.insert(c.fingerprint.clone()))
            .collect()
    }

    fn append(&mut self, fresh: Vec<MediaCandidate>) -> usize {
        let free = self.config.capacity.saturating_sub(self.items.len());
        let mut appended = 0;
        for candidate in fresh.into_iter().take(free) {
            self.seen.insert(candidate.fingerprint.clone());
            self.items.push_back(candidate);
            appended += 1;
        }

        if self.seen.len() > self.config.capacity.saturating_mul(2) {
            self.seen.clear();
            self.seen.extend(self.items.iter().map(|c| c.fingerprint.clone()));
        }
        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(n: usize) -> MediaCandidate {
        MediaCandidate::new(
            format!("https://i.redd.it/{n}.jpg"),
            format!("post {n}"),
            "Posted in r/test",
            "reddit",
            0,
        )
    }

    fn batch(range: std::ops::Range<usize>) -> Vec<MediaCandidate> {
        range.map(candidate).collect()
    }

    #[test]
    fn push_drops_duplicates() {
        let mut queue = CandidateQueue::new(QueueConfig::default());
        let mut items = batch(0..5);
        items.push(candidate(2));
        assert_eq!(queue.push(items), 5);
        assert_eq!(queue.push(batch(3..8)), 3);
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn served_items_stay_seen() {
        let mut queue = CandidateQueue::new(QueueConfig::default());
        queue.push(batch(0..3));
        while queue.pop().is_some() {}
        assert_eq!(queue.push(batch(0..3)), 0);
    }

    #[test]
    fn push_respects_capacity() {
        let mut queue = CandidateQueue::new(QueueConfig::new().capacity(10));
        assert_eq!(queue.push(batch(0..25)), 10);
        assert_eq!(queue.len(), 10);
        assert_eq!(queue.push(batch(25..30)), 0);
    }

    #[test]
    fn seen_set_resets_past_twice_capacity() {
        let mut queue = CandidateQueue::new(QueueConfig::new().capacity(4));
        for round in 0..3 {
            queue.push(batch(round * 4..round * 4 + 4));
            while queue.pop().is_some() {}
        }
        // the third push took the seen-set to 12 > 8 and cleared it
        assert_eq!(queue.seen_len(), 4);
        assert_eq!(queue.push(batch(0..2)), 2);
    }

    #[test]
    fn reset_keeps_queued_items_unique() {
        let mut queue = CandidateQueue::new(QueueConfig::new().capacity(2));
        queue.push(batch(0..2));
        for start in (2..8).step_by(2) {
            queue.pop();
            queue.push(batch(start..start + 2));
        }
        assert_eq!(queue.seen_len(), 2);
        let queued = queue.snapshot();
        assert_eq!(queue.push(queued), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn seed_keeps_order() {
        let mut queue = CandidateQueue::new(QueueConfig::default());
        queue.seed(batch(0..5));
        let titles: Vec<_> = queue.snapshot().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, ["post 0", "post 1", "post 2", "post 3", "post 4"]);
        assert_eq!(queue.pop().map(|c| c.title).as_deref(), Some("post 0"));
    }

    #[tokio::test(start_paused = true)]
    async fn needs_refill_tracks_size_and_age() {
        let config = QueueConfig::new()
            .low_water_mark(2)
            .refill_interval(Duration::from_secs(60));
        let mut queue = CandidateQueue::new(config);
        assert!(queue.needs_refill());

        queue.push(batch(0..3));
        queue.mark_refilled();
        assert!(!queue.needs_refill());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(queue.needs_refill());

        queue.mark_refilled();
        queue.pop();
        queue.pop();
        assert!(queue.needs_refill());
    }
}
