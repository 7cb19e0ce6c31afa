//! Caching subsystem.
//!
//! Three caches, all owned by a [`MediaProvider`](crate::MediaProvider):
//!
//! - [`CandidateQueue`]: per-topic bounded, deduplicated queue of candidates
//!   waiting to be served.
//!
//! - [`PersistentCacheStore`] / [`ValidityStore`]: disk snapshots of the
//!   queues and of topic existence results, so a restart does not begin cold.
//!
//! - [`TopicValidityCache`]: bounded in-memory map of topic → exists,
//!   consulted before any existence probe.

mod disk;
pub mod queue;
pub mod store;
pub mod validity;

pub use queue::{CandidateQueue, QueueConfig};
pub use store::{PersistentCacheStore, QUEUES_FILE, TOPICS_FILE, ValidityStore};
pub use validity::{DEFAULT_VALIDITY_CACHE_MAX, TopicValidityCache};
