//! Concurrent refill of a topic from several listing strategies.
//!
//! A refill is a best-effort union: every strategy runs on a bounded worker
//! pool under its own deadline, and a strategy that fails (timeout, rate
//! limit, malformed payload, panic) only loses its own contribution.

mod strategy;

pub use strategy::{FetchConfig, FetchStrategy};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::normalize::PostNormalizer;
use crate::telemetry;
use crate::types::{MediaCandidate, TopicKey};
use crate::upstream::{GuardedSource, PageRequest};
use crate::{HuginnError, Result};

/// Runs the configured strategies for one topic and merges their output.
#[derive(Clone)]
pub struct FetchOrchestrator {
    source: GuardedSource,
    normalizer: Arc<PostNormalizer>,
    strategies: Arc<[FetchStrategy]>,
    config: FetchConfig,
}

impl FetchOrchestrator {
    pub fn new(
        source: GuardedSource,
        normalizer: Arc<PostNormalizer>,
        strategies: Vec<FetchStrategy>,
        config: FetchConfig,
    ) -> Self {
        Self {
            source,
            normalizer,
            strategies: strategies.into(),
            config,
        }
    }

    pub fn strategies(&self) -> &[FetchStrategy] {
        &self.strategies
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch, normalize, deduplicate and shuffle candidates for `topic`.
    ///
    /// Never fails; an empty result means every strategy came back empty or
    /// failed.
    pub async fn refill(&self, topic: &TopicKey) -> Vec<MediaCandidate> {
        let started = Instant::now();
        let source_tag = self.source.name().to_string();
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));

        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for strategy in self.strategies.iter().cloned() {
            let source = self.source.clone();
            let normalizer = Arc::clone(&self.normalizer);
            let semaphore = Arc::clone(&semaphore);
            let topic = topic.clone();
            let page_size = self.config.page_size;
            let timeout = self.config.strategy_timeout;
            let name = strategy.name.clone();

            let handle = tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let result =
                    run_strategy(&source, &normalizer, &topic, &strategy, page_size, timeout)
                        .await;
                (strategy.name, result)
            });
            names.insert(handle.id(), name);
        }

        let mut merged = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let name = names.get(&e.id()).cloned().unwrap_or_default();
                    record_failure(&source_tag, topic, &name, &format!("task failed: {e}"));
                    continue;
                }
            };
            match result {
                Ok(candidates) => {
                    debug!(source = %source_tag, %topic, strategy = %name, count = candidates.len(), "strategy finished");
                    merged.extend(candidates);
                }
                Err(e) => record_failure(&source_tag, topic, &name, &e.to_string()),
            }
        }

        let mut seen = HashSet::new();
        merged.retain(|c| seen.insert(c.fingerprint.clone()));
        merged.shuffle(&mut rand::thread_rng());

        metrics::counter!(telemetry::CANDIDATES_DISCOVERED_TOTAL, "source" => source_tag.clone())
            .increment(merged.len() as u64);
        metrics::histogram!(telemetry::REFILL_DURATION_SECONDS, "source" => source_tag.clone())
            .record(started.elapsed().as_secs_f64());
        debug!(source = %source_tag, %topic, count = merged.len(), "refill fetched candidates");
        merged
    }
}

/// Paginate one strategy until its page budget, the last page, or the
/// deadline. Only a failure of the first page is an error; later failures
/// keep what was already fetched.
async fn run_strategy(
    source: &GuardedSource,
    normalizer: &PostNormalizer,
    topic: &TopicKey,
    strategy: &FetchStrategy,
    page_size: u32,
    timeout: Duration,
) -> Result<Vec<MediaCandidate>> {
    let deadline = Instant::now() + timeout;
    let mut candidates = Vec::new();
    let mut after = None;

    for page_index in 0..strategy.pages.max(1) {
        let request = PageRequest::new(strategy.sort, page_size)
            .time(strategy.time)
            .after(after.take());
        let fetched = match tokio::time::timeout_at(deadline, source.fetch_page(topic, &request)).await
        {
            Ok(result) => result,
            Err(_) => Err(HuginnError::Timeout(timeout)),
        };

        match fetched {
            Ok(page) => {
                candidates.extend(normalizer.normalize_batch(topic, &page.posts));
                match page.after {
                    Some(next) => after = Some(next),
                    None => break,
                }
            }
            Err(e) if page_index == 0 => return Err(e),
            Err(e) => {
                warn!(
                    %topic,
                    strategy = %strategy.name,
                    page = page_index + 1,
                    error = %e,
                    "pagination stopped early"
                );
                break;
            }
        }
    }
    Ok(candidates)
}

fn record_failure(source: &str, topic: &TopicKey, strategy: &str, error: &str) {
    warn!(source, %topic, strategy, error, "fetch strategy failed");
    metrics::counter!(telemetry::STRATEGY_FAILURES_TOTAL,
        "source" => source.to_owned(),
        "strategy" => strategy.to_owned(),
    )
    .increment(1);
}
