//! Per-source request budgets.
//!
//! Each source gets a fixed window: at most `requests` calls per `window`,
//! counted from the first call after the previous window closed. Operators
//! (and upstream 429 responses) can block a source outright for a while with
//! [`RateLimiter::trigger`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Budget for one source.
///
/// ```rust
/// # use huginn::RateLimit;
/// # use std::time::Duration;
/// let limit = RateLimit::per_minute(60);
/// assert_eq!(limit, RateLimit::new(60, Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests allowed per window.
    pub requests: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimit {
    pub fn new(requests: u32, window: Duration) -> Self {
        Self { requests, window }
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Read-only view of a source's budget, for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    /// Calls left in the current window.
    pub remaining: u32,
    /// Time until the current window closes; zero when no window is open.
    pub resets_in: Duration,
    /// Remaining manual block, if one is active.
    pub blocked_for: Option<Duration>,
}

#[derive(Debug)]
struct RateLimitWindow {
    window_start: Instant,
    count: u32,
    manual_block_until: Option<Instant>,
}

impl RateLimitWindow {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            manual_block_until: None,
        }
    }
}

/// Fixed-window rate limiter keyed by source tag.
///
/// ```rust
/// # use huginn::{RateLimit, RateLimiter};
/// # use std::time::Duration;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = RateLimiter::new(RateLimit::per_minute(2));
/// assert!(limiter.allow("reddit"));
/// assert!(limiter.allow("reddit"));
/// assert!(!limiter.allow("reddit"));
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    default_limit: RateLimit,
    overrides: HashMap<String, RateLimit>,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl RateLimiter {
    pub fn new(default_limit: RateLimit) -> Self {
        Self {
            default_limit,
            overrides: HashMap::new(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different budget for one source.
    pub fn with_limit(mut self, source: impl Into<String>, limit: RateLimit) -> Self {
        self.overrides.insert(source.into(), limit);
        self
    }

    /// The budget configured for `source`.
    pub fn limit_for(&self, source: &str) -> RateLimit {
        self.overrides
            .get(source)
            .copied()
            .unwrap_or(self.default_limit)
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume one request from the budget. Returns false when the source is
    /// blocked or its window is exhausted; the caller must then skip the call.
    pub fn allow(&self, source: &str) -> bool {
        let limit = self.limit_for(source);
        let now = Instant::now();
        let mut windows = self.windows();
        let window = windows
            .entry(source.to_string())
            .or_insert_with(|| RateLimitWindow::new(now));

        match window.manual_block_until {
            Some(until) if until > now => return false,
            Some(_) => window.manual_block_until = None,
            None => {}
        }

        if now.duration_since(window.window_start) >= limit.window {
            window.window_start = now;
            window.count = 0;
        }
        if window.count < limit.requests {
            window.count += 1;
            true
        } else {
            debug!(source, limit = limit.requests, "rate limit window exhausted");
            false
        }
    }

    /// Deny every request for `source` for `duration`.
    ///
    /// An existing longer block is kept.
    pub fn trigger(&self, source: &str, duration: Duration) {
        let now = Instant::now();
        let until = now + duration;
        let mut windows = self.windows();
        let window = windows
            .entry(source.to_string())
            .or_insert_with(|| RateLimitWindow::new(now));
        if window.manual_block_until.is_none_or(|current| current < until) {
            window.manual_block_until = Some(until);
        }
        warn!(source, blocked_secs = duration.as_secs(), "rate limit triggered");
    }

    /// Clear all state for `source`: counters and any manual block.
    pub fn reset(&self, source: &str) {
        if self.windows().remove(source).is_some() {
            info!(source, "rate limit reset");
        }
    }

    /// Current budget of `source`, without consuming anything.
    pub fn status(&self, source: &str) -> RateLimitStatus {
        let limit = self.limit_for(source);
        let now = Instant::now();
        let windows = self.windows();
        let Some(window) = windows.get(source) else {
            return RateLimitStatus {
                limit: limit.requests,
                remaining: limit.requests,
                resets_in: Duration::ZERO,
                blocked_for: None,
            };
        };

        let elapsed = now.duration_since(window.window_start);
        let (remaining, resets_in) = if elapsed >= limit.window {
            (limit.requests, Duration::ZERO)
        } else {
            (
                limit.requests.saturating_sub(window.count),
                limit.window - elapsed,
            )
        };
        let blocked_for = window
            .manual_block_until
            .filter(|until| *until > now)
            .map(|until| until - now);

        RateLimitStatus {
            limit: limit.requests,
            remaining,
            resets_in,
            blocked_for,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}
