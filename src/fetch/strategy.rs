//! Fetch strategies and fan-out settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::upstream::{Sort, TimeWindow};

/// One listing variant to pull during a refill.
///
/// ```rust
/// # use huginn::fetch::FetchStrategy;
/// # use huginn::upstream::{Sort, TimeWindow};
/// let strategy = FetchStrategy::new("top-month", Sort::Top)
///     .time(TimeWindow::Month)
///     .pages(3);
/// assert_eq!(strategy.pages, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStrategy {
    /// Name used in logs and metrics.
    pub name: String,
    pub sort: Sort,
    #[serde(default)]
    pub time: Option<TimeWindow>,
    /// Page budget. Default: 1.
    #[serde(default = "default_pages")]
    pub pages: u32,
}

fn default_pages() -> u32 {
    1
}

impl FetchStrategy {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
            time: None,
            pages: default_pages(),
        }
    }

    pub fn time(mut self, time: TimeWindow) -> Self {
        self.time = Some(time);
        self
    }

    pub fn pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    /// `hot` (2 pages), `top` of the week (2 pages) and `new` (1 page).
    pub fn defaults() -> Vec<FetchStrategy> {
        vec![
            FetchStrategy::new("hot", Sort::Hot).pages(2),
            FetchStrategy::new("top-week", Sort::Top)
                .time(TimeWindow::Week)
                .pages(2),
            FetchStrategy::new("new", Sort::New),
        ]
    }
}

/// Fan-out settings for a refill.
///
/// ```rust
/// # use huginn::FetchConfig;
/// # use std::time::Duration;
/// let config = FetchConfig::new()
///     .max_workers(2)
///     .strategy_timeout(Duration::from_secs(5));
/// assert_eq!(config.page_size, 100);
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Posts requested per page. Default: 100.
    pub page_size: u32,
    /// Overall budget of one strategy, all pages included. Default: 20s.
    pub strategy_timeout: Duration,
    /// Strategies running at once. Default: 3.
    pub max_workers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            strategy_timeout: Duration::from_secs(20),
            max_workers: 3,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }
}
