//! The seam between the engine and an upstream listing API.
//!
//! Everything above this trait (rate limiting, tokens, fan-out,
//! normalization) is source-agnostic. Implementations only speak HTTP and
//! decode pages; they never retry and never consult the rate limiter.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{RawPost, TopicKey};

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Hot,
    Top,
    New,
    Rising,
}

impl Sort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::Hot => "hot",
            Sort::Top => "top",
            Sort::New => "new",
            Sort::Rising => "rising",
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window for [`Sort::Top`] listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page request of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub sort: Sort,
    pub time: Option<TimeWindow>,
    pub limit: u32,
    /// Pagination cursor returned by the previous page.
    pub after: Option<String>,
}

impl PageRequest {
    pub fn new(sort: Sort, limit: u32) -> Self {
        Self {
            sort,
            time: None,
            limit,
            after: None,
        }
    }

    pub fn time(mut self, time: Option<TimeWindow>) -> Self {
        self.time = time;
        self
    }

    pub fn after(mut self, after: Option<String>) -> Self {
        self.after = after;
        self
    }
}

/// One decoded page of posts.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub posts: Vec<RawPost>,
    /// Cursor for the next page; `None` on the last page.
    pub after: Option<String>,
    /// Children that could not be decoded and were dropped.
    pub skipped: usize,
}

/// An upstream that serves paginated listings of posts per topic.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Source tag for logging, metrics and rate limiting.
    fn name(&self) -> &str;

    /// Fetch one listing page. `token` is a bearer token when the source is
    /// authenticated.
    async fn fetch_page(
        &self,
        topic: &TopicKey,
        request: &PageRequest,
        token: Option<&str>,
    ) -> Result<ListingPage>;

    /// Whether `topic` exists upstream.
    ///
    /// `Ok(false)` means the upstream answered and the topic is missing;
    /// transport failures are errors.
    async fn probe(&self, topic: &TopicKey, token: Option<&str>) -> Result<bool>;
}
