//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `source`: source tag of the media provider (e.g. "reddit")
//! - `strategy`: fetch strategy name (e.g. "hot", "top-week")
//! - `status`: outcome: "ok" or "error"

/// Total refills run for a topic queue.
///
/// Labels: `source`, `path` ("cold" | "warm").
pub const REFILLS_TOTAL: &str = "huginn_refills_total";

/// Refill duration in seconds (fan-out through fan-in).
///
/// Labels: `source`.
pub const REFILL_DURATION_SECONDS: &str = "huginn_refill_duration_seconds";

/// Fetch strategies that contributed nothing because of an error.
///
/// Labels: `source`, `strategy`.
pub const STRATEGY_FAILURES_TOTAL: &str = "huginn_strategy_failures_total";

/// Candidates handed out by `get_random_media`.
///
/// Labels: `source`.
pub const CANDIDATES_SERVED_TOTAL: &str = "huginn_candidates_served_total";

/// Candidates produced by the normalizer during refills.
///
/// Labels: `source`.
pub const CANDIDATES_DISCOVERED_TOTAL: &str = "huginn_candidates_discovered_total";

/// Upstream existence probes issued (cache misses only).
///
/// Labels: `source`, `status` ("exists" | "missing" | "error").
pub const TOPIC_PROBES_TOTAL: &str = "huginn_topic_probes_total";

/// Access token refreshes against the token endpoint.
///
/// Labels: `source`, `status` ("ok" | "error").
pub const TOKEN_REFRESHES_TOTAL: &str = "huginn_token_refreshes_total";

/// Upstream calls refused locally by the rate limiter.
///
/// Labels: `source`.
pub const RATE_LIMITED_TOTAL: &str = "huginn_rate_limited_total";
