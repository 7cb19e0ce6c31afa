//! Upstream listing APIs.
//!
//! [`ListingSource`] is the seam; [`HttpListingClient`] is the HTTP
//! implementation and [`GuardedSource`] the decorator that applies the rate
//! limiter and access tokens to every call.

mod guard;
mod listing;
mod reddit;
mod traits;

pub use guard::{DEFAULT_RETRY_AFTER, GuardedSource};
pub use listing::parse_listing;
pub use reddit::{DEFAULT_BASE_URL, DEFAULT_SOURCE_TAG, HttpConfig, HttpListingClient};
pub use traits::{ListingPage, ListingSource, PageRequest, Sort, TimeWindow};
