//! HTTP client for Reddit-style listing APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, trace};

use super::listing::parse_listing;
use super::traits::{ListingPage, ListingSource, PageRequest};
use crate::types::TopicKey;
use crate::{HuginnError, Result};

/// Default API base URL (the authenticated host).
pub const DEFAULT_BASE_URL: &str = "https://oauth.reddit.com";

/// Default source tag.
pub const DEFAULT_SOURCE_TAG: &str = "reddit";

/// Connection and request timeouts plus identification for upstream calls.
///
/// ```rust
/// # use huginn::upstream::HttpConfig;
/// # use std::time::Duration;
/// let config = HttpConfig::new()
///     .user_agent("my-bot/1.0 by u/someone")
///     .request_timeout(Duration::from_secs(5));
/// assert_eq!(config.connect_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Default: 5 seconds.
    pub connect_timeout: Duration,
    /// Whole-request timeout. Default: 10 seconds.
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::version::user_agent(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build a `reqwest` client with these settings.
    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| HuginnError::Configuration(format!("failed to build HTTP client: {e}")))
    }
}

/// [`ListingSource`] over HTTP.
///
/// Listing: `GET {base}/r/{topic}/{sort}.json?limit=&after=&t=&raw_json=1`.
/// Probe: `GET {base}/r/{topic}/about.json`.
#[derive(Clone)]
pub struct HttpListingClient {
    http: Client,
    base_url: String,
    source_tag: String,
}

impl HttpListingClient {
    /// Create a client against [`DEFAULT_BASE_URL`].
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
        }
    }

    /// Override the source tag reported by [`ListingSource::name`].
    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = tag.into();
        self
    }

    async fn get(&self, url: &str, query: &[(&str, String)], token: Option<&str>) -> Result<Response> {
        let mut request = self.http.get(url).query(query);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Check response status and map to appropriate error.
    fn handle_response_errors(&self, response: &Response, topic: &TopicKey) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            404 => Err(HuginnError::TopicNotFound(topic.to_string())),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(HuginnError::RateLimited {
                    source_tag: self.source_tag.clone(),
                    retry_after,
                })
            }
            code => Err(HuginnError::Api {
                status: code,
                message: format!("{} API error: {status}", self.source_tag),
            }),
        }
    }
}

#[async_trait]
impl ListingSource for HttpListingClient {
    fn name(&self) -> &str {
        &self.source_tag
    }

    async fn fetch_page(
        &self,
        topic: &TopicKey,
        request: &PageRequest,
        token: Option<&str>,
    ) -> Result<ListingPage> {
        let url = format!("{}/r/{}/{}.json", self.base_url, topic, request.sort);
        let mut query = vec![
            ("limit", request.limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(after) = &request.after {
            query.push(("after", after.clone()));
        }
        if let Some(time) = request.time {
            query.push(("t", time.to_string()));
        }

        trace!(%url, ?query, "fetching listing page");
        let response = self.get(&url, &query, token).await?;
        self.handle_response_errors(&response, topic)?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| HuginnError::Upstream(format!("listing body is not JSON: {e}")))?;
        let page = parse_listing(payload)?;
        debug!(
            source = %self.source_tag,
            %topic,
            sort = %request.sort,
            posts = page.posts.len(),
            skipped = page.skipped,
            "listing page fetched"
        );
        Ok(page)
    }

    async fn probe(&self, topic: &TopicKey, token: Option<&str>) -> Result<bool> {
        let url = format!("{}/r/{}/about.json", self.base_url, topic);
        let response = self.get(&url, &[], token).await?;

        // missing, banned and private communities all read as absent
        if matches!(response.status().as_u16(), 403 | 404) {
            return Ok(false);
        }
        self.handle_response_errors(&response, topic)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| HuginnError::Upstream(format!("about body is not JSON: {e}")))?;
        Ok(is_community(&body))
    }
}

/// An about payload describes an existing community when it has a `data`
/// object, no `error`, and (when present) the community kind `t5`.
fn is_community(body: &Value) -> bool {
    if body.get("error").is_some() {
        return false;
    }
    let kind_ok = body
        .get("kind")
        .and_then(Value::as_str)
        .is_none_or(|kind| kind == "t5");
    kind_ok && body.get("data").is_some_and(Value::is_object)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn about_payload_shapes() {
        assert!(is_community(&json!({"kind": "t5", "data": {"display_name": "aww"}})));
        assert!(is_community(&json!({"data": {}})));
        assert!(!is_community(&json!({"kind": "Listing", "data": {"children": []}})));
        assert!(!is_community(&json!({"error": 404, "message": "Not Found"})));
        assert!(!is_community(&json!({"kind": "t5"})));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let http = HttpConfig::new().build_client().unwrap();
        let client = HttpListingClient::with_base_url(http, "http://localhost:1234/");
        assert_eq!(client.base_url, "http://localhost:1234");
        assert_eq!(client.name(), DEFAULT_SOURCE_TAG);
    }
}
