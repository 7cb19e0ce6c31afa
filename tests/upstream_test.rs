//! Integration tests for the HTTP listing client behind the rate-limit and
//! credential guard, against a wiremock upstream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinSet;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use huginn::upstream::{GuardedSource, HttpConfig, HttpListingClient, PageRequest};
use huginn::{
    AccessTokenProvider, Credentials, HuginnError, RateLimit, RateLimiter, Sort, TimeWindow,
    TopicKey, TopicKeyResolver, TopicValidityCache,
};

fn key(s: &str) -> TopicKey {
    TopicKey::parse(s).unwrap()
}

fn http() -> reqwest::Client {
    HttpConfig::new().build_client().unwrap()
}

fn guarded(server: &MockServer, limit: RateLimit) -> GuardedSource {
    let client = HttpListingClient::with_base_url(http(), server.uri());
    GuardedSource::new(Arc::new(client), Arc::new(RateLimiter::new(limit)), None)
}

fn token_provider(server: &MockServer) -> Arc<AccessTokenProvider> {
    Arc::new(AccessTokenProvider::new(
        http(),
        format!("{}/api/v1/access_token", server.uri()),
        Credentials::new("client-id", "client-secret"),
        "reddit",
    ))
}

fn listing_body() -> serde_json::Value {
    json!({
        "kind": "Listing",
        "data": {
            "after": "t3_next",
            "children": [
                {"kind": "t3", "data": {"title": "a", "url": "https://i.redd.it/a.jpg"}},
                {"kind": "t3", "data": "garbage"}
            ]
        }
    })
}

// =============================================================================
// Listing pages
// =============================================================================

#[tokio::test]
async fn fetch_page_sends_query_and_parses_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/pics/top.json"))
        .and(query_param("limit", "50"))
        .and(query_param("t", "week"))
        .and(query_param("after", "t3_prev"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body()))
        .expect(1)
        .mount(&server)
        .await;

    let source = guarded(&server, RateLimit::default());
    let request = PageRequest::new(Sort::Top, 50)
        .time(Some(TimeWindow::Week))
        .after(Some("t3_prev".to_string()));
    let page = source.fetch_page(&key("pics"), &request).await.unwrap();

    assert_eq!(page.posts.len(), 1);
    assert_eq!(page.skipped, 1);
    assert_eq!(page.after.as_deref(), Some("t3_next"));
}

#[tokio::test]
async fn missing_topic_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/gone/hot.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = guarded(&server, RateLimit::default());
    let err = source
        .fetch_page(&key("gone"), &PageRequest::new(Sort::Hot, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::TopicNotFound(t) if t == "gone"));
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn upstream_429_blocks_the_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/pics/hot.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "120"))
        .expect(1)
        .mount(&server)
        .await;

    let source = guarded(&server, RateLimit::default());
    let request = PageRequest::new(Sort::Hot, 10);

    let first = source.fetch_page(&key("pics"), &request).await.unwrap_err();
    assert!(matches!(
        first,
        HuginnError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(120)
    ));

    let blocked = source.limiter().status("reddit").blocked_for.unwrap();
    assert!(blocked > Duration::from_secs(100));

    // denied locally; the mock's expect(1) proves no second request
    let second = source.fetch_page(&key("pics"), &request).await.unwrap_err();
    assert!(matches!(second, HuginnError::RateLimited { .. }));
    assert!(second.is_transient());
}

#[tokio::test]
async fn local_budget_denies_before_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/pics/about.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "t5", "data": {}})))
        .expect(2)
        .mount(&server)
        .await;

    let source = guarded(&server, RateLimit::new(2, Duration::from_secs(60)));
    assert!(source.probe(&key("pics")).await.unwrap());
    assert!(source.probe(&key("pics")).await.unwrap());
    let err = source.probe(&key("pics")).await.unwrap_err();
    assert!(err.retry_after().is_some());
}

// =============================================================================
// Topic probes
// =============================================================================

#[tokio::test]
async fn missing_topic_probe_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/doesnotexist123/about.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = TopicKeyResolver::new(
        guarded(&server, RateLimit::default()),
        Arc::new(TopicValidityCache::new()),
    );
    assert!(!resolver.exists(&key("doesnotexist123")).await);
    // served from cache; the mock's expect(1) proves no second request
    assert!(!resolver.exists(&key("doesnotexist123")).await);
}

#[tokio::test]
async fn failed_probe_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/flaky/about.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let resolver = TopicKeyResolver::new(
        guarded(&server, RateLimit::default()),
        Arc::new(TopicValidityCache::new()),
    );
    assert!(!resolver.exists(&key("flaky")).await);
    let err = resolver.try_exists(&key("flaky")).await.unwrap_err();
    assert!(matches!(err, HuginnError::Api { status: 503, .. }));
}

#[tokio::test]
async fn random_key_surfaces_upstream_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r/flaky/about.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/gone/about.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolver = TopicKeyResolver::new(
        guarded(&server, RateLimit::default()),
        Arc::new(TopicValidityCache::new()),
    )
    .with_seeds(vec![key("flaky"), key("gone")]);

    let err = resolver.random_key().await.unwrap_err();
    assert!(matches!(err, HuginnError::Api { status: 503, .. }));
}

#[tokio::test]
async fn random_key_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let resolver = TopicKeyResolver::new(
        guarded(&server, RateLimit::default()),
        Arc::new(TopicValidityCache::new()),
    )
    .with_seeds(vec![key("one"), key("two"), key("three")])
    .max_attempts(2);

    let err = resolver.random_key().await.unwrap_err();
    assert!(matches!(err, HuginnError::NoValidTopic { attempts: 2 }));
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn concurrent_callers_share_one_token_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok", "expires_in": 3600}))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tokens = token_provider(&server);
    let mut callers = JoinSet::new();
    for _ in 0..8 {
        let tokens = Arc::clone(&tokens);
        callers.spawn(async move { tokens.get_token().await });
    }
    while let Some(joined) = callers.join_next().await {
        assert_eq!(joined.unwrap().unwrap(), "tok");
    }
}

#[tokio::test]
async fn token_endpoint_error_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let err = token_provider(&server).get_token().await.unwrap_err();
    assert!(matches!(err, HuginnError::Auth(msg) if msg.contains("invalid_grant")));
}

#[tokio::test]
async fn absurd_token_lifetime_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok", "expires_in": u64::MAX})),
        )
        .mount(&server)
        .await;

    let err = token_provider(&server).get_token().await.unwrap_err();
    assert!(matches!(err, HuginnError::Auth(msg) if msg.contains("expires_in")));
}

#[tokio::test]
async fn bearer_token_is_attached_and_dropped_on_401() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok", "expires_in": 3600})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/pics/hot.json"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = HttpListingClient::with_base_url(http(), server.uri());
    let source = GuardedSource::new(
        Arc::new(client),
        Arc::new(RateLimiter::default()),
        Some(token_provider(&server)),
    );
    let request = PageRequest::new(Sort::Hot, 10);

    for _ in 0..2 {
        let err = source.fetch_page(&key("pics"), &request).await.unwrap_err();
        assert!(matches!(err, HuginnError::Api { status: 401, .. }));
    }
}
