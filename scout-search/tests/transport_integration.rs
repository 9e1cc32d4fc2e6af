//! Integration tests for the transport policies and the Serper engine
//! against a local mock HTTP server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use scout_search::{
    CooldownConfig, HttpFetcher, NetworkConfig, PageFetcher, RetryConfig, SearchConfig,
    SearchEngine, SearchError, Searcher, Transport,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_network(max_attempts: u32, rate_limit_threshold: u32) -> NetworkConfig {
    NetworkConfig {
        global_in_flight: 4,
        per_host: 2,
        request_timeout_secs: 5,
        retry: RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        cooldown: CooldownConfig {
            rate_limit_threshold,
            cooldown_secs: 600,
        },
        ..Default::default()
    }
}

fn fetcher(config: &NetworkConfig) -> HttpFetcher {
    let transport =
        Transport::new(config, Some("ScoutTest/1.0"), CancellationToken::new()).expect("transport");
    HttpFetcher::new(transport)
}

#[tokio::test]
async fn fetch_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>info@retailerx.com</p>"))
        .mount(&server)
        .await;

    let page = fetcher(&fast_network(3, 3))
        .fetch(&format!("{}/contact", server.uri()))
        .await
        .expect("fetch");
    assert_eq!(page.status, 200);
    assert!(page.body.contains("info@retailerx.com"));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetcher(&fast_network(3, 3))
        .fetch(&format!("{}/flaky", server.uri()))
        .await
        .expect("third attempt should succeed");
    assert_eq!(page.body, "ok");
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher(&fast_network(5, 3))
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Permanent { status: Some(404), .. }));
}

#[tokio::test]
async fn repeated_rate_limits_open_host_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = fetcher(&fast_network(1, 2));
    let url = format!("{}/page", server.uri());
    for _ in 0..2 {
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(err.is_retryable());
    }
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, SearchError::CoolingDown(_)));
}

#[tokio::test]
async fn probe_treats_client_errors_as_reachable() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let fetcher = fetcher(&fast_network(3, 3));
    assert!(fetcher.probe(&server.uri()).await.expect("probe"));
    // Nothing listens on port 9 of localhost.
    assert!(!fetcher.probe("http://127.0.0.1:9/").await.expect("probe"));
}

#[tokio::test]
async fn serper_engine_sends_key_and_parses_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("X-API-KEY", "test-key"))
        .and(body_json(serde_json::json!({"q": "funko stockists", "num": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "organic": [
                {"title": "Funko Stockists", "link": "https://funko.com/stockists", "snippet": "Find a store"},
                {"title": "RetailerX", "link": "https://retailerx.com/", "snippet": "Funko Pop! figures"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let searcher = Searcher::new(SearchConfig {
        engines: vec![SearchEngine::Serper],
        max_results: 5,
        request_delay_ms: (0, 0),
        serper_api_key: Some("test-key".into()),
        serper_base_url: server.uri(),
        ..Default::default()
    })
    .expect("searcher");
    let transport = Transport::new(&fast_network(2, 3), None, CancellationToken::new())
        .expect("transport");

    let results = searcher
        .search(&transport, "funko stockists", 5)
        .await
        .expect("search");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, "https://funko.com/stockists");

    // Second identical query is served from the searcher's cache.
    let cached = searcher
        .search(&transport, "Funko Stockists", 5)
        .await
        .expect("cached search");
    assert_eq!(cached.len(), 2);
}

#[tokio::test]
async fn serper_auth_failure_is_reported_as_all_engines_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let searcher = Searcher::new(SearchConfig {
        engines: vec![SearchEngine::Serper],
        request_delay_ms: (0, 0),
        serper_api_key: Some("bad".into()),
        serper_base_url: server.uri(),
        cache_ttl_seconds: 0,
        ..Default::default()
    })
    .expect("searcher");
    let transport = Transport::new(&fast_network(3, 3), None, CancellationToken::new())
        .expect("transport");

    let err = searcher.search(&transport, "funko", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::AllEnginesFailed(_)));
    assert!(err.to_string().contains("401"));
}
