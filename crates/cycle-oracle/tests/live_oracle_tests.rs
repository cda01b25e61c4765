//! 라이브 오라클 HTTP 계약 테스트 (mockito).

use std::time::Duration;

use cycle_core::OracleQuery;
use cycle_oracle::{LiveOracle, LiveOracleConfig, ProbabilityOracle};
use mockito::Matcher;
use serde_json::json;

fn query(price: f64) -> OracleQuery {
    OracleQuery {
        timestamp: 1_746_057_600_000,
        price,
        delta: 0.000_42,
        ltma: 2500.0,
        steps: 10,
        range: 0.005,
        lower: price * 0.995,
        upper: price * 1.005,
    }
}

fn oracle(url: String, max_retries: u32) -> LiveOracle {
    LiveOracle::new(
        LiveOracleConfig::new(url)
            .with_max_retries(max_retries)
            .with_backoff(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_success_is_memoized() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/probability")
        .match_body(Matcher::PartialJson(json!({
            "steps": 10,
            "range": 0.005,
            "current_price": 2500.0,
            "ltma": 2500.0
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"probability_within_range": 0.91, "lower_bound": 2487.5,
                "upper_bound": 2512.5, "expected_price": 2501.0}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let oracle = oracle(format!("{}/probability", server.url()), 3);
    let first = oracle.fetch_probability(&query(2500.0)).await;
    let second = oracle.fetch_probability(&query(2500.001)).await;

    assert_eq!(first.probability, 0.91);
    assert_eq!(first.expected_price, Some(2501.0));
    assert_eq!(second, first);

    let stats = oracle.stats();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.cache_size, 1);
    mock.assert_async().await;

    oracle.clear_cache();
    assert_eq!(oracle.stats().cache_size, 0);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/probability")
        .with_status(503)
        .with_body("overloaded")
        .expect(3)
        .create_async()
        .await;

    let oracle = oracle(format!("{}/probability", server.url()), 2);
    let estimate = oracle.fetch_probability(&query(2500.0)).await;

    assert_eq!(estimate.probability, 0.0);
    assert!(estimate.error.as_deref().unwrap().contains("503"));
    assert_eq!(oracle.stats().requests, 3);
    assert_eq!(oracle.stats().errors, 3);
    // 실패는 메모이제이션하지 않음
    assert_eq!(oracle.stats().cache_size, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invalid_json_is_failure() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/probability")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .expect(2)
        .create_async()
        .await;

    let oracle = oracle(format!("{}/probability", server.url()), 1);
    let estimate = oracle.fetch_probability(&query(2500.0)).await;

    assert_eq!(estimate.probability, 0.0);
    assert!(estimate.is_error());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/probability")
        .with_status(400)
        .with_body(r#"{"detail": "bad range"}"#)
        .expect(4)
        .create_async()
        .await;

    let oracle = oracle(format!("{}/probability", server.url()), 3);
    let estimate = oracle.fetch_probability(&query(2500.0)).await;

    assert!(estimate.is_error());
    assert!(estimate.error.as_deref().unwrap().contains("400"));
    assert_eq!(oracle.stats().requests, 4);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_backoff_doubles_between_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/probability")
        .with_status(503)
        .expect(4)
        .create_async()
        .await;

    let oracle = LiveOracle::new(
        LiveOracleConfig::new(format!("{}/probability", server.url()))
            .with_max_retries(3)
            .with_backoff(Duration::from_millis(100))
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap();

    assert_eq!(oracle.backoff_delay(1), Duration::from_millis(100));
    assert_eq!(oracle.backoff_delay(2), Duration::from_millis(200));
    assert_eq!(oracle.backoff_delay(3), Duration::from_millis(400));

    // 100 + 200 + 400 = 700ms (선형이라면 100 + 200 + 300 = 600ms)
    let started = std::time::Instant::now();
    let estimate = oracle.fetch_probability(&query(2500.0)).await;
    let elapsed = started.elapsed();

    assert!(estimate.is_error());
    assert!(elapsed >= Duration::from_millis(700), "elapsed {elapsed:?}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_hit_rate() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/probability")
        .with_status(200)
        .with_body(r#"{"probability_within_range": 0.8}"#)
        .create_async()
        .await;

    let oracle = oracle(format!("{}/probability", server.url()), 0);
    assert_eq!(oracle.stats().hit_rate(), 0.0);

    for _ in 0..4 {
        oracle.fetch_probability(&query(2500.0)).await;
    }
    let stats = oracle.stats();
    assert_eq!(stats.lookups, 4);
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.hit_rate(), 75.0);
}

#[tokio::test]
async fn test_missing_probability_treated_as_zero() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/probability")
        .with_status(200)
        .with_body(r#"{"lower_bound": 2487.5}"#)
        .create_async()
        .await;

    let oracle = oracle(format!("{}/probability", server.url()), 0);
    let estimate = oracle.fetch_probability(&query(2500.0)).await;

    assert_eq!(estimate.probability, 0.0);
    assert!(!estimate.is_error());
}

#[test]
fn test_sync_adapter_uses_runtime_handle() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/probability")
        .with_status(200)
        .with_body(r#"{"probability_within_range": 0.77}"#)
        .create();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let live = oracle(format!("{}/probability", server.url()), 0)
        .with_runtime(runtime.handle().clone());

    let estimate = std::thread::scope(|s| {
        s.spawn(|| live.estimate(&query(2500.0)))
            .join()
            .unwrap()
    })
    .unwrap();
    assert_eq!(estimate.probability, 0.77);
}

#[test]
fn test_sync_adapter_without_runtime_fails_safe() {
    let live = oracle("http://127.0.0.1:9/probability".to_string(), 0);
    let estimate = live.estimate(&query(2500.0)).unwrap();
    assert_eq!(estimate.probability, 0.0);
    assert!(estimate.is_error());
}
