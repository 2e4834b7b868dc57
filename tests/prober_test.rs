//! HTTP prober tests using wiremock

mod common;

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use slotbook::config::ProberConfig;
use slotbook::health::{HealthConfig, HealthMonitor, HttpProber, ProbeError, ResourceProber};
use slotbook::models::{Genre, HealthStatus, Resource};
use slotbook::storage::{MemoryStore, ResourceRepository};
use slotbook::utils::retry::RetryConfig;

const PLAYLIST: &str = "37i9dQZF1DXcBWIGoYBM5M";

fn prober_for(server: &MockServer) -> HttpProber {
    prober_with(server, None)
}

fn prober_with(server: &MockServer, token: Option<&str>) -> HttpProber {
    let config = ProberConfig {
        base_url: format!("{}/v1", server.uri()),
        token: token.map(String::from),
        ..Default::default()
    };
    HttpProber::with_retry(&config, RetryConfig::with_delays(2, 1, 5)).unwrap()
}

fn playlist_path() -> String {
    format!("/v1/playlists/{PLAYLIST}")
}

/// Test that a public playlist reports its track count
#[tokio::test]
async fn test_public_playlist() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": PLAYLIST,
            "public": true,
            "tracks": { "total": 42 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = prober_for(&mock_server)
        .probe(&format!("https://open.spotify.com/playlist/{PLAYLIST}?si=abc"))
        .await
        .unwrap();

    assert!(outcome.is_reachable);
    assert!(outcome.is_public);
    assert_eq!(outcome.occupancy_count, Some(42));
    assert_eq!(outcome.classify(), HealthStatus::Public);
}

/// Test that a hidden playlist classifies as private
#[tokio::test]
async fn test_private_playlist() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "public": false
        })))
        .mount(&mock_server)
        .await;

    let outcome = prober_for(&mock_server)
        .probe(&format!("spotify:playlist:{PLAYLIST}"))
        .await
        .unwrap();

    assert_eq!(outcome.classify(), HealthStatus::Private);
    assert_eq!(outcome.occupancy_count, None);
}

/// Test that 404 means removed and is not retried
#[tokio::test]
async fn test_missing_playlist_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = prober_for(&mock_server).probe(PLAYLIST).await.unwrap();

    assert!(!outcome.is_reachable);
    assert_eq!(outcome.classify(), HealthStatus::Removed);
    assert!(outcome.error_message.is_some());
}

/// Test retry on server errors
#[tokio::test]
async fn test_retry_on_server_error() {
    let mock_server = MockServer::start().await;

    // First 2 requests fail
    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    // Then succeed
    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "public": true,
            "tracks": { "total": 7 }
        })))
        .mount(&mock_server)
        .await;

    let outcome = prober_for(&mock_server).probe(PLAYLIST).await.unwrap();
    assert_eq!(outcome.occupancy_count, Some(7));
}

/// Test that throttling gives up after the retry budget
#[tokio::test]
async fn test_throttling_exhausts_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let err = prober_for(&mock_server).probe(PLAYLIST).await.unwrap_err();
    assert!(matches!(err, ProbeError::UnexpectedStatus(429)));
}

/// Test that client errors are not retried
#[tokio::test]
async fn test_forbidden_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = prober_for(&mock_server).probe(PLAYLIST).await.unwrap_err();
    assert!(matches!(err, ProbeError::UnexpectedStatus(403)));
}

/// Test that the bearer token is sent
#[tokio::test]
async fn test_bearer_token_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .and(header("authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "public": true,
            "tracks": { "total": 1 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = prober_with(&mock_server, Some("sekrit"))
        .probe(PLAYLIST)
        .await
        .unwrap();
    assert!(outcome.is_public);
}

/// Test that malformed bodies are reported
#[tokio::test]
async fn test_invalid_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(playlist_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&mock_server)
        .await;

    let err = prober_for(&mock_server).probe(PLAYLIST).await.unwrap_err();
    assert!(matches!(err, ProbeError::InvalidResponse(_)));
}

/// Test a full refresh pass through the HTTP prober
#[tokio::test]
async fn test_monitor_refresh_over_http() {
    let mock_server = MockServer::start().await;

    let live = "0000000000000000000001";
    let gone = "0000000000000000000002";
    let broken = "0000000000000000000003";

    Mock::given(method("GET"))
        .and(path(format!("/v1/playlists/{live}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "public": true,
            "tracks": { "total": 12 }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/playlists/{gone}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/playlists/{broken}")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::with_resources(vec![
        Resource::new("live", "Live", format!("spotify:playlist:{live}"), Genre::Pop, 50),
        Resource::new("gone", "Gone", format!("spotify:playlist:{gone}"), Genre::Pop, 50),
        Resource::new("broken", "Broken", format!("spotify:playlist:{broken}"), Genre::Pop, 50),
    ]));
    let config = HealthConfig {
        probe_delay: Duration::from_millis(1),
        ..HealthConfig::default()
    };
    let monitor = HealthMonitor::new(store.clone(), Arc::new(prober_for(&mock_server)), config);

    let report = monitor.refresh(t0()).await.unwrap();
    assert_eq!(report.stale, 3);
    assert_eq!(report.probed, 3);
    assert_eq!(report.healthy, 1);
    assert_eq!(report.failed, 1);

    let live = store.get_resource("live").unwrap().unwrap();
    assert_eq!(live.health_status, HealthStatus::Public);
    assert_eq!(live.utilization, 12);
    assert_eq!(live.health_checked_at, Some(t0()));

    let gone = store.get_resource("gone").unwrap().unwrap();
    assert_eq!(gone.health_status, HealthStatus::Removed);

    let broken = store.get_resource("broken").unwrap().unwrap();
    assert_eq!(broken.health_status, HealthStatus::Error);
    assert!(broken.error_message.is_some());

    // Nothing is stale right after a pass
    assert!(monitor.select_stale(t0()).unwrap().is_empty());
}
