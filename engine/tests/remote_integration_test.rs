//! Integration tests for the connection probe and the secure update
//! indicator against a mock update host

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use sdk::errors::UpdateError;
use secure_updates_engine::activity_log::MemoryActivityLog;
use secure_updates_engine::config::RemoteHostConfig;
use secure_updates_engine::indicator::{SecureUpdateIndicator, SECURE_UPDATE_AVAILABLE};
use secure_updates_engine::probe::{probe, ConnectionProbe, ProbeFailure, SUCCESS_MESSAGE};
use secure_updates_engine::rate_limiter::RateLimiter;
use secure_updates_engine::remote::{HttpRemote, RemoteHost};
use secure_updates_engine::secrets::SecretString;
use secure_updates_engine::trust::TrustState;

const CONNECTED_PATH: &str = "/wp-json/secure-updates-server/v1/connected";
const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

fn remote() -> Arc<HttpRemote> {
    Arc::new(HttpRemote::new(Duration::from_secs(15), true).unwrap())
}

#[tokio::test]
async fn test_probe_succeeds_on_200() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONNECTED_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(probe(remote().as_ref(), &server.uri()).await, Ok(()));
}

#[tokio::test]
async fn test_probe_with_trailing_slash() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONNECTED_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/", server.uri());
    assert!(probe(remote().as_ref(), &url).await.is_ok());
}

#[tokio::test]
async fn test_probe_404_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONNECTED_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let failure = probe(remote().as_ref(), &server.uri()).await.unwrap_err();
    assert_eq!(failure, ProbeFailure::Status(404));
    assert!(failure.to_string().contains("404"));
}

#[tokio::test]
async fn test_probe_other_2xx_is_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONNECTED_PATH))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let failure = probe(remote().as_ref(), &server.uri()).await.unwrap_err();
    assert_eq!(failure, ProbeFailure::Status(204));
}

#[tokio::test]
async fn test_probe_does_not_follow_redirects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONNECTED_PATH))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let failure = probe(remote().as_ref(), &server.uri()).await.unwrap_err();
    assert_eq!(failure, ProbeFailure::Status(302));
}

#[tokio::test]
async fn test_probe_unreachable_host_is_transport_failure() {
    // Nothing listens on the discard port
    let failure = probe(remote().as_ref(), "http://127.0.0.1:9").await.unwrap_err();
    assert!(matches!(failure, ProbeFailure::Transport(_)));
}

#[tokio::test]
async fn test_probe_sends_no_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONNECTED_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    probe(remote().as_ref(), &server.uri()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_connection_test_throttles_second_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONNECTED_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let probe = ConnectionProbe::new(
        remote(),
        Arc::new(RateLimiter::default()),
        Arc::new(MemoryActivityLog::new()),
    );
    let t0 = Instant::now();

    let first = probe.test_connection(&server.uri(), t0).await;
    assert!(first.success);
    assert_eq!(first.message, SUCCESS_MESSAGE);

    let second = probe
        .test_connection(&server.uri(), t0 + Duration::from_secs(2))
        .await;
    assert!(!second.success);
    assert_eq!(second.message, ProbeFailure::Throttled.to_string());
}

fn indicator(remote: Arc<HttpRemote>) -> SecureUpdateIndicator {
    SecureUpdateIndicator::new(remote, Arc::new(MemoryActivityLog::new()))
}

fn host(server: &MockServer) -> RemoteHostConfig {
    RemoteHostConfig::new(server.uri(), true, SecretString::new("test-api-key"))
}

#[tokio::test]
async fn test_indicator_absent_checksum_shows_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/secure-updates-server/v1/download/akismet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "5.3" })))
        .expect(1)
        .mount(&server)
        .await;

    let info = indicator(remote())
        .plugin_information("akismet", &host(&server), &TrustState::from_slugs(["akismet"]))
        .await
        .unwrap();
    assert!(info.is_none());
}

#[tokio::test]
async fn test_indicator_with_checksum() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/secure-updates-server/v1/download/akismet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "checksum": HELLO_SHA256 })))
        .mount(&server)
        .await;

    let indicator = indicator(remote());
    let trust = TrustState::from_slugs(["akismet"]);

    let info = indicator
        .plugin_information("akismet", &host(&server), &trust)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.message, SECURE_UPDATE_AVAILABLE);

    let verified = indicator
        .verify_package("akismet", &host(&server), &trust, &b"hello world"[..])
        .await;
    assert!(verified.is_ok());

    let tampered = indicator
        .verify_package("akismet", &host(&server), &trust, &b"hello w0rld"[..])
        .await;
    assert!(matches!(tampered, Err(UpdateError::Integrity(_))));
}

#[tokio::test]
async fn test_indicator_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/secure-updates-server/v1/download/akismet"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = remote()
        .download_metadata(&server.uri(), "akismet")
        .await;
    assert!(matches!(result, Err(UpdateError::MalformedResponse(_))));

    // The indicator treats an unusable answer as "no indicator"
    let info = indicator(remote())
        .plugin_information("akismet", &host(&server), &TrustState::from_slugs(["akismet"]))
        .await
        .unwrap();
    assert!(info.is_none());
}
