//! Readiness polling against a local HTTP endpoint.

use std::time::Duration;

use tokio::time::Instant;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gearctl::readiness::{ReadinessProbe, POLL_INTERVAL};

fn ping_url(server: &MockServer) -> String {
    format!("{}/gear-ping/deploy?name=app.war", server.uri())
}

#[tokio::test]
async fn test_ready_after_not_deployed_answers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gear-ping/deploy"))
        .and(query_param("name", "app.war"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gear-ping/deploy"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let probe = ReadinessProbe::new()
        .unwrap()
        .with_interval(Duration::from_millis(20));
    let deadline = Instant::now() + Duration::from_secs(5);

    assert!(probe.wait_until_ready(&ping_url(&server), deadline).await);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_failing_endpoint_times_out_on_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let probe = ReadinessProbe::new().unwrap();
    assert_eq!(probe.interval(), POLL_INTERVAL);

    let started = Instant::now();
    let deadline = started + Duration::from_millis(500);
    let ready = probe.wait_until_ready(&ping_url(&server), deadline).await;
    let elapsed = started.elapsed();

    assert!(!ready);
    assert!(elapsed >= Duration::from_millis(500), "returned after {elapsed:?}");
    assert!(
        elapsed < Duration::from_millis(500) + POLL_INTERVAL,
        "returned after {elapsed:?}"
    );
}

#[tokio::test]
async fn test_connection_failure_is_not_ready() {
    let probe = ReadinessProbe::new()
        .unwrap()
        .with_interval(Duration::from_millis(50));
    let deadline = Instant::now() + Duration::from_millis(200);

    // Nothing listens on the discard port.
    assert!(!probe.wait_until_ready("http://127.0.0.1:9/", deadline).await);
}

#[tokio::test]
async fn test_past_deadline_does_not_poll() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let probe = ReadinessProbe::new().unwrap();
    assert!(!probe.wait_until_ready(&ping_url(&server), Instant::now()).await);
}
