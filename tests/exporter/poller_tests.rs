use crate::common::*;
use dhub_ratelimit::core::ratelimit::*;
use dhub_ratelimit::exporter::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

struct Harness {
    client: Arc<MockHttpClient>,
    metrics: Arc<ExporterMetrics>,
    state: SharedState,
    poller: Poller,
}

fn harness(client: Arc<MockHttpClient>, credentials: Option<(&str, &str)>) -> Harness {
    let clock = MockClock::new();
    let checker = Arc::new(build_checker(
        &client,
        &clock,
        MockIpSource::returning("203.0.113.7"),
        credentials,
    ));
    let metrics = Arc::new(ExporterMetrics::new().unwrap());
    let state: SharedState = Arc::new(RwLock::new(ExporterState::default()));
    let poller = Poller::new(
        checker,
        Arc::clone(&metrics),
        Arc::clone(&state),
        Duration::from_secs(300),
        Duration::from_secs(5),
    );

    Harness {
        client,
        metrics,
        state,
        poller,
    }
}

#[tokio::test]
async fn test_successful_poll_publishes_result() {
    let h = harness(healthy_client(), Some(("alice", "s3cret")));

    h.poller.poll_once().await.unwrap();

    let state = h.state.read().await;
    assert_eq!(state.attempts, 1);
    assert!(state.last_error.is_none());
    assert_eq!(state.last_result.as_ref().unwrap().remaining(), 76);

    let text = h.metrics.encode().unwrap();
    assert!(text.contains("dockerhub_imagepull_limit{identity=\"auth:alice\"} 100"));
    assert!(text.contains("dockerhub_imagepull_remaining{identity=\"auth:alice\"} 76"));
    assert!(text.contains("dockerhub_imagepull_checkstatus{identity=\"auth:alice\"} 1"));
    assert!(text.contains("dockerhub_imagepull_checktime{identity=\"auth:alice\"}"));
}

#[tokio::test]
async fn test_failed_poll_keeps_previous_result() {
    let client = MockHttpClient::new();
    client.push_token(token_response("tok-1", 300));
    client.push_probe(probe_response("100;w=21600", "76;w=21600"));
    client.push(HttpMethod::Head, PROBE_URL, Err("connection reset".to_string()));
    let h = harness(client, Some(("alice", "s3cret")));

    h.poller.poll_once().await.unwrap();
    let err = h.poller.poll_once().await.unwrap_err();
    assert!(matches!(err, PollError::Check(CheckError::Transport(_))));

    let state = h.state.read().await;
    assert_eq!(state.attempts, 2);
    assert_eq!(state.last_result.as_ref().unwrap().remaining(), 76);
    assert!(state.last_error.as_ref().unwrap().contains("connection reset"));

    let text = h.metrics.encode().unwrap();
    assert!(text.contains("dockerhub_imagepull_checkstatus{identity=\"auth:alice\"} 0"));
    assert!(text.contains("dockerhub_imagepull_remaining{identity=\"auth:alice\"} 76"));
    assert_eq!(h.client.probe_requests(), 2);
}

#[tokio::test]
async fn test_success_after_failure_clears_error() {
    let client = MockHttpClient::new();
    client.push_token(response(500, "down"));
    client.push_token(token_response("tok-1", 300));
    client.push_probe(probe_response("100;w=21600", "50;w=21600"));
    let h = harness(client, Some(("alice", "s3cret")));

    assert!(h.poller.poll_once().await.is_err());
    assert!(h.state.read().await.last_error.is_some());

    h.poller.poll_once().await.unwrap();

    let state = h.state.read().await;
    assert!(state.last_error.is_none());
    assert_eq!(state.last_result.as_ref().unwrap().remaining(), 50);
}

#[tokio::test]
async fn test_anonymous_failure_before_identity_has_no_status() {
    let client = MockHttpClient::new();
    client.push_token(response(503, "down"));
    let clock = MockClock::new();
    let checker = Arc::new(build_checker(
        &client,
        &clock,
        MockIpSource::returning("203.0.113.7"),
        None,
    ));
    let metrics = Arc::new(ExporterMetrics::new().unwrap());
    let state: SharedState = Arc::new(RwLock::new(ExporterState::default()));
    let poller = Poller::new(
        checker,
        Arc::clone(&metrics),
        state,
        Duration::from_secs(300),
        Duration::from_secs(5),
    );

    assert!(poller.poll_once().await.is_err());

    let text = metrics.encode().unwrap();
    assert!(!text.contains("dockerhub_imagepull_checkstatus{"));
    assert!(text.contains("dockerhub_imagepull_checktime{identity=\"unknown\"}"));
}

/// HTTP client that never answers
struct HangingClient;

#[async_trait::async_trait]
impl HttpClientTrait for HangingClient {
    async fn execute_request(&self, _request: HttpRequest) -> Result<HttpResponse, String> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_check_timeout() {
    let checker = Arc::new(
        Checker::builder()
            .http_client(Arc::new(HangingClient))
            .ip_source(Box::new(MockIpSource::returning("203.0.113.7")))
            .build()
            .unwrap(),
    );
    let metrics = Arc::new(ExporterMetrics::new().unwrap());
    let state: SharedState = Arc::new(RwLock::new(ExporterState::default()));
    let poller = Poller::new(
        checker,
        metrics,
        Arc::clone(&state),
        Duration::from_secs(300),
        Duration::from_secs(5),
    );

    let err = poller.poll_once().await.unwrap_err();

    assert!(matches!(err, PollError::Timeout(d) if d == Duration::from_secs(5)));
    assert!(state.read().await.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_run_polls_immediately_then_on_interval() {
    let client = MockHttpClient::new();
    client.push_token(response(503, "down"));
    let h = harness(client, Some(("alice", "s3cret")));
    let state = Arc::clone(&h.state);

    let task = tokio::spawn(h.poller.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(state.read().await.attempts, 1);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(state.read().await.attempts, 2);

    task.abort();
}
