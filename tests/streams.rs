//! End-to-end stream tests against a server on a real socket.

use std::time::Duration;

use portfolio_pulse::telemetry::TelemetrySnapshot;
use portfolio_pulse::trace::RequestTrace;
use pulse_sdk::{ConnectionState, StreamClient, StreamOptions, TELEMETRY_PATH, TRACES_PATH};

mod common;
use common::{spawn_server, RecordingAggregator};

async fn wait_for_items<T: serde::de::DeserializeOwned + Send + 'static>(
    client: &StreamClient<T>,
    count: u64,
) {
    let mut updates = client.updates();
    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|n| *n >= count))
        .await
        .expect("stream items did not arrive")
        .unwrap();
}

async fn wait_for_state<T: serde::de::DeserializeOwned + Send + 'static>(
    client: &StreamClient<T>,
    state: ConnectionState,
) {
    let mut changes = client.state_changes();
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|s| *s == state))
        .await
        .expect("state not reached")
        .unwrap();
}

#[tokio::test]
async fn telemetry_stream_applies_requested_chaos() {
    let server = spawn_server(RecordingAggregator::new()).await;

    let client: StreamClient<TelemetrySnapshot> =
        StreamClient::new(&server.base_url(), TELEMETRY_PATH, StreamOptions::telemetry()).unwrap();
    client.set_query(Some("chaos=cpu"));
    wait_for_items(&client, 2).await;

    let snapshot = client.latest().unwrap();
    assert!(snapshot.chaos.cpu_pressure);
    assert!(!snapshot.chaos.memory_pressure);
    assert!(snapshot.event_loop.lag_ms >= 40.0, "lag {}", snapshot.event_loop.lag_ms);
    assert!(snapshot.database.connected);
    assert_eq!(snapshot.process.pid, std::process::id());

    client.disconnect();
    server.stop().await;
}

#[tokio::test]
async fn telemetry_stream_without_chaos_reports_plain_metrics() {
    let server = spawn_server(RecordingAggregator::new()).await;

    let client: StreamClient<TelemetrySnapshot> =
        StreamClient::new(&server.base_url(), TELEMETRY_PATH, StreamOptions::telemetry()).unwrap();
    client.connect();
    wait_for_items(&client, 3).await;

    for snapshot in client.items() {
        assert!(!snapshot.chaos.cpu_pressure);
        assert!(!snapshot.chaos.memory_pressure);
        assert_eq!(snapshot.memory.external_mb, 0.0);
        assert!(snapshot.timestamp > 0);
    }
    let timestamps: Vec<i64> = client.items().iter().map(|s| s.timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));

    client.disconnect();
    server.stop().await;
}

#[tokio::test]
async fn trace_stream_delivers_completed_requests_only() {
    let server = spawn_server(RecordingAggregator::new()).await;

    let client: StreamClient<RequestTrace> =
        StreamClient::new(&server.base_url(), TRACES_PATH, StreamOptions::traces()).unwrap();
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    let http = reqwest::Client::new();
    let response = http.get(server.url("/api/about")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let health = http.get(server.url("/api/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    let missing = http.get(server.url("/api/missing")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    wait_for_items(&client, 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let paths: Vec<(String, u16)> = client
        .items()
        .into_iter()
        .map(|t| (t.path, t.status_code))
        .collect();
    assert_eq!(
        paths,
        vec![("/api/about".to_string(), 200), ("/api/missing".to_string(), 404)]
    );
    assert_eq!(client.latest().unwrap().ip, "127.0.0.1");

    client.disconnect();
    server.stop().await;
}

#[tokio::test]
async fn shutdown_ends_open_streams() {
    let server = spawn_server(RecordingAggregator::new()).await;

    let traces: StreamClient<RequestTrace> =
        StreamClient::new(&server.base_url(), TRACES_PATH, StreamOptions::traces()).unwrap();
    let telemetry: StreamClient<TelemetrySnapshot> =
        StreamClient::new(&server.base_url(), TELEMETRY_PATH, StreamOptions::telemetry()).unwrap();
    traces.connect();
    telemetry.connect();
    wait_for_state(&traces, ConnectionState::Connected).await;
    wait_for_items(&telemetry, 1).await;

    server.stop().await;

    wait_for_state(&traces, ConnectionState::Error).await;
    wait_for_state(&telemetry, ConnectionState::Error).await;
    traces.disconnect();
    telemetry.disconnect();
    assert_eq!(traces.state(), ConnectionState::Disconnected);
}
