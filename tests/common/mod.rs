//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use portfolio_pulse::aggregation::{
    AggregationError, AggregationPort, Alert, AlertMetric, EndpointStat, HourlyStat, TraceQuery,
    TraceStats,
};
use portfolio_pulse::telemetry::{ProbeError, StoreProbe};
use portfolio_pulse::trace::RequestTrace;
use portfolio_pulse::{HttpServer, PulseConfig, Shutdown};

pub const ADMIN_KEY: &str = "test-admin-key";

/// Aggregation backend that keeps everything it is sent.
#[derive(Default)]
pub struct RecordingAggregator {
    ingested: Mutex<Vec<RequestTrace>>,
    resolved: Mutex<Vec<i64>>,
    last_query: Mutex<Option<TraceQuery>>,
    fail_ingest: bool,
}

impl RecordingAggregator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every ingest is rejected, as by a backend that is down.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_ingest: true,
            ..Self::default()
        })
    }

    pub fn ingested(&self) -> Vec<RequestTrace> {
        self.ingested.lock().clone()
    }

    pub fn resolved(&self) -> Vec<i64> {
        self.resolved.lock().clone()
    }

    pub fn last_query(&self) -> Option<TraceQuery> {
        self.last_query.lock().clone()
    }

    /// Ingest runs on a detached task; poll until `count` traces have landed.
    pub async fn wait_for_ingests(&self, count: usize) -> Vec<RequestTrace> {
        for _ in 0..200 {
            if self.ingested.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.ingested()
    }
}

#[async_trait]
impl AggregationPort for RecordingAggregator {
    async fn ingest(&self, trace: &RequestTrace) -> Result<(), AggregationError> {
        self.ingested.lock().push(trace.clone());
        if self.fail_ingest {
            return Err(AggregationError::Backend {
                status: 500,
                body: "backend down".into(),
            });
        }
        Ok(())
    }

    async fn list_unresolved_alerts(&self) -> Result<Vec<Alert>, AggregationError> {
        Ok(vec![Alert {
            id: 7,
            rule_name: "slow responses".into(),
            metric: AlertMetric::P95Duration,
            actual_value: 812.5,
            threshold: 500.0,
            triggered_at: Utc::now(),
            resolved: false,
        }])
    }

    async fn resolve_alert(&self, id: i64) -> Result<(), AggregationError> {
        self.resolved.lock().push(id);
        Ok(())
    }

    async fn endpoint_stats(&self, limit: u32) -> Result<Vec<EndpointStat>, AggregationError> {
        let all = vec![
            EndpointStat {
                method: "GET".into(),
                path: "/api/blog".into(),
                count: 40,
                avg_duration: 12.0,
                error_rate: 0.0,
            },
            EndpointStat {
                method: "GET".into(),
                path: "/api/about".into(),
                count: 12,
                avg_duration: 3.5,
                error_rate: 0.0,
            },
        ];
        Ok(all.into_iter().take(limit as usize).collect())
    }

    async fn hourly_stats(&self, _hours: u32) -> Result<Vec<HourlyStat>, AggregationError> {
        Ok(Vec::new())
    }

    async fn trace_stats(&self) -> Result<TraceStats, AggregationError> {
        Ok(TraceStats {
            total_count: 52,
            avg_duration: 10.1,
            error_rate: 1.9,
        })
    }

    async fn query_traces(&self, query: &TraceQuery) -> Result<Vec<RequestTrace>, AggregationError> {
        *self.last_query.lock() = Some(query.clone());
        Ok(self.ingested())
    }
}

/// Probe with a fixed outcome.
pub struct StubProbe {
    pub healthy: bool,
}

#[async_trait]
impl StoreProbe for StubProbe {
    async fn ping(&self) -> Result<(), ProbeError> {
        if self.healthy {
            Ok(())
        } else {
            Err(ProbeError::Unavailable("database file missing".into()))
        }
    }
}

/// Stand-in for the portfolio content endpoints.
pub fn content_routes() -> Router {
    Router::new()
        .route(
            "/api/about",
            get(|| async { Json(serde_json::json!({ "name": "portfolio" })) }),
        )
        .route(
            "/api/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "content read failed") }),
        )
        .route("/api/panic", get(panicking))
        .route("/static/app.js", get(|| async { "console.log(1)" }))
}

async fn panicking() -> &'static str {
    panic!("handler bug")
}

pub fn test_config() -> PulseConfig {
    let mut config = PulseConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.admin.api_key = ADMIN_KEY.into();
    config.admin.user_id = 42;
    config.telemetry.sample_interval_ms = 100;
    config.telemetry.loop_resolution_ms = 5;
    config.observability.metrics_enabled = false;
    config
}

/// A server on an ephemeral port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
            .expect("server failed");
    }
}

pub async fn spawn_server(aggregator: Arc<dyn AggregationPort>) -> RunningServer {
    let shutdown = Shutdown::new();
    let server = HttpServer::with_components(
        test_config(),
        aggregator,
        Arc::new(StubProbe { healthy: true }),
        content_routes(),
        &shutdown,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server.run(listener));

    RunningServer {
        addr,
        shutdown,
        handle,
    }
}
