//! Request-boundary instrumentation.
//!
//! Every request under the API prefix that is not excluded produces exactly one
//! [`RequestTrace`], on success and error paths alike. The trace is published
//! to live subscribers synchronously and handed to the aggregation backend on a
//! detached task, so a slow or failing backend never touches the response.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::USER_AGENT, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregation::AggregationPort;
use crate::config::TracingConfig;
use crate::http::middleware::AuthenticatedUser;
use crate::observability::metrics;
use crate::stream::TraceHub;
use crate::trace::client_ip::{resolve_client_ip, UNKNOWN};
use crate::trace::model::RequestTrace;
use crate::trace::phase::PhaseTimer;

pub const X_TRACE_ID: &str = "x-trace-id";

const MAX_TRACE_ID_LEN: usize = 128;

/// Trace identity attached to the in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
}

pub struct TraceRecorder {
    api_prefix: String,
    excluded_prefixes: Vec<String>,
    sink: Arc<dyn AggregationPort>,
    hub: TraceHub,
}

impl TraceRecorder {
    pub fn new(config: &TracingConfig, sink: Arc<dyn AggregationPort>, hub: TraceHub) -> Self {
        Self {
            api_prefix: config.api_prefix.trim_end_matches('/').to_string(),
            excluded_prefixes: config.excluded_prefixes.clone(),
            sink,
            hub,
        }
    }

    pub fn hub(&self) -> &TraceHub {
        &self.hub
    }

    /// Whether requests to `path` are instrumented.
    ///
    /// Stream endpoints are excluded so that watching traces does not itself
    /// generate traces.
    pub fn is_traced(&self, path: &str) -> bool {
        let under_prefix = self.api_prefix.is_empty()
            || path == self.api_prefix
            || path
                .strip_prefix(&self.api_prefix)
                .is_some_and(|rest| rest.starts_with('/'));

        under_prefix
            && !self
                .excluded_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Publish a finished trace and submit it for ingestion without waiting.
    pub fn record(&self, trace: RequestTrace) {
        metrics::record_trace(&trace.method, trace.status_code, trace.duration_ms);

        let trace = Arc::new(trace);
        self.hub.publish(trace.clone());

        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.ingest(&trace).await {
                metrics::record_ingest_failure();
                tracing::warn!(
                    trace_id = %trace.trace_id,
                    error = %e,
                    "Failed to ingest trace"
                );
            }
        });
    }
}

/// Use the caller's trace id when it is usable, otherwise mint a new one.
pub fn resolve_trace_id(headers: &HeaderMap) -> String {
    headers
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_TRACE_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn trace_middleware(
    State(recorder): State<Arc<TraceRecorder>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mut timer = PhaseTimer::start();
    let path = request.uri().path().to_string();

    if !recorder.is_traced(&path) {
        return next.run(request).await;
    }

    let trace_id = resolve_trace_id(request.headers());
    let method = request.method().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = resolve_client_ip(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN)
        .to_string();

    request.extensions_mut().insert(TraceContext {
        trace_id: trace_id.clone(),
    });

    let span = tracing::info_span!(
        "http.request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    timer.mark_handler_start();
    let mut response = next.run(request).instrument(span).await;
    let (timing, duration_ms) = timer.finish();

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(X_TRACE_ID, value);
    }

    let user_id = response
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.id);

    let status_code = response.status().as_u16();
    tracing::debug!(
        trace_id = %trace_id,
        status = status_code,
        duration_ms,
        "Request traced"
    );

    recorder.record(RequestTrace {
        trace_id,
        method,
        path,
        status_code,
        duration_ms,
        timing,
        user_id,
        user_agent,
        ip,
        timestamp: Utc::now(),
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::DisabledAggregator;

    fn recorder() -> TraceRecorder {
        TraceRecorder::new(
            &TracingConfig::default(),
            Arc::new(DisabledAggregator),
            TraceHub::new(16),
        )
    }

    #[test]
    fn api_paths_are_traced() {
        let r = recorder();
        assert!(r.is_traced("/api/projects"));
        assert!(r.is_traced("/api/blog/hello-world"));
        assert!(r.is_traced("/api"));
    }

    #[test]
    fn excluded_and_foreign_paths_are_not_traced() {
        let r = recorder();
        assert!(!r.is_traced("/api/health"));
        assert!(!r.is_traced("/api/telemetry/stream"));
        assert!(!r.is_traced("/api/traces/stream"));
        assert!(!r.is_traced("/"));
        assert!(!r.is_traced("/assets/app.js"));
        assert!(!r.is_traced("/apiary"));
    }

    #[test]
    fn inbound_trace_id_is_propagated() {
        let mut headers = HeaderMap::new();
        headers.insert(X_TRACE_ID, HeaderValue::from_static("upstream-42"));
        assert_eq!(resolve_trace_id(&headers), "upstream-42");
    }

    #[test]
    fn missing_or_blank_trace_id_is_generated() {
        let generated = resolve_trace_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&generated).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(X_TRACE_ID, HeaderValue::from_static("   "));
        assert!(Uuid::parse_str(&resolve_trace_id(&headers)).is_ok());
    }

    #[test]
    fn oversized_trace_id_is_replaced() {
        let mut headers = HeaderMap::new();
        let long = "x".repeat(MAX_TRACE_ID_LEN + 1);
        headers.insert(X_TRACE_ID, HeaderValue::from_str(&long).unwrap());
        assert_ne!(resolve_trace_id(&headers), long);
    }
}
