//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble shared state (recorder, telemetry feed, aggregation backend)
//! - Create the Axum router with the observability endpoints
//! - Merge the host application's content routes so they are traced too
//! - Wire up middleware (panic catching, timeout, request tracing)
//! - Serve with graceful shutdown, ending open streams

use axum::{
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::aggregation::{self, AggregationError, AggregationPort};
use crate::config::PulseConfig;
use crate::error::ApiError;
use crate::http::handlers;
use crate::http::middleware::admin_guard;
use crate::lifecycle::Shutdown;
use crate::stream::{sse, TelemetryFeed, TraceHub};
use crate::telemetry::{EventLoopMonitor, SqliteProbe, StoreProbe, TelemetrySampler};
use crate::trace::{trace_middleware, TraceRecorder};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PulseConfig>,
    pub recorder: Arc<TraceRecorder>,
    pub feed: TelemetryFeed,
    pub aggregator: Arc<dyn AggregationPort>,
}

impl AppState {
    /// Wire the pipeline together and start the telemetry feed. Must be called
    /// inside a Tokio runtime.
    pub fn start(
        config: PulseConfig,
        aggregator: Arc<dyn AggregationPort>,
        probe: Arc<dyn StoreProbe>,
        shutdown: &Shutdown,
    ) -> (Self, Arc<TelemetrySampler>, JoinHandle<()>) {
        let monitor = Arc::new(EventLoopMonitor::new(Duration::from_millis(
            config.telemetry.loop_resolution_ms,
        )));
        let sampler = Arc::new(TelemetrySampler::new(
            monitor,
            probe,
            Duration::from_millis(config.telemetry.probe_timeout_ms),
        ));
        let (feed, feed_task) = TelemetryFeed::start(
            sampler.clone(),
            Duration::from_millis(config.telemetry.sample_interval_ms),
            shutdown.subscribe(),
        );

        let hub = TraceHub::new(config.tracing.stream_queue_capacity);
        let recorder = Arc::new(TraceRecorder::new(&config.tracing, aggregator.clone(), hub));

        let state = Self {
            config: Arc::new(config),
            recorder,
            feed,
            aggregator,
        };
        (state, sampler, feed_task)
    }
}

/// A panicking handler answers with the same JSON error body as any other 500.
fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    ApiError::internal("handler panicked").into_response()
}

/// Build the router: observability endpoints plus `content`, all behind the
/// trace middleware.
///
/// Layer order, outermost first: HTTP span, trace recording, timeout, panic
/// catching. Timeouts and panics therefore still produce a trace.
#[allow(deprecated)]
pub fn build_router(state: AppState, content: Router) -> Router {
    let recorder = state.recorder.clone();
    let timeout = Duration::from_secs(state.config.timeouts.request_secs);

    let resolve = post(handlers::resolve_alert)
        .route_layer(from_fn_with_state(state.clone(), admin_guard));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/telemetry/stream", get(sse::telemetry_stream))
        .route("/api/traces/stream", get(sse::trace_stream))
        .route("/api/traces", get(handlers::list_traces))
        .route("/api/traces/stats", get(handlers::trace_stats))
        .route("/api/traces/endpoints", get(handlers::endpoint_stats))
        .route("/api/traces/hourly", get(handlers::hourly_stats))
        .route("/api/alerts", get(handlers::list_alerts))
        .route("/api/alerts/{id}/resolve", resolve)
        .with_state(state)
        .merge(content)
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::new(timeout))
        .layer(from_fn_with_state(recorder, trace_middleware))
        .layer(TraceLayer::new_for_http())
}

/// HTTP server for the observability pipeline.
pub struct HttpServer {
    router: Router,
    state: AppState,
    sampler: Arc<TelemetrySampler>,
    feed_task: JoinHandle<()>,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a server from configuration: SQLite liveness probe and the
    /// configured aggregation backend. No content routes.
    pub fn new(config: PulseConfig, shutdown: &Shutdown) -> Result<Self, AggregationError> {
        let aggregator = aggregation::from_config(&config.aggregation)?;
        let probe = Arc::new(SqliteProbe::new(&config.database.path));
        Ok(Self::with_components(config, aggregator, probe, Router::new(), shutdown))
    }

    /// Create a server from explicit collaborators.
    pub fn with_components(
        config: PulseConfig,
        aggregator: Arc<dyn AggregationPort>,
        probe: Arc<dyn StoreProbe>,
        content: Router,
        shutdown: &Shutdown,
    ) -> Self {
        let (state, sampler, feed_task) = AppState::start(config, aggregator, probe, shutdown);
        let router = build_router(state.clone(), content);
        Self {
            router,
            state,
            sampler,
            feed_task,
            shutdown: shutdown.clone(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until the shutdown coordinator fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut shutdown_rx = self.shutdown.subscribe();
        let hub = self.state.recorder.hub().clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                // Trace streams never end on their own; telemetry streams end
                // when the feed task drops its sender.
                hub.close();
            })
            .await?;

        if let Err(e) = self.feed_task.await {
            tracing::warn!(error = %e, "Telemetry feed task ended abnormally");
        }
        self.sampler.monitor().disable();

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
