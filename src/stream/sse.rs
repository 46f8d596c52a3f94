//! Server-sent event endpoints.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::time::Duration;

use crate::http::server::AppState;
use crate::telemetry::{ChaosFlags, ChaosOverlay};

#[derive(Debug, Default, Deserialize)]
pub struct TelemetryStreamQuery {
    /// Comma-joined subset of `cpu,memory`.
    pub chaos: Option<String>,
}

/// GET /api/telemetry/stream
///
/// Pushes one snapshot immediately and then one per sampling tick. Flags are
/// parsed once for the lifetime of the connection.
pub async fn telemetry_stream(
    State(state): State<AppState>,
    Query(query): Query<TelemetryStreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let flags = ChaosFlags::from_query(query.chaos.as_deref());
    tracing::debug!(chaos = %flags, "Telemetry stream connected");

    let stream = state
        .feed
        .subscribe()
        .map(move |snapshot| Event::default().json_data(ChaosOverlay::apply(&snapshot, flags)));

    Sse::new(stream).keep_alive(keep_alive(state.config.telemetry.keep_alive_secs))
}

/// GET /api/traces/stream
///
/// Pushes every trace recorded while the connection is open. No replay.
pub async fn trace_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!("Trace stream connected");

    let stream = state
        .recorder
        .hub()
        .subscribe()
        .map(|trace| Event::default().json_data(&*trace));

    Sse::new(stream).keep_alive(keep_alive(state.config.telemetry.keep_alive_secs))
}

fn keep_alive(secs: u64) -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(secs.max(1)))
        .text("ping")
}
