//! Query endpoints backed by the aggregation backend.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::aggregation::{Alert, EndpointStat, HourlyStat, TraceQuery, TraceStats};
use crate::error::ApiError;
use crate::http::server::AppState;
use crate::trace::RequestTrace;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<u32>,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Fallback for unmatched paths.
pub async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}

/// GET /api/traces
pub async fn list_traces(
    State(state): State<AppState>,
    Query(query): Query<TraceQuery>,
) -> Result<Json<Vec<RequestTrace>>, ApiError> {
    let query = query.normalized();
    if let (Some(min), Some(max)) = (query.min_duration, query.max_duration) {
        if min > max {
            return Err(ApiError::bad_request("minDuration must not exceed maxDuration"));
        }
    }
    Ok(Json(state.aggregator.query_traces(&query).await?))
}

/// GET /api/traces/stats
pub async fn trace_stats(State(state): State<AppState>) -> Result<Json<TraceStats>, ApiError> {
    Ok(Json(state.aggregator.trace_stats().await?))
}

/// GET /api/traces/endpoints?limit=
pub async fn endpoint_stats(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<EndpointStat>>, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    Ok(Json(state.aggregator.endpoint_stats(limit).await?))
}

/// GET /api/traces/hourly?hours=
pub async fn hourly_stats(
    State(state): State<AppState>,
    Query(query): Query<HoursQuery>,
) -> Result<Json<Vec<HourlyStat>>, ApiError> {
    let hours = query.hours.unwrap_or(24).clamp(1, 168);
    Ok(Json(state.aggregator.hourly_stats(hours).await?))
}

/// GET /api/alerts
pub async fn list_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.aggregator.list_unresolved_alerts().await?))
}

/// POST /api/alerts/{id}/resolve (admin)
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.aggregator.resolve_alert(id).await?;
    tracing::info!(alert_id = id, "Alert resolved");
    Ok(StatusCode::NO_CONTENT)
}
