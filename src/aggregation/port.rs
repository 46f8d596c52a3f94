//! The contract this service consumes from the aggregation backend.

use async_trait::async_trait;
use thiserror::Error;

use crate::aggregation::types::{Alert, EndpointStat, HourlyStat, TraceQuery, TraceStats};
use crate::trace::RequestTrace;

#[derive(Debug, Error)]
pub enum AggregationError {
    /// No backend is configured.
    #[error("aggregation backend is not configured")]
    Disabled,

    #[error("aggregation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("aggregation backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("invalid aggregation URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Storage and analytics for traces. Implemented elsewhere; this crate only calls it.
#[async_trait]
pub trait AggregationPort: Send + Sync {
    /// Persist one trace. Callers treat failure as non-fatal.
    async fn ingest(&self, trace: &RequestTrace) -> Result<(), AggregationError>;

    async fn list_unresolved_alerts(&self) -> Result<Vec<Alert>, AggregationError>;

    async fn resolve_alert(&self, id: i64) -> Result<(), AggregationError>;

    /// Top endpoints ranked by request count, descending.
    async fn endpoint_stats(&self, limit: u32) -> Result<Vec<EndpointStat>, AggregationError>;

    async fn hourly_stats(&self, hours: u32) -> Result<Vec<HourlyStat>, AggregationError>;

    async fn trace_stats(&self) -> Result<TraceStats, AggregationError>;

    async fn query_traces(&self, query: &TraceQuery) -> Result<Vec<RequestTrace>, AggregationError>;
}
