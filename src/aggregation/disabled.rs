//! Stand-in used when no aggregation backend is configured.

use async_trait::async_trait;

use crate::aggregation::port::{AggregationError, AggregationPort};
use crate::aggregation::types::{Alert, EndpointStat, HourlyStat, TraceQuery, TraceStats};
use crate::trace::RequestTrace;

/// Drops ingested traces and reports every query as unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAggregator;

#[async_trait]
impl AggregationPort for DisabledAggregator {
    async fn ingest(&self, trace: &RequestTrace) -> Result<(), AggregationError> {
        tracing::trace!(trace_id = %trace.trace_id, "Aggregation disabled, trace not stored");
        Ok(())
    }

    async fn list_unresolved_alerts(&self) -> Result<Vec<Alert>, AggregationError> {
        Err(AggregationError::Disabled)
    }

    async fn resolve_alert(&self, _id: i64) -> Result<(), AggregationError> {
        Err(AggregationError::Disabled)
    }

    async fn endpoint_stats(&self, _limit: u32) -> Result<Vec<EndpointStat>, AggregationError> {
        Err(AggregationError::Disabled)
    }

    async fn hourly_stats(&self, _hours: u32) -> Result<Vec<HourlyStat>, AggregationError> {
        Err(AggregationError::Disabled)
    }

    async fn trace_stats(&self) -> Result<TraceStats, AggregationError> {
        Err(AggregationError::Disabled)
    }

    async fn query_traces(&self, _query: &TraceQuery) -> Result<Vec<RequestTrace>, AggregationError> {
        Err(AggregationError::Disabled)
    }
}
