//! Aggregation backend integration.
//!
//! # Data Flow
//! ```text
//! trace::TraceRecorder ──ingest (detached)──▶ AggregationPort
//! http::handlers (stats, alerts, trace list) ──query──▶ AggregationPort
//!
//! AggregationPort implementations:
//!     http.rs     → remote backend over REST
//!     disabled.rs → no backend configured
//! ```

pub mod disabled;
pub mod http;
pub mod port;
pub mod types;

use std::sync::Arc;

use crate::config::AggregationConfig;

pub use disabled::DisabledAggregator;
pub use http::HttpAggregator;
pub use port::{AggregationError, AggregationPort};
pub use types::{Alert, AlertMetric, EndpointStat, HourlyStat, TraceQuery, TraceStats};

/// Build the configured backend adapter.
pub fn from_config(config: &AggregationConfig) -> Result<Arc<dyn AggregationPort>, AggregationError> {
    if !config.enabled {
        tracing::info!("Aggregation backend disabled; traces are streamed but not stored");
        return Ok(Arc::new(DisabledAggregator));
    }

    let adapter = HttpAggregator::new(&config.base_url)?;
    tracing::info!(base_url = %adapter.base_url(), "Aggregation backend configured");
    Ok(Arc::new(adapter))
}
