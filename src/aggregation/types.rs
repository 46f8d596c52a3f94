//! Records exchanged with the aggregation backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertMetric {
    AvgDuration,
    ErrorRate,
    P95Duration,
}

/// A threshold breach raised by the backend. Owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i64,
    pub rule_name: String,
    pub metric: AlertMetric,
    pub actual_value: f64,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStat {
    pub method: String,
    pub path: String,
    pub count: u64,
    pub avg_duration: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyStat {
    pub hour: DateTime<Utc>,
    pub avg_duration: f64,
    pub p95_duration: f64,
    pub error_rate: f64,
}

/// Totals over the rolling 24 hour window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStats {
    pub total_count: u64,
    pub avg_duration: f64,
    pub error_rate: f64,
}

/// Filters for listing stored traces. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Substring match on the request path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl TraceQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    /// Clamp the page size and drop blank string filters.
    pub fn normalized(mut self) -> Self {
        self.limit = Some(self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT));
        self.method = self
            .method
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty());
        self.path = self.path.filter(|p| !p.trim().is_empty());
        self
    }
}
