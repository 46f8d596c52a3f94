//! Trace records as they appear on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-phase breakdown of a request, in milliseconds.
///
/// Phases the recorder cannot observe are reported as `0.0`, never omitted,
/// so the record shape stays stable for consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    pub middleware: f64,
    pub guard: f64,
    pub interceptor_pre: f64,
    pub handler: f64,
    pub interceptor_post: f64,
}

impl PhaseTiming {
    /// Sum of all phases. Approximates, but need not equal, the wall-clock duration.
    pub fn total(&self) -> f64 {
        self.middleware + self.guard + self.interceptor_pre + self.handler + self.interceptor_post
    }
}

/// One completed HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTrace {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: f64,
    pub timing: PhaseTiming,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub user_agent: String,
    pub ip: String,
    pub timestamp: DateTime<Utc>,
}

impl RequestTrace {
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}
