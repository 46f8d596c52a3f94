//! Point-in-time health snapshot.

use serde::{Deserialize, Serialize};

/// One sampling tick. Built fresh each time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub event_loop: EventLoopMetrics,
    pub memory: MemoryMetrics,
    pub database: DatabaseMetrics,
    pub process: ProcessMetrics,
    pub chaos: ChaosState,
}

/// Scheduler delay statistics for the interval since the previous read, in ms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLoopMetrics {
    pub lag_ms: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub percentile99: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    #[serde(rename = "heapUsedMB")]
    pub heap_used_mb: f64,
    #[serde(rename = "heapTotalMB")]
    pub heap_total_mb: f64,
    #[serde(rename = "rssMB")]
    pub rss_mb: f64,
    #[serde(rename = "externalMB")]
    pub external_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetrics {
    /// Round-trip latency, or `-1.0` when the probe failed.
    pub latency_ms: f64,
    pub connected: bool,
}

impl DatabaseMetrics {
    pub const UNREACHABLE_LATENCY: f64 = -1.0;

    pub fn connected(latency_ms: f64) -> Self {
        Self {
            latency_ms,
            connected: true,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            latency_ms: Self::UNREACHABLE_LATENCY,
            connected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub uptime_seconds: u64,
    pub pid: u32,
    /// Kept under the dashboard's historical key.
    #[serde(rename = "nodeVersion")]
    pub runtime_version: String,
}

/// Which simulations were requested. Reflects the request, not real load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosState {
    pub cpu_pressure: bool,
    pub memory_pressure: bool,
}

/// Round to two decimal places, the precision every snapshot figure is reported at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_keys_match_dashboard_contract() {
        let json = serde_json::to_value(MemoryMetrics {
            heap_used_mb: 1.0,
            heap_total_mb: 2.0,
            rss_mb: 3.0,
            external_mb: 4.0,
        })
        .unwrap();
        assert_eq!(json["heapUsedMB"], 1.0);
        assert_eq!(json["heapTotalMB"], 2.0);
        assert_eq!(json["rssMB"], 3.0);
        assert_eq!(json["externalMB"], 4.0);
    }

    #[test]
    fn process_keys_match_dashboard_contract() {
        let json = serde_json::to_value(ProcessMetrics {
            uptime_seconds: 5,
            pid: 7,
            runtime_version: "portfolio-pulse/0.1.0".into(),
        })
        .unwrap();
        assert_eq!(json["uptimeSeconds"], 5);
        assert_eq!(json["pid"], 7);
        assert_eq!(json["nodeVersion"], "portfolio-pulse/0.1.0");
        assert!(json.get("runtimeVersion").is_none());
    }

    #[test]
    fn unreachable_database_uses_sentinel() {
        let db = DatabaseMetrics::unreachable();
        assert_eq!(db.latency_ms, -1.0);
        assert!(!db.connected);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(0.005), 0.01);
        assert_eq!(round2(0.0), 0.0);
    }
}
