//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the observability service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PulseConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request tracing settings.
    pub tracing: TracingConfig,

    /// Telemetry sampling and streaming settings.
    pub telemetry: TelemetryConfig,

    /// Content store probed for liveness.
    pub database: DatabaseConfig,

    /// Aggregation backend settings.
    pub aggregation: AggregationConfig,

    /// Admin credentials for mutating endpoints.
    pub admin: AdminConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// Which requests produce traces.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Only paths under this prefix are traced.
    pub api_prefix: String,

    /// Path prefixes that are never traced (health, the stream endpoints).
    pub excluded_prefixes: Vec<String>,

    /// Per-subscriber queue depth on the live trace stream.
    pub stream_queue_capacity: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            excluded_prefixes: vec![
                "/api/health".to_string(),
                "/api/telemetry".to_string(),
                "/api/traces/stream".to_string(),
            ],
            stream_queue_capacity: 256,
        }
    }
}

/// Telemetry sampling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Interval between snapshots in milliseconds.
    pub sample_interval_ms: u64,

    /// Event-loop monitor resolution in milliseconds.
    pub loop_resolution_ms: u64,

    /// Database probe deadline in milliseconds.
    pub probe_timeout_ms: u64,

    /// SSE keep-alive comment interval in seconds.
    pub keep_alive_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            loop_resolution_ms: 20,
            probe_timeout_ms: 2000,
            keep_alive_secs: 15,
        }
    }
}

/// Content database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite content database.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/portfolio.db".to_string(),
        }
    }
}

/// Aggregation backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Send traces to and query statistics from a remote backend.
    pub enabled: bool,

    /// Backend base URL.
    pub base_url: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:4000".to_string(),
        }
    }
}

/// Admin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token). Empty disables the admin
    /// endpoints: every request to them is rejected.
    pub api_key: String,

    /// User id recorded on traces of authenticated admin requests.
    pub user_id: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            user_id: 1,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to produce response headers, in seconds. Streams are
    /// unaffected once their headers are sent.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: PulseConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:4100"

            [aggregation]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:4100");
        assert!(config.aggregation.enabled);
        assert_eq!(config.aggregation.base_url, "http://127.0.0.1:4000");
        assert_eq!(config.telemetry.sample_interval_ms, 1000);
        assert_eq!(config.tracing.api_prefix, "/api");
    }

    #[test]
    fn default_exclusions_cover_health_and_streams() {
        let tracing = TracingConfig::default();
        assert!(tracing.excluded_prefixes.iter().any(|p| p == "/api/health"));
        assert!(tracing.excluded_prefixes.iter().any(|p| p == "/api/telemetry"));
        assert!(tracing.excluded_prefixes.iter().any(|p| p == "/api/traces/stream"));
    }
}
