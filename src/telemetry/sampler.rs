//! Process health sampling.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::observability::metrics;
use crate::telemetry::event_loop::EventLoopMonitor;
use crate::telemetry::probe::{ProbeError, StoreProbe};
use crate::telemetry::snapshot::{
    round2, ChaosState, DatabaseMetrics, MemoryMetrics, ProcessMetrics, TelemetrySnapshot,
};

pub const RUNTIME_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Collects [`TelemetrySnapshot`]s on demand.
///
/// Reading a snapshot consumes the event-loop window, so a single caller
/// (the telemetry feed) should drive sampling.
pub struct TelemetrySampler {
    monitor: Arc<EventLoopMonitor>,
    probe: Arc<dyn StoreProbe>,
    probe_timeout: Duration,
    system: Mutex<System>,
    pid: Pid,
    started: Instant,
}

impl TelemetrySampler {
    pub fn new(monitor: Arc<EventLoopMonitor>, probe: Arc<dyn StoreProbe>, probe_timeout: Duration) -> Self {
        Self {
            monitor,
            probe,
            probe_timeout,
            system: Mutex::new(System::new()),
            pid: Pid::from_u32(std::process::id()),
            started: Instant::now(),
        }
    }

    pub fn monitor(&self) -> &Arc<EventLoopMonitor> {
        &self.monitor
    }

    /// Never fails; an unreachable store is reported as data.
    pub async fn collect_snapshot(&self) -> TelemetrySnapshot {
        let event_loop = self.monitor.sample_and_reset();
        let (memory, run_time) = self.read_process();
        let database = self.probe_database().await;

        TelemetrySnapshot {
            timestamp: Utc::now().timestamp_millis(),
            event_loop,
            memory,
            database,
            process: ProcessMetrics {
                uptime_seconds: run_time.unwrap_or_else(|| self.started.elapsed().as_secs()),
                pid: self.pid.as_u32(),
                runtime_version: RUNTIME_VERSION.to_string(),
            },
            chaos: ChaosState::default(),
        }
    }

    /// Memory figures and seconds since the process started.
    fn read_process(&self) -> (MemoryMetrics, Option<u64>) {
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        match system.process(self.pid) {
            Some(process) => {
                let resident = bytes_to_mb(process.memory());
                let memory = MemoryMetrics {
                    heap_used_mb: resident,
                    heap_total_mb: bytes_to_mb(process.virtual_memory()),
                    rss_mb: resident,
                    external_mb: 0.0,
                };
                (memory, Some(process.run_time()))
            }
            None => {
                tracing::debug!(pid = self.pid.as_u32(), "Own process not visible to sysinfo");
                (MemoryMetrics::default(), None)
            }
        }
    }

    async fn probe_database(&self) -> DatabaseMetrics {
        let started = Instant::now();

        match self.ping_within_deadline().await {
            Ok(()) => {
                let latency = round2(started.elapsed().as_secs_f64() * 1000.0);
                metrics::record_db_probe(latency);
                DatabaseMetrics::connected(latency)
            }
            Err(ProbeError::Timeout) => {
                tracing::debug!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Database probe timed out"
                );
                DatabaseMetrics::unreachable()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Database probe failed");
                DatabaseMetrics::unreachable()
            }
        }
    }

    async fn ping_within_deadline(&self) -> Result<(), ProbeError> {
        tokio::time::timeout(self.probe_timeout, self.probe.ping())
            .await
            .unwrap_or(Err(ProbeError::Timeout))
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::snapshot::EventLoopMetrics;
    use async_trait::async_trait;

    struct Healthy;

    #[async_trait]
    impl StoreProbe for Healthy {
        async fn ping(&self) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl StoreProbe for Broken {
        async fn ping(&self) -> Result<(), ProbeError> {
            Err(ProbeError::Unavailable("connection refused".into()))
        }
    }

    struct Hung;

    #[async_trait]
    impl StoreProbe for Hung {
        async fn ping(&self) -> Result<(), ProbeError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn sampler(probe: Arc<dyn StoreProbe>) -> TelemetrySampler {
        let monitor = Arc::new(EventLoopMonitor::new(Duration::from_millis(20)));
        TelemetrySampler::new(monitor, probe, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn event_loop_is_zero_before_monitor_is_enabled() {
        let snapshot = sampler(Arc::new(Healthy)).collect_snapshot().await;
        assert_eq!(snapshot.event_loop, EventLoopMetrics::default());
    }

    #[tokio::test]
    async fn healthy_probe_reports_latency() {
        let snapshot = sampler(Arc::new(Healthy)).collect_snapshot().await;
        assert!(snapshot.database.connected);
        assert!(snapshot.database.latency_ms >= 0.0);
    }

    #[tokio::test]
    async fn failed_probe_is_reported_as_data() {
        let snapshot = sampler(Arc::new(Broken)).collect_snapshot().await;
        assert_eq!(snapshot.database, DatabaseMetrics::unreachable());
    }

    #[tokio::test]
    async fn hung_probe_times_out() {
        let snapshot = sampler(Arc::new(Hung)).collect_snapshot().await;
        assert_eq!(snapshot.database, DatabaseMetrics::unreachable());
    }

    #[tokio::test]
    async fn hung_store_surfaces_timeout_error() {
        let result = sampler(Arc::new(Hung)).ping_within_deadline().await;
        assert!(matches!(result, Err(ProbeError::Timeout)));

        let result = sampler(Arc::new(Broken)).ping_within_deadline().await;
        assert!(matches!(result, Err(ProbeError::Unavailable(_))));
    }

    #[tokio::test]
    async fn uptime_counts_from_process_start() {
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let snapshot = sampler(Arc::new(Healthy)).collect_snapshot().await;
        assert!(
            snapshot.process.uptime_seconds >= 1,
            "uptime {}",
            snapshot.process.uptime_seconds
        );
    }

    #[tokio::test]
    async fn raw_snapshot_has_no_chaos_and_process_metadata() {
        let snapshot = sampler(Arc::new(Healthy)).collect_snapshot().await;
        assert_eq!(snapshot.chaos, ChaosState::default());
        assert_eq!(snapshot.process.pid, std::process::id());
        assert_eq!(snapshot.process.runtime_version, RUNTIME_VERSION);
        assert!(snapshot.timestamp > 0);
        assert!(snapshot.memory.rss_mb >= 0.0);
    }

    #[test]
    fn converts_bytes_to_megabytes() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(1536 * 1024), 1.5);
        assert_eq!(bytes_to_mb(0), 0.0);
    }
}
