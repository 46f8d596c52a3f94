//! Scheduler responsiveness monitoring.
//!
//! A background task sleeps for a fixed resolution and records how late each
//! wake-up was. The accumulated delays form a histogram that is consumed by
//! reads: [`EventLoopMonitor::sample_and_reset`] returns the statistics and
//! clears the window in the same critical section, so each read describes only
//! the interval since the previous one. Only one reader (the sampling tick)
//! should consume the window.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::telemetry::snapshot::{round2, EventLoopMetrics};

/// Upper bound on retained samples between reads.
const MAX_SAMPLES: usize = 4096;

/// Delay accumulator. Values are nanoseconds.
#[derive(Debug, Default)]
pub struct DelayHistogram {
    samples: Vec<u64>,
    sum: f64,
    sum_sq: f64,
    min: u64,
    max: u64,
    count: u64,
}

/// Raw statistics in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: f64,
    pub p99: f64,
}

impl DelayHistogram {
    pub fn record(&mut self, delay: Duration) {
        let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);

        if self.count == 0 {
            self.min = nanos;
            self.max = nanos;
        } else {
            self.min = self.min.min(nanos);
            self.max = self.max.max(nanos);
        }
        self.count += 1;
        self.sum += nanos as f64;
        self.sum_sq += (nanos as f64) * (nanos as f64);

        // Percentiles come from a retained sample; moments stay exact.
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(nanos);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn stats(&self) -> DelayStats {
        if self.count == 0 {
            return DelayStats::default();
        }

        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        DelayStats {
            min: self.min as f64,
            max: self.max as f64,
            mean,
            stddev: variance.sqrt(),
            p50: percentile(&sorted, 50.0),
            p99: percentile(&sorted, 99.0),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Nearest-rank percentile over sorted values.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1] as f64
}

fn nanos_to_ms(nanos: f64) -> f64 {
    round2(nanos / 1_000_000.0)
}

impl From<DelayStats> for EventLoopMetrics {
    fn from(stats: DelayStats) -> Self {
        Self {
            lag_ms: nanos_to_ms(stats.p50),
            min: nanos_to_ms(stats.min),
            max: nanos_to_ms(stats.max),
            mean: nanos_to_ms(stats.mean),
            stddev: nanos_to_ms(stats.stddev),
            percentile99: nanos_to_ms(stats.p99),
        }
    }
}

/// Owns the delay histogram and the task feeding it.
///
/// Must be enabled at service start and disabled at shutdown; dropping the
/// monitor disables it as well.
pub struct EventLoopMonitor {
    resolution: Duration,
    histogram: Arc<Mutex<DelayHistogram>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoopMonitor {
    pub fn new(resolution: Duration) -> Self {
        Self {
            resolution,
            histogram: Arc::new(Mutex::new(DelayHistogram::default())),
            task: Mutex::new(None),
        }
    }

    /// Start sampling. Calling this while already enabled is a no-op.
    pub fn enable(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let histogram = self.histogram.clone();
        let resolution = self.resolution;
        *task = Some(tokio::spawn(async move {
            loop {
                let started = Instant::now();
                tokio::time::sleep(resolution).await;
                let delay = started.elapsed().saturating_sub(resolution);
                histogram.lock().record(delay);
            }
        }));

        tracing::debug!(resolution_ms = resolution.as_millis() as u64, "Event loop monitor enabled");
    }

    /// Stop sampling and discard the current window.
    pub fn disable(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            self.histogram.lock().reset();
            tracing::debug!("Event loop monitor disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Read the current window in milliseconds and start a new one.
    ///
    /// All fields are zero while the monitor is disabled.
    pub fn sample_and_reset(&self) -> EventLoopMetrics {
        if !self.is_enabled() {
            return EventLoopMetrics::default();
        }

        let mut histogram = self.histogram.lock();
        let stats = histogram.stats();
        histogram.reset();
        stats.into()
    }

    #[cfg(test)]
    fn record(&self, delay: Duration) {
        self.histogram.lock().record(delay);
    }
}

impl Drop for EventLoopMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
