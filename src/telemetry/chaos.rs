//! Fault-injection overlay for the telemetry stream.
//!
//! The overlay distorts what a subscriber sees, never what the process does.
//! Values are illustrative: the jitter is random and wall-clock driven, so
//! callers that need reproducible output use [`ChaosOverlay::apply_with`].

use chrono::Utc;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::telemetry::snapshot::{round2, ChaosState, TelemetrySnapshot};

/// Requested simulations for one stream connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaosFlags {
    pub cpu: bool,
    pub memory: bool,
}

impl ChaosFlags {
    pub const NONE: Self = Self {
        cpu: false,
        memory: false,
    };

    /// Parse the `chaos` query value. `None`, empty values and unknown
    /// tokens all mean "no simulation" for that slot.
    pub fn from_query(value: Option<&str>) -> Self {
        value
            .map(|v| v.parse().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Render as the query value, `cpu` before `memory`. `None` when no flag is set.
    pub fn to_query(&self) -> Option<String> {
        let mut parts = Vec::with_capacity(2);
        if self.cpu {
            parts.push("cpu");
        }
        if self.memory {
            parts.push("memory");
        }
        (!parts.is_empty()).then(|| parts.join(","))
    }

    pub fn any(&self) -> bool {
        self.cpu || self.memory
    }
}

impl FromStr for ChaosFlags {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = Self::NONE;
        for token in s.split(',').map(str::trim) {
            match token {
                "cpu" => flags.cpu = true,
                "memory" => flags.memory = true,
                "" => {}
                other => tracing::debug!(token = other, "Ignoring unknown chaos flag"),
            }
        }
        Ok(flags)
    }
}

impl fmt::Display for ChaosFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_query().as_deref().unwrap_or("none"))
    }
}

pub struct ChaosOverlay;

impl ChaosOverlay {
    const BASE_LAG_MS: f64 = 50.0;
    const LAG_SPREAD_MS: f64 = 100.0;
    const JITTER_MS: f64 = 10.0;

    /// Apply `flags` with thread-local randomness and the current wall clock.
    pub fn apply(snapshot: &TelemetrySnapshot, flags: ChaosFlags) -> TelemetrySnapshot {
        let now_ms = Utc::now().timestamp_millis() as f64;
        Self::apply_with(snapshot, flags, &mut rand::thread_rng(), now_ms)
    }

    /// Apply `flags` using the given random source and clock reading (ms).
    pub fn apply_with<R: Rng + ?Sized>(
        snapshot: &TelemetrySnapshot,
        flags: ChaosFlags,
        rng: &mut R,
        clock_ms: f64,
    ) -> TelemetrySnapshot {
        let mut out = snapshot.clone();

        if flags.cpu {
            let jitter = (clock_ms / 1000.0).sin() * Self::JITTER_MS;
            let lag = round2(Self::BASE_LAG_MS + rng.gen::<f64>() * Self::LAG_SPREAD_MS + jitter);

            out.event_loop.lag_ms = lag;
            out.event_loop.max = round2(lag + 50.0);
            out.event_loop.mean = lag;
            out.event_loop.percentile99 = round2(lag + 80.0);
            out.database.latency_ms = round2(out.database.latency_ms + lag * 0.5);
        }

        if flags.memory {
            let factor = rng.gen_range(1.5..=2.0);
            out.memory.heap_used_mb = round2(out.memory.heap_used_mb * factor);
            out.memory.rss_mb = round2(out.memory.rss_mb * factor);
        }

        out.chaos = ChaosState {
            cpu_pressure: flags.cpu,
            memory_pressure: flags.memory,
        };
        out
    }
}
