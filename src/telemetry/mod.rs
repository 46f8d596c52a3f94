//! Live system telemetry.
//!
//! # Data Flow
//! ```text
//! event_loop.rs (delay monitor task → histogram)
//! probe.rs      (SELECT 1 against the content store)
//! sysinfo       (process memory)
//!     → sampler.rs collect_snapshot() → TelemetrySnapshot (snapshot.rs)
//!     → chaos.rs apply(snapshot, flags) per subscriber
//!     → stream::TelemetryFeed / SSE
//! ```
//!
//! # Design Decisions
//! - Snapshots are ephemeral; nothing here is persisted
//! - Event-loop statistics are non-cumulative (reset on read)
//! - Probe failures are data, never errors

pub mod chaos;
pub mod event_loop;
pub mod probe;
pub mod sampler;
pub mod snapshot;

pub use chaos::{ChaosFlags, ChaosOverlay};
pub use event_loop::EventLoopMonitor;
pub use probe::{ProbeError, SqliteProbe, StoreProbe};
pub use sampler::TelemetrySampler;
pub use snapshot::TelemetrySnapshot;
