//! Push streams for the operations dashboard.
//!
//! # Data Flow
//! ```text
//! Telemetry (interval-driven):
//!     feed.rs sampling task (1 Hz) → watch channel
//!     → sse.rs telemetry_stream: ChaosOverlay per connection → SSE
//!
//! Traces (event-driven):
//!     trace::TraceRecorder → hub.rs TraceHub::publish
//!     → per-subscriber bounded queue → sse.rs trace_stream → SSE
//! ```
//!
//! # Design Decisions
//! - The two streams share no state and manage their own subscribers
//! - Delivery is best-effort: lagging trace subscribers lose events
//! - No server-side replay; subscribers see only what happens while attached

pub mod feed;
pub mod hub;
pub mod sse;

pub use feed::{TelemetryFeed, TelemetrySubscription};
pub use hub::{TraceHub, TraceSubscription};
