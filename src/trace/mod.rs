//! Request tracing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → recorder.rs (exclusion check, trace id, client ip)
//!     → phase.rs (start / handler-start / completion marks)
//!     → handler
//!     → recorder.rs builds RequestTrace (model.rs)
//!         → stream::TraceHub (live subscribers, synchronous)
//!         → AggregationPort::ingest (detached task, failures logged)
//! ```
//!
//! # Design Decisions
//! - One trace per traced request, on success and error paths alike
//! - Unmeasured phases are reported as 0 to keep the record shape stable
//! - The response never waits on ingestion

pub mod client_ip;
pub mod model;
pub mod phase;
pub mod recorder;

pub use model::{PhaseTiming, RequestTrace};
pub use phase::PhaseTimer;
pub use recorder::{trace_middleware, TraceContext, TraceRecorder, X_TRACE_ID};
