//! Ambient observability for the service itself.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! Request traces for the dashboard live in `crate::trace`; this module covers
//! the operational signals about the pipeline itself.

pub mod logging;
pub mod metrics;
