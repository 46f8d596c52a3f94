//! Observability pipeline for the portfolio service.
//!
//! Request tracing with phase timing, live process telemetry with an optional
//! chaos overlay, and server-sent event streams for an operations dashboard.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod stream;
pub mod telemetry;
pub mod trace;

pub use config::PulseConfig;
pub use error::ApiError;
pub use http::{build_router, AppState, HttpServer};
pub use lifecycle::Shutdown;
