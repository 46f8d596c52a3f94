//! HTTP surface of the service.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (TraceLayer span, trace recording, timeout, panic catching)
//!     → middleware/admin_guard.rs (bearer check on mutating routes)
//!     → handlers.rs (health, stats, alerts, trace queries)
//!     → stream::sse (telemetry and trace streams)
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
