//! Client for the portfolio-pulse live streams.
//!
//! [`StreamClient`] subscribes to `/api/telemetry/stream` or
//! `/api/traces/stream`, keeps a bounded window of the most recent items and
//! reconnects after a fixed delay when the connection fails.
//!
//! ```no_run
//! # async fn run() -> Result<(), pulse_sdk::StreamError> {
//! use pulse_sdk::{StreamClient, StreamOptions, TELEMETRY_PATH};
//!
//! let client: StreamClient<serde_json::Value> =
//!     StreamClient::new("http://localhost:3001", TELEMETRY_PATH, StreamOptions::telemetry())?;
//! client.set_query(Some("chaos=cpu"));
//! let mut updates = client.updates();
//! updates.changed().await.ok();
//! println!("{:?}", client.latest());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connector;
pub mod error;
pub mod window;

pub use client::{ConnectionState, StreamClient, StreamOptions};
pub use connector::{Connector, MessageStream, SseConnector};
pub use error::StreamError;
pub use window::SlidingWindow;

pub const TELEMETRY_PATH: &str = "/api/telemetry/stream";
pub const TRACES_PATH: &str = "/api/traces/stream";

/// Default window for telemetry: one minute at one snapshot per second.
pub const TELEMETRY_WINDOW: usize = 60;
pub const TRACE_WINDOW: usize = 100;
