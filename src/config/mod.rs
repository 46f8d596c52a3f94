//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), path from --config
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PulseConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::PulseConfig;
pub use schema::{
    AdminConfig, AggregationConfig, DatabaseConfig, ListenerConfig, ObservabilityConfig,
    TelemetryConfig, TimeoutConfig, TracingConfig,
};
