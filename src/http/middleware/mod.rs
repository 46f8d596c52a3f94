//! Request middleware beyond tracing.

pub mod admin_guard;

pub use admin_guard::{admin_guard, AuthenticatedUser};
