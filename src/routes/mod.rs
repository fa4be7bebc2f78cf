//! HTTP route handlers.
//!
//! - `csrf`: token issuance, refresh and status
//! - `health`: liveness, readiness, version and metrics
//! - `users`: registration and the current principal

pub mod csrf;
pub mod health;
pub mod users;
