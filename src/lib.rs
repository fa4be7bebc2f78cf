//! # CompanyGuard Backend Library
//!
//! Security layer of the company backend: JWT identity, CSRF double-submit
//! tokens bound to caller sessions, and an XSS-sanitizing request filter,
//! composed into one ordered axum pipeline.
//!
//! ## Core Components
//!
//! - [`csrf`]: session keys, token store and token service
//! - [`pipeline`]: stage order and router assembly
//! - [`middleware`]: the individual pipeline stages
//! - [`auth`]: JWT verification and the principal extractor
//! - [`sanitizer`]: JSON string sanitization
//! - [`users`]: the user directory collaborator (SQLite)
//! - [`routes`]: HTTP handlers
//! - [`config`], [`error`], [`metrics`], [`state`], [`db`], [`types`]

pub mod auth;
pub mod config;
pub mod csrf;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod sanitizer;
pub mod state;
pub mod types;
pub mod users;
