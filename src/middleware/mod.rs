//! Request pipeline stages.
//!
//! Each stage is a plain `axum::middleware::from_fn_with_state` function; the
//! order they run in is fixed by [`crate::pipeline::build_router`]:
//!
//! 1. `cors` - origin guard and CORS negotiation
//! 2. `auth` - JWT verification, never rejects
//! 3. `csrf` - token enforcement on state-changing requests
//! 4. `xss` - JSON body sanitization
//! 5. `security_headers` - applied to every response on the way out

pub mod auth;
pub mod cors;
pub mod csrf;
pub mod security_headers;
pub mod xss;
