//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod cors;
pub mod logging;
pub mod metrics;

pub use auth::{auth_middleware, bearer_token, AuthUser, Claims, TokenVerifier, ADMIN_ROLE};
pub use metrics::track_metrics;
