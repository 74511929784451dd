//! HTTP API
//!
//! Health, metrics and the read-mostly REST surface.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
