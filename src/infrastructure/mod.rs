//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Presence store (Redis or in-process)
//! - At-rest content encryption
//! - Prometheus metrics

pub mod cache;
pub mod crypto;
pub mod database;
pub mod metrics;
pub mod repositories;
