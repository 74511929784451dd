//! # Chat Gateway Library
//!
//! Real-time chat gateway with:
//! - WebSocket gateway for private messages, room broadcasts and whispers
//! - Moderation pipeline (spam, link redaction, profanity) with timed mutes
//! - Presence tracking backed by Redis or an in-process store
//! - PostgreSQL message store with at-rest encryption for private content
//! - A thin authenticated HTTP API for history, rooms and presence
//!
//! ## Architecture
//!
//! - **Domain Layer**: Entities, repository traits and content rules
//! - **Application Layer**: Services and DTOs
//! - **Infrastructure Layer**: PostgreSQL, presence stores, crypto, metrics
//! - **Presentation Layer**: HTTP handlers and the WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! chat_gateway/
//! +-- config/         Configuration management
//! +-- domain/         Entities, traits and content rules
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Database, presence, crypto and metrics
//! +-- presentation/   HTTP routes and WebSocket gateway
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
