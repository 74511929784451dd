//! # Domain Layer
//!
//! The domain layer contains the core business rules of the chat gateway.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Room, Message, etc.)
//!   and the repository/capability traits the gateway consumes
//! - **services**: Stateless domain rules (content classifiers, mention parsing)
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;
pub mod services;

// Re-export commonly used types
pub use entities::*;
