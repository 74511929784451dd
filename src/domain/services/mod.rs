//! Domain Services
//!
//! Stateless rules shared by the moderation engine and the gateway.

pub mod content_filter;
pub mod mentions;

pub use content_filter::{contains_links_or_socials, spam_fingerprint, Blocklist};
pub use mentions::extract_mentions;
