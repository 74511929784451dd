//! Content classifiers.
//!
//! Pure functions over message text: profanity blocklist matching, link and
//! social-handle detection, and the spam fingerprint.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

/// Absolute URLs, `www.` hosts and bare domains with a TLD of 3+ letters.
static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://\S+|www\.\S+|\b[a-z0-9][a-z0-9-]*\.[a-z]{3,}\b)")
        .expect("link pattern is valid")
});

/// Social platform names used to move conversations off-platform.
static SOCIAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(instagram|facebook|whatsapp|telegram|twitter|snapchat)\b|\bx\.com\b")
        .expect("social pattern is valid")
});

/// Immutable set of lowercase profanity terms.
///
/// Built once from configuration. A reload builds a new `Blocklist`; an
/// existing one is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blocklist {
    terms: BTreeSet<String>,
}

impl Blocklist {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// Case-insensitive substring match against every term.
    pub fn contains_profanity(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.terms.iter().any(|term| lowered.contains(term.as_str()))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Whether the text carries a URL, a bare domain or a social platform name.
pub fn contains_links_or_socials(text: &str) -> bool {
    LINK_PATTERN.is_match(text) || SOCIAL_PATTERN.is_match(text)
}

/// Dedup key for the spam counter.
///
/// The base64 encoding of the raw content truncated to `len` characters.
/// Long messages sharing a prefix map to the same fingerprint.
pub fn spam_fingerprint(text: &str, len: usize) -> String {
    let mut encoded = STANDARD.encode(text.as_bytes());
    encoded.truncate(len);
    encoded
}
