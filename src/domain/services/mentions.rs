//! `@username` token extraction.

use once_cell::sync::Lazy;
use regex::Regex;

static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("mention pattern is valid"));

/// Usernames mentioned in `text`, lowercased, in order of first appearance.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in MENTION_PATTERN.captures_iter(text) {
        let name = cap[1].to_lowercase();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}
