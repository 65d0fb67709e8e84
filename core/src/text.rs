//! Text normalization and content hashing shared by both caches.

use sha2::Digest;
use sha2::Sha256;
use std::fmt;

/// Canonical form used for cache keys: trimmed, lowercased, whitespace runs
/// collapsed to a single space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Shorthand for [`ContentHash::of`].
pub fn content_hash(text: &str) -> ContentHash {
    ContentHash::of(text)
}

/// SHA-256 digest of normalized text, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(text: &str) -> Self {
        Self::of_normalized(&normalize(text))
    }

    /// Hash text that is already in canonical form.
    pub fn of_normalized(normalized: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(normalized.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
