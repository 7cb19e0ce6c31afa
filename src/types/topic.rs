//! Topic keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{HuginnError, Result};

/// Maximum length of a topic key, in characters.
pub const MAX_TOPIC_LEN: usize = 64;

/// A case-insensitive identifier scoping an upstream query (e.g. a community name).
///
/// Always stored in normalized form: trimmed, lowercased, without a leading
/// `r/` or `/r/`. Only `[a-z0-9_]` is accepted so keys can be spliced into
/// URL paths without escaping.
///
/// ```rust
/// # use huginn::TopicKey;
/// let key = TopicKey::parse(" r/EarthPorn ").unwrap();
/// assert_eq!(key.as_str(), "earthporn");
/// assert!(TopicKey::parse("no spaces").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicKey(String);

impl TopicKey {
    /// Parse and normalize user input into a topic key.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("/r/")
            .or_else(|| trimmed.strip_prefix("r/"))
            .or_else(|| trimmed.strip_prefix("R/"))
            .unwrap_or(trimmed);
        let normalized = stripped.trim_end_matches('/').to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(HuginnError::InvalidTopic("empty topic".to_string()));
        }
        if normalized.chars().count() > MAX_TOPIC_LEN {
            return Err(HuginnError::InvalidTopic(format!(
                "topic longer than {MAX_TOPIC_LEN} characters"
            )));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(HuginnError::InvalidTopic(raw.trim().to_string()));
        }
        Ok(Self(normalized))
    }

    /// The normalized key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TopicKey {
    type Error = HuginnError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TopicKey> for String {
    fn from(key: TopicKey) -> Self {
        key.0
    }
}

impl AsRef<str> for TopicKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        let a = TopicKey::parse("Funny").unwrap();
        let b = TopicKey::parse("fUNNY").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "funny");
    }

    #[test]
    fn parse_strips_community_prefix() {
        assert_eq!(TopicKey::parse("r/aww").unwrap().as_str(), "aww");
        assert_eq!(TopicKey::parse("/r/aww/").unwrap().as_str(), "aww");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(TopicKey::parse("").is_err());
        assert!(TopicKey::parse("   ").is_err());
        assert!(TopicKey::parse("../etc").is_err());
        assert!(TopicKey::parse("a b").is_err());
        assert!(TopicKey::parse(&"x".repeat(MAX_TOPIC_LEN + 1)).is_err());
    }

    #[test]
    fn serde_uses_normalized_string() {
        let key: TopicKey = serde_json::from_str("\"Pics\"").unwrap();
        assert_eq!(key.as_str(), "pics");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"pics\"");
        assert!(serde_json::from_str::<TopicKey>("\"no way\"").is_err());
    }
}
