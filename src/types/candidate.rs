//! Normalized, ready-to-serve media candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel asset URL carried by synthesized placeholder candidates.
///
/// A placeholder has no media of its own; the presentation layer renders
/// [`MediaCandidate::placeholder_text`] into an image instead.
pub const PLACEHOLDER_ASSET_URL: &str = "placeholder:text";

/// A normalized media item (or synthesized placeholder) with metadata.
///
/// Immutable once built. Two candidates with the same asset URL and title
/// share a [`fingerprint`](Self::fingerprint) and are treated as duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCandidate {
    /// Stable hash of `(asset_url, title)`, hex-encoded.
    pub fingerprint: String,
    /// Direct URL of the image to serve, or [`PLACEHOLDER_ASSET_URL`].
    pub asset_url: String,
    /// Display title.
    pub title: String,
    /// Short attribution line (author, community).
    pub description: String,
    /// Source tag of the provider that discovered this candidate.
    pub source_tag: String,
    /// Text to render when this is a placeholder.
    pub placeholder_text: Option<String>,
    /// Width × height of the chosen asset; 0 when unknown.
    pub quality_score: u64,
    /// When the candidate was discovered (drives snapshot expiry).
    pub discovered_at: DateTime<Utc>,
}

impl MediaCandidate {
    /// Build a media candidate discovered now.
    pub fn new(
        asset_url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        source_tag: impl Into<String>,
        quality_score: u64,
    ) -> Self {
        let asset_url = asset_url.into();
        let title = title.into();
        Self {
            fingerprint: fingerprint(&asset_url, &title),
            asset_url,
            title,
            description: description.into(),
            source_tag: source_tag.into(),
            placeholder_text: None,
            quality_score,
            discovered_at: Utc::now(),
        }
    }

    /// Build a placeholder candidate whose image is rendered from `text`.
    pub fn placeholder(
        title: impl Into<String>,
        description: impl Into<String>,
        source_tag: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let mut candidate = Self::new(PLACEHOLDER_ASSET_URL, title, description, source_tag, 0);
        candidate.placeholder_text = Some(text.into());
        candidate
    }

    /// Override the discovery timestamp (used when restoring snapshots).
    pub fn discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = at;
        self
    }

    /// Whether this candidate is a synthesized placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.asset_url == PLACEHOLDER_ASSET_URL
    }
}

/// Compute the dedup fingerprint of `(asset_url, title)`.
///
/// SHA-256 truncated to 16 bytes, so the value is identical across processes
/// and survives snapshot round-trips.
pub fn fingerprint(asset_url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(asset_url.as_bytes());
    hasher.update([0u8]);
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let a = fingerprint("https://i.redd.it/a.jpg", "cat");
        let b = fingerprint("https://i.redd.it/a.jpg", "cat");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn fingerprint_separates_fields() {
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(fingerprint("ab", "c"), fingerprint("a", "bc"));
        assert_ne!(
            fingerprint("https://i.redd.it/a.jpg", "cat"),
            fingerprint("https://i.redd.it/a.jpg", "dog")
        );
    }

    #[test]
    fn placeholder_carries_text() {
        let c = MediaCandidate::placeholder("Title", "Posted in r/test", "reddit", "hello");
        assert!(c.is_placeholder());
        assert_eq!(c.placeholder_text.as_deref(), Some("hello"));
        assert_eq!(c.quality_score, 0);
        assert_eq!(c.fingerprint, fingerprint(PLACEHOLDER_ASSET_URL, "Title"));
    }
}
