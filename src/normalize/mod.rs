//! Post normalization: raw upstream posts into ranked media candidates.
//!
//! Each post is classified once into a [`PostKind`] and then reduced to the
//! best asset it offers, in priority order:
//!
//! 1. gallery items (one candidate per accepted item)
//! 2. video preview stills (the video URL itself is never served)
//! 3. the direct link, or a strictly larger preview of it
//! 4. the thumbnail
//! 5. a text placeholder
//!
//! Every asset URL must pass the [`ValidityFilter`]. Variants are ranked by
//! pixel area; ties keep the first variant seen.

mod filter;
mod placeholder;

pub use filter::{
    DEFAULT_IMAGE_EXTENSIONS, DEFAULT_TRUSTED_HOSTS, ValidityFilter, canonical_media_url,
};
pub use placeholder::{DEFAULT_PLACEHOLDER_LEN, placeholder_text, truncate_at_boundary};

use tracing::trace;

use crate::types::{ImageVariant, MediaCandidate, PostKind, RawPost, TopicKey, unescape_url};

/// Normalizer settings.
///
/// ```rust
/// # use huginn::normalize::{NormalizerConfig, ValidityFilter};
/// let config = NormalizerConfig::new()
///     .filter(ValidityFilter::new().min_dimensions(640, 480))
///     .allow_nsfw(true);
/// assert_eq!(config.filter.min_width, 640);
/// ```
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Rules every served asset URL must pass.
    pub filter: ValidityFilter,
    /// Maximum placeholder text length in characters. Default: 120.
    pub placeholder_max_chars: usize,
    /// Keep posts flagged NSFW. Default: false.
    pub allow_nsfw: bool,
    /// Drop stickied (moderator-pinned) posts. Default: true.
    pub skip_stickied: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            filter: ValidityFilter::default(),
            placeholder_max_chars: DEFAULT_PLACEHOLDER_LEN,
            allow_nsfw: false,
            skip_stickied: true,
        }
    }
}

impl NormalizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: ValidityFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn placeholder_max_chars(mut self, max: usize) -> Self {
        self.placeholder_max_chars = max;
        self
    }

    pub fn allow_nsfw(mut self, allow: bool) -> Self {
        self.allow_nsfw = allow;
        self
    }

    pub fn skip_stickied(mut self, skip: bool) -> Self {
        self.skip_stickied = skip;
        self
    }
}

/// A chosen asset and its quality score.
#[derive(Debug, Clone, PartialEq)]
struct Pick {
    url: String,
    score: u64,
}

/// Converts raw posts into [`MediaCandidate`]s for one source.
#[derive(Debug, Clone)]
pub struct PostNormalizer {
    source_tag: String,
    config: NormalizerConfig,
}

impl PostNormalizer {
    pub fn new(source_tag: impl Into<String>, config: NormalizerConfig) -> Self {
        Self {
            source_tag: source_tag.into(),
            config,
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize every post of a page, in order.
    pub fn normalize_batch(&self, topic: &TopicKey, posts: &[RawPost]) -> Vec<MediaCandidate> {
        posts
            .iter()
            .flat_map(|post| self.normalize(topic, post))
            .collect()
    }

    /// Normalize one post into zero or more candidates.
    ///
    /// Returns nothing for skipped posts (stickied, or NSFW when not allowed).
    /// Any other post yields at least a placeholder.
    pub fn normalize(&self, topic: &TopicKey, post: &RawPost) -> Vec<MediaCandidate> {
        if self.config.skip_stickied && post.stickied {
            trace!(id = ?post.id, "skipping stickied post");
            return Vec::new();
        }
        if post.over_18 && !self.config.allow_nsfw {
            trace!(id = ?post.id, "skipping nsfw post");
            return Vec::new();
        }

        let title = post.title.trim();
        let description = describe(post, topic);

        let kind = PostKind::classify(post);
        let mut body = post.selftext.as_deref();
        let picked = match &kind {
            PostKind::Gallery(items) => {
                let count = items.len();
                let candidates: Vec<MediaCandidate> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        let pick = self.best_variant(&item.variants)?;
                        let item_title = format!("{title} (Image {}/{count})", index + 1);
                        Some(self.candidate(pick, item_title, &description))
                    })
                    .collect();
                if !candidates.is_empty() {
                    return candidates;
                }
                None
            }
            PostKind::Video { previews } => self.best_variant(previews),
            PostKind::Link {
                url,
                dimensions,
                previews,
            } => self.pick_link(url, *dimensions, previews),
            PostKind::Text { body: text } => {
                body = text.as_deref();
                None
            }
        };

        let picked = picked.or_else(|| self.pick_thumbnail(post));
        let candidate = match picked {
            Some(pick) => self.candidate(pick, title.to_string(), &description),
            None => MediaCandidate::placeholder(
                title,
                description,
                self.source_tag.as_str(),
                placeholder_text(
                    body,
                    title,
                    topic.as_str(),
                    self.config.placeholder_max_chars,
                ),
            ),
        };
        vec![candidate]
    }

    fn candidate(&self, pick: Pick, title: String, description: &str) -> MediaCandidate {
        MediaCandidate::new(
            pick.url,
            title,
            description,
            self.source_tag.as_str(),
            pick.score,
        )
    }

    /// Direct link, replaced by a preview only when the preview is strictly
    /// larger than the dimensions the post reports for the link.
    fn pick_link(
        &self,
        url: &str,
        dimensions: Option<(u32, u32)>,
        previews: &[ImageVariant],
    ) -> Option<Pick> {
        let dimensions = dimensions.filter(|(w, h)| *w > 0 && *h > 0);
        let direct_url = canonical_media_url(url);
        let best_preview = self.best_variant(previews);

        if !self.config.filter.accepts(&direct_url, dimensions) {
            return best_preview;
        }

        let Some((w, h)) = dimensions else {
            return Some(Pick {
                url: direct_url,
                score: 0,
            });
        };
        let direct_area = u64::from(w) * u64::from(h);
        match best_preview {
            Some(preview) if preview.score > direct_area => Some(preview),
            _ => Some(Pick {
                url: direct_url,
                score: direct_area,
            }),
        }
    }

    fn pick_thumbnail(&self, post: &RawPost) -> Option<Pick> {
        let thumbnail = canonical_media_url(&unescape_url(post.thumbnail.as_deref()?));
        self.config
            .filter
            .accepts(&thumbnail, None)
            .then_some(Pick {
                url: thumbnail,
                score: 0,
            })
    }

    /// Largest variant passing the filter; the first one wins a tie.
    fn best_variant(&self, variants: &[ImageVariant]) -> Option<Pick> {
        let mut best: Option<Pick> = None;
        for variant in variants {
            let url = canonical_media_url(&variant.url);
            let known = (variant.width > 0 && variant.height > 0)
                .then_some((variant.width, variant.height));
            if !self.config.filter.accepts(&url, known) {
                continue;
            }
            let score = variant.area();
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Pick { url, score });
            }
        }
        best
    }
}

fn describe(post: &RawPost, topic: &TopicKey) -> String {
    match post
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != "[deleted]")
    {
        Some(author) => format!("Posted by u/{author} in r/{topic}"),
        None => format!("Posted in r/{topic}"),
    }
}
