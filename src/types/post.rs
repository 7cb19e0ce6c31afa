//! Raw upstream post records and their shape classification.
//!
//! Upstream listings mix several post shapes (galleries, hosted videos,
//! direct links, text posts) in one untyped schema where almost every field
//! is optional. [`RawPost`] mirrors that schema leniently; [`PostKind`]
//! classifies a post exactly once so the normalizer can dispatch on a single
//! tagged variant instead of probing optional fields everywhere.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// File extensions that mark a link as a video rather than an image.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv"];

/// One post record from an upstream listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPost {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub post_hint: Option<String>,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub is_gallery: bool,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub stickied: bool,
    /// Dimensions of the linked asset, when the API reports them.
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub preview: Option<Preview>,
    #[serde(default)]
    pub gallery_data: Option<GalleryData>,
    #[serde(default)]
    pub media_metadata: Option<HashMap<String, MediaMetadataEntry>>,
    #[serde(default)]
    pub crosspost_parent_list: Vec<RawPost>,
}

/// Preview images generated by the upstream for link and video posts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preview {
    #[serde(default)]
    pub images: Vec<PreviewImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewImage {
    #[serde(default)]
    pub source: Option<ImageVariant>,
    #[serde(default)]
    pub resolutions: Vec<ImageVariant>,
}

/// A resolution-tagged asset URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl ImageVariant {
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
        }
    }

    /// Pixel area, used to rank variants.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Ordered gallery item references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryData {
    #[serde(default)]
    pub items: Vec<GalleryItemRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryItemRef {
    pub media_id: String,
}

/// Per-media metadata for gallery items, keyed by media id.
///
/// Field names follow the upstream's compressed schema: `s` is the source
/// rendition, `p` the downscaled previews, `x`/`y` the dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaMetadataEntry {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub s: Option<MediaRendition>,
    #[serde(default)]
    pub p: Vec<MediaRendition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaRendition {
    #[serde(default)]
    pub u: Option<String>,
    #[serde(default)]
    pub gif: Option<String>,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

impl MediaRendition {
    fn into_variant(self) -> Option<ImageVariant> {
        let url = self.u.or(self.gif)?;
        Some(ImageVariant::new(unescape_url(&url), self.x, self.y))
    }
}

/// One gallery item with all of its resolution variants, in upstream order.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryItem {
    pub variants: Vec<ImageVariant>,
}

/// The shape of a post, decided once per post.
#[derive(Debug, Clone, PartialEq)]
pub enum PostKind {
    /// Multi-image post; items are in display order.
    Gallery(Vec<GalleryItem>),
    /// Hosted or linked video; only its preview stills are usable.
    Video { previews: Vec<ImageVariant> },
    /// Post pointing at an external URL, possibly a direct image.
    Link {
        url: String,
        dimensions: Option<(u32, u32)>,
        previews: Vec<ImageVariant>,
    },
    /// Text-only post.
    Text { body: Option<String> },
}

impl PostKind {
    /// Classify a post.
    ///
    /// Precedence: gallery, then video, then link, then text. A crosspost
    /// carries its media on the parent, so the first parent is classified
    /// first and the post's own fields are used only when the parent is text.
    pub fn classify(post: &RawPost) -> PostKind {
        if let Some(parent) = post.crosspost_parent_list.first() {
            let parent_kind = Self::classify_own(parent);
            if !matches!(parent_kind, PostKind::Text { .. }) {
                return parent_kind;
            }
        }
        Self::classify_own(post)
    }

    fn classify_own(post: &RawPost) -> PostKind {
        if post.is_gallery || post.gallery_data.is_some() {
            return PostKind::Gallery(gallery_items(post));
        }

        let url = post
            .url
            .as_deref()
            .map(unescape_url)
            .filter(|u| !u.is_empty());

        let hinted_video = matches!(
            post.post_hint.as_deref(),
            Some("hosted:video") | Some("rich:video")
        );
        let linked_video = url.as_deref().is_some_and(has_video_extension);
        if post.is_video || hinted_video || linked_video {
            return PostKind::Video {
                previews: preview_variants(post),
            };
        }

        match url {
            Some(url) if !post.is_self && !is_self_link(post, &url) => PostKind::Link {
                url,
                dimensions: post.width.zip(post.height),
                previews: preview_variants(post),
            },
            _ => PostKind::Text {
                body: post
                    .selftext
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            },
        }
    }
}

/// Collect every preview rendition of a post (sources first, then downscales).
fn preview_variants(post: &RawPost) -> Vec<ImageVariant> {
    let Some(preview) = &post.preview else {
        return Vec::new();
    };
    preview
        .images
        .iter()
        .flat_map(|image| image.source.iter().chain(image.resolutions.iter()))
        .map(|v| ImageVariant::new(unescape_url(&v.url), v.width, v.height))
        .collect()
}

fn gallery_items(post: &RawPost) -> Vec<GalleryItem> {
    let Some(data) = &post.gallery_data else {
        return Vec::new();
    };
    let metadata = post.media_metadata.as_ref();
    data.items
        .iter()
        .map(|item| {
            let variants = metadata
                .and_then(|m| m.get(&item.media_id))
                .filter(|entry| entry.status.as_deref().is_none_or(|s| s == "valid"))
                .map(|entry| {
                    entry
                        .s
                        .iter()
                        .chain(entry.p.iter())
                        .cloned()
                        .filter_map(MediaRendition::into_variant)
                        .collect()
                })
                .unwrap_or_default();
            GalleryItem { variants }
        })
        .collect()
}

/// Text posts link back to their own permalink.
fn is_self_link(post: &RawPost, url: &str) -> bool {
    post.permalink
        .as_deref()
        .is_some_and(|p| !p.is_empty() && url.ends_with(p))
}

fn has_video_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Decode the HTML entity escaping the upstream applies to URLs.
pub fn unescape_url(url: &str) -> String {
    url.trim().replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(json: serde_json::Value) -> RawPost {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn gallery_collects_variants_in_order() {
        let p = post(serde_json::json!({
            "title": "album",
            "is_gallery": true,
            "gallery_data": {"items": [{"media_id": "a"}, {"media_id": "b"}]},
            "media_metadata": {
                "a": {"status": "valid", "s": {"u": "https://i.redd.it/a.jpg?x=1&amp;y=2", "x": 800, "y": 600},
                      "p": [{"u": "https://preview.redd.it/a.jpg", "x": 108, "y": 81}]},
                "b": {"status": "failed"}
            }
        }));
        let PostKind::Gallery(items) = PostKind::classify(&p) else {
            panic!("expected gallery");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].variants.len(), 2);
        assert_eq!(items[0].variants[0].url, "https://i.redd.it/a.jpg?x=1&y=2");
        assert!(items[1].variants.is_empty());
    }

    #[test]
    fn video_flag_wins_over_link() {
        let p = post(serde_json::json!({
            "title": "clip",
            "is_video": true,
            "url": "https://v.redd.it/abc",
            "preview": {"images": [{"source": {"url": "https://preview.redd.it/abc.jpg", "width": 1280, "height": 720}, "resolutions": []}]}
        }));
        match PostKind::classify(&p) {
            PostKind::Video { previews } => assert_eq!(previews.len(), 1),
            other => panic!("expected video, got {other:?}"),
        }
    }

    #[test]
    fn mp4_link_is_video() {
        let p = post(serde_json::json!({"title": "clip", "url": "https://example.com/x.MP4?dl=1"}));
        assert!(matches!(PostKind::classify(&p), PostKind::Video { .. }));
    }

    #[test]
    fn self_post_is_text() {
        let p = post(serde_json::json!({
            "title": "question",
            "is_self": true,
            "selftext": "  what is this  ",
            "url": "https://www.reddit.com/r/test/comments/1/question/",
            "permalink": "/r/test/comments/1/question/"
        }));
        assert_eq!(
            PostKind::classify(&p),
            PostKind::Text {
                body: Some("what is this".to_string())
            }
        );
    }

    #[test]
    fn link_keeps_reported_dimensions() {
        let p = post(serde_json::json!({
            "title": "pic", "url": "https://i.redd.it/x.png", "width": 1024, "height": 768
        }));
        match PostKind::classify(&p) {
            PostKind::Link { url, dimensions, .. } => {
                assert_eq!(url, "https://i.redd.it/x.png");
                assert_eq!(dimensions, Some((1024, 768)));
            }
            other => panic!("expected link, got {other:?}"),
        }
    }

    #[test]
    fn crosspost_uses_parent_media() {
        let p = post(serde_json::json!({
            "title": "xpost",
            "is_self": true,
            "crosspost_parent_list": [{"title": "orig", "url": "https://i.redd.it/o.jpg"}]
        }));
        assert!(matches!(PostKind::classify(&p), PostKind::Link { .. }));
    }
}
