//! Public types for the Huginn API.

mod candidate;
mod post;
mod topic;

pub use candidate::{MediaCandidate, PLACEHOLDER_ASSET_URL, fingerprint};
pub use post::{
    GalleryData, GalleryItem, GalleryItemRef, ImageVariant, MediaMetadataEntry, MediaRendition,
    PostKind, Preview, PreviewImage, RawPost, unescape_url,
};
pub use topic::{MAX_TOPIC_LEN, TopicKey};
