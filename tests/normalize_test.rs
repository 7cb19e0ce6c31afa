//! End-to-end normalization: raw listing payloads in, ranked candidates out.

use serde_json::json;

use huginn::normalize::{NormalizerConfig, PostNormalizer, ValidityFilter};
use huginn::types::PLACEHOLDER_ASSET_URL;
use huginn::upstream::parse_listing;
use huginn::TopicKey;

fn topic() -> TopicKey {
    TopicKey::parse("earthporn").unwrap()
}

fn normalizer() -> PostNormalizer {
    PostNormalizer::new("reddit", NormalizerConfig::default())
}

fn listing(children: Vec<serde_json::Value>) -> serde_json::Value {
    let children: Vec<_> = children
        .into_iter()
        .map(|data| json!({"kind": "t3", "data": data}))
        .collect();
    json!({"kind": "Listing", "data": {"after": null, "children": children}})
}

#[test]
fn gallery_quality_selection_yields_single_best_asset() {
    let payload = listing(vec![json!({
        "id": "g1",
        "title": "Mountains",
        "author": "hiker",
        "is_gallery": true,
        "gallery_data": {"items": [{"media_id": "m1"}]},
        "media_metadata": {
            "m1": {
                "status": "valid",
                "p": [
                    {"u": "https://example.com/tiny.bmp", "x": 200, "y": 200},
                    {"u": "https://example.com/large.jpg", "x": 800, "y": 600},
                    {"u": "https://example.com/medium.png", "x": 640, "y": 480}
                ]
            }
        }
    })]);

    let page = parse_listing(payload).unwrap();
    let candidates = normalizer().normalize_batch(&topic(), &page.posts);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].asset_url, "https://example.com/large.jpg");
    assert_eq!(candidates[0].quality_score, 800 * 600);
    assert_eq!(candidates[0].description, "Posted by u/hiker in r/earthporn");
}

#[test]
fn mixed_listing_produces_one_candidate_per_post() {
    let payload = listing(vec![
        json!({
            "title": "direct",
            "url": "https://i.redd.it/abc.jpg",
            "post_hint": "image",
            "preview": {"images": [{"source": {"url": "https://preview.redd.it/abc.jpg?s=1&amp;w=2", "width": 1024, "height": 768}}]}
        }),
        json!({
            "title": "clip",
            "is_video": true,
            "url": "https://v.redd.it/xyz",
            "preview": {"images": [{"source": {"url": "https://preview.redd.it/xyz.jpg", "width": 1280, "height": 720}}]}
        }),
        json!({
            "title": "Thoughts on lakes",
            "is_self": true,
            "selftext": "Lakes are calm. Rivers are not. This sentence keeps going for a while so it has to be cut somewhere sensible before the end of the limit is reached, right here or close to it."
        }),
        json!({
            "title": "pinned",
            "stickied": true,
            "url": "https://i.redd.it/pinned.jpg"
        }),
    ]);

    let page = parse_listing(payload).unwrap();
    let candidates = normalizer().normalize_batch(&topic(), &page.posts);
    assert_eq!(candidates.len(), 3);

    // without reported dimensions the direct link wins over its preview
    assert_eq!(candidates[0].asset_url, "https://i.redd.it/abc.jpg");

    // video posts never serve the stream
    assert_eq!(candidates[1].asset_url, "https://preview.redd.it/xyz.jpg");

    let text = &candidates[2];
    assert_eq!(text.asset_url, PLACEHOLDER_ASSET_URL);
    assert!(text.is_placeholder());
    let rendered = text.placeholder_text.as_deref().unwrap();
    assert!(rendered.starts_with("Lakes are calm."));
    assert!(rendered.ends_with('…'));
    assert!(rendered.chars().count() <= 120);
}

#[test]
fn stricter_filter_turns_small_images_into_placeholders() {
    let strict = PostNormalizer::new(
        "reddit",
        NormalizerConfig::new().filter(ValidityFilter::new().min_dimensions(2000, 2000)),
    );
    let payload = listing(vec![json!({
        "title": "small",
        "url": "https://i.redd.it/small.jpg",
        "width": 800,
        "height": 600
    })]);

    let page = parse_listing(payload).unwrap();
    let candidates = strict.normalize_batch(&topic(), &page.posts);
    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].is_placeholder());
    assert_eq!(candidates[0].placeholder_text.as_deref(), Some("small"));
}

#[test]
fn duplicate_posts_share_fingerprints() {
    let post = json!({"title": "same", "url": "https://i.redd.it/same.png"});
    let page = parse_listing(listing(vec![post.clone(), post])).unwrap();
    let candidates = normalizer().normalize_batch(&topic(), &page.posts);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].fingerprint, candidates[1].fingerprint);
}
