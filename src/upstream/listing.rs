//! Lenient listing decoding.
//!
//! A listing is either an envelope
//! `{"data": {"after": ..., "children": [{"kind": "t3", "data": {post}}]}}`
//! or a bare array of posts. Children are decoded one at a time so a single
//! malformed post is dropped instead of failing the page.

use serde_json::Value;
use tracing::debug;

use super::traits::ListingPage;
use crate::types::RawPost;
use crate::{HuginnError, Result};

/// Decode a listing payload into a page of posts.
///
/// Fails only when the payload as a whole is not a listing.
pub fn parse_listing(payload: Value) -> Result<ListingPage> {
    let (children, after) = match payload {
        Value::Array(children) => (children, None),
        Value::Object(mut map) => {
            let Some(Value::Object(mut data)) = map.remove("data") else {
                return Err(HuginnError::Upstream(
                    "listing payload has no data object".to_string(),
                ));
            };
            let Some(Value::Array(children)) = data.remove("children") else {
                return Err(HuginnError::Upstream(
                    "listing payload has no children array".to_string(),
                ));
            };
            let after = match data.remove("after") {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                _ => None,
            };
            (children, after)
        }
        other => {
            return Err(HuginnError::Upstream(format!(
                "unexpected listing payload: {}",
                json_kind(&other)
            )));
        }
    };

    let mut page = ListingPage {
        posts: Vec::with_capacity(children.len()),
        after,
        skipped: 0,
    };
    for child in children {
        match serde_json::from_value::<RawPost>(unwrap_child(child)) {
            Ok(post) => page.posts.push(post),
            Err(e) => {
                debug!(error = %e, "skipping malformed post");
                page.skipped += 1;
            }
        }
    }
    Ok(page)
}

/// `{"kind": ..., "data": {...}}` → the inner post; anything else as is.
fn unwrap_child(child: Value) -> Value {
    match child {
        Value::Object(mut map) if map.contains_key("kind") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
