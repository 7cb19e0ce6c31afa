//! Versioned JSON documents on disk.
//!
//! Both cache documents share one layout, `{ "version": 1, "topics": {...} }`.
//! A bare `{...}` map is accepted on read for files written before the
//! version wrapper existed.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{HuginnError, Result};

/// Current document format version.
pub(crate) const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Versioned<T> {
    version: u32,
    topics: T,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload<T> {
    Versioned(Versioned<T>),
    Legacy(T),
}

fn parse_payload<T: DeserializeOwned>(json: &str) -> Result<T> {
    let payload: RawPayload<T> = serde_json::from_str(json)
        .map_err(|e| HuginnError::Persistence(format!("failed to parse cache document: {e}")))?;
    match payload {
        RawPayload::Versioned(doc) => {
            if doc.version > FORMAT_VERSION {
                return Err(HuginnError::Persistence(format!(
                    "unsupported cache version {} (max supported: {FORMAT_VERSION})",
                    doc.version
                )));
            }
            Ok(doc.topics)
        }
        RawPayload::Legacy(topics) => Ok(topics),
    }
}

/// Load a document, or `None` when the file is missing or unreadable.
///
/// Corrupt files are logged and treated as absent.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache document");
            return None;
        }
    };
    match parse_payload(&content) {
        Ok(topics) => Some(topics),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt cache document, starting empty");
            None
        }
    }
}

/// Write a document atomically (tmp file, then rename).
pub(crate) fn write_document<T: Serialize>(path: &Path, topics: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            HuginnError::Persistence(format!(
                "failed to create cache dir {}: {e}",
                parent.display()
            ))
        })?;
    }

    let doc = Versioned {
        version: FORMAT_VERSION,
        topics,
    };
    let json = serde_json::to_string(&doc)
        .map_err(|e| HuginnError::Persistence(format!("failed to serialize cache: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(|e| {
        HuginnError::Persistence(format!(
            "failed to write cache file {}: {e}",
            tmp_path.display()
        ))
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        HuginnError::Persistence(format!(
            "failed to rename cache file {} → {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn accepts_versioned_and_bare_maps() {
        let versioned: BTreeMap<String, bool> =
            parse_payload(r#"{"version": 1, "topics": {"aww": true}}"#).unwrap();
        let bare: BTreeMap<String, bool> = parse_payload(r#"{"aww": true}"#).unwrap();
        assert_eq!(versioned, bare);
    }

    #[test]
    fn rejects_future_versions() {
        let result: Result<BTreeMap<String, bool>> =
            parse_payload(r#"{"version": 99, "topics": {}}"#);
        assert!(matches!(result, Err(HuginnError::Persistence(_))));
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("topics.json");
        let mut topics = BTreeMap::new();
        topics.insert("pics".to_string(), false);

        write_document(&path, &topics).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        let back: BTreeMap<String, bool> = read_document(&path).unwrap();
        assert_eq!(back, topics);
    }

    #[test]
    fn missing_and_corrupt_files_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queues.json");
        assert!(read_document::<BTreeMap<String, bool>>(&path).is_none());

        std::fs::write(&path, "{not json").unwrap();
        assert!(read_document::<BTreeMap<String, bool>>(&path).is_none());
    }
}
