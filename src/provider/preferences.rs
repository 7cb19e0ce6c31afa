//! Per-user preferred topics.

use std::collections::HashMap;

use async_trait::async_trait;

/// Lookup of a user's preferred topic, owned by the embedding application.
///
/// The returned string is raw user input; the provider parses and validates
/// it and falls back to a random topic when it is unusable.
#[async_trait]
pub trait TopicPreferences: Send + Sync {
    async fn preferred_topic(&self, user_id: &str) -> Option<String>;
}

/// Fixed in-memory preferences.
///
/// ```rust
/// # use huginn::StaticPreferences;
/// let prefs = StaticPreferences::new().with("1234", "aww");
/// assert_eq!(prefs.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticPreferences {
    topics: HashMap<String, String>,
}

impl StaticPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user_id: impl Into<String>, topic: impl Into<String>) -> Self {
        self.topics.insert(user_id.into(), topic.into());
        self
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

#[async_trait]
impl TopicPreferences for StaticPreferences {
    async fn preferred_topic(&self, user_id: &str) -> Option<String> {
        self.topics.get(user_id).cloned()
    }
}
