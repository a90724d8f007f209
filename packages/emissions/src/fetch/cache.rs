//! Document memoization keyed by URL.
//!
//! A pure memoization layer: an entry is either present (skip the fetch)
//! or absent (fetch and store). No invalidation.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::document::ExtractedText;

/// Cache of extracted documents, keyed by URL string.
#[async_trait]
pub trait DocumentCache: Send + Sync {
    /// Look up a previously extracted document.
    async fn get(&self, url: &str) -> Option<ExtractedText>;

    /// Store an extracted document.
    async fn put(&self, url: &str, text: &ExtractedText);
}

/// In-memory document cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, ExtractedText>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentCache for MemoryCache {
    async fn get(&self, url: &str) -> Option<ExtractedText> {
        self.entries.read().await.get(url).cloned()
    }

    async fn put(&self, url: &str, text: &ExtractedText) {
        self.entries
            .write()
            .await
            .insert(url.to_string(), text.clone());
    }
}
