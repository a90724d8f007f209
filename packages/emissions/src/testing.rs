//! Testing utilities including mock implementations.
//!
//! These let applications test pipeline logic without network access or
//! real model calls. The search-side counterpart, `MockSearchProvider`,
//! lives beside the provider trait and is re-exported here.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use url::Url;

use crate::ai::ExtractionModel;
use crate::error::{FetchError, FetchResult, ModelError, ModelResult};
use crate::fetch::DocumentSource;
use crate::types::document::{ContentKind, ExtractedText, TextSegment};

pub use crate::search::MockSearchProvider;

/// A mock document source for testing.
///
/// Serves predefined extracted text by URL; unknown URLs fail with a
/// 404 status. Individual URLs can be scripted to fail instead.
#[derive(Default)]
pub struct MockDocumentSource {
    /// Predefined documents by URL
    documents: Arc<RwLock<HashMap<String, ExtractedText>>>,

    /// URLs that should fail with a connection-style error
    failures: Arc<RwLock<HashMap<String, u16>>>,

    /// Fetched URLs, for assertions
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockDocumentSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` as a single text segment for `url`.
    pub fn with_text(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        let extracted =
            ExtractedText::new(vec![TextSegment::new(Some(1), ContentKind::Text, text)]);
        self.with_document(url, extracted)
    }

    /// Serve a full extracted document for `url`.
    pub fn with_document(self, url: impl Into<String>, document: ExtractedText) -> Self {
        self.documents.write().unwrap().insert(url.into(), document);
        self
    }

    /// Make `url` fail with the given HTTP status.
    pub fn with_failure(self, url: impl Into<String>, status: u16) -> Self {
        self.failures.write().unwrap().insert(url.into(), status);
        self
    }

    /// URLs fetched so far, in order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    async fn fetch(&self, url: &Url) -> FetchResult<ExtractedText> {
        let key = url.to_string();
        self.calls.write().unwrap().push(key.clone());

        if let Some(status) = self.failures.read().unwrap().get(&key) {
            return Err(FetchError::Status {
                status: *status,
                url: key,
            });
        }
        match self.documents.read().unwrap().get(&key) {
            Some(document) => Ok(document.clone()),
            None => Err(FetchError::Status {
                status: 404,
                url: key,
            }),
        }
    }
}

/// A mock extraction model for testing.
///
/// Returns predefined replies matched by substring against the user
/// prompt, in insertion order. Prompts matching nothing get the default
/// reply (an all-null response unless overridden).
pub struct MockModel {
    /// (prompt substring, reply) pairs, matched in order
    replies: Arc<RwLock<Vec<(String, String)>>>,

    /// Reply for prompts matching no substring
    default_reply: Arc<RwLock<String>>,

    /// Prompt substrings that should fail with a service error
    failures: Arc<RwLock<Vec<String>>>,

    /// User prompts seen, for assertions
    calls: Arc<RwLock<Vec<String>>>,
}

/// A reply stating no data was found, in the expected schema.
pub const EMPTY_REPLY: &str = r#"{
  "company": null,
  "sector": null,
  "current_year": null,
  "previous_years": [],
  "source_details": null
}"#;

impl Default for MockModel {
    fn default() -> Self {
        Self {
            replies: Arc::new(RwLock::new(Vec::new())),
            default_reply: Arc::new(RwLock::new(EMPTY_REPLY.to_string())),
            failures: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl MockModel {
    /// Create a mock that answers every prompt with the empty reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` when the user prompt contains `needle`.
    pub fn with_reply(self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies
            .write()
            .unwrap()
            .push((needle.into(), reply.into()));
        self
    }

    /// Change the reply for unmatched prompts.
    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        *self.default_reply.write().unwrap() = reply.into();
        self
    }

    /// Fail with a service error when the user prompt contains `needle`.
    pub fn with_failure(self, needle: impl Into<String>) -> Self {
        self.failures.write().unwrap().push(needle.into());
        self
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// User prompts seen, for assertions.
    pub fn prompts(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionModel for MockModel {
    async fn generate(&self, _system: &str, user: &str) -> ModelResult<String> {
        self.calls.write().unwrap().push(user.to_string());

        if self
            .failures
            .read()
            .unwrap()
            .iter()
            .any(|needle| user.contains(needle.as_str()))
        {
            return Err(ModelError::Service("mock failure".to_string()));
        }

        for (needle, reply) in self.replies.read().unwrap().iter() {
            if user.contains(needle.as_str()) {
                return Ok(reply.clone());
            }
        }
        Ok(self.default_reply.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_serves_and_fails() {
        let source = MockDocumentSource::new()
            .with_text("https://a.example/r.pdf", "Scope 1: 14,390")
            .with_failure("https://b.example/r.pdf", 503);

        let ok = source
            .fetch(&Url::parse("https://a.example/r.pdf").unwrap())
            .await
            .unwrap();
        assert_eq!(ok.segments[0].text, "Scope 1: 14,390");

        let err = source
            .fetch(&Url::parse("https://b.example/r.pdf").unwrap())
            .await;
        assert!(matches!(err, Err(FetchError::Status { status: 503, .. })));
        assert_eq!(source.fetched_urls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_model_matches_substring() {
        let model = MockModel::new().with_reply("Scope 1", r#"{"company":null}"#);

        let matched = model.generate("sys", "text with Scope 1 data").await.unwrap();
        assert_eq!(matched, r#"{"company":null}"#);

        let unmatched = model.generate("sys", "nothing relevant").await.unwrap();
        assert_eq!(unmatched, EMPTY_REPLY);
        assert_eq!(model.call_count(), 2);
    }
}
