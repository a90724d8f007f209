//! Document fetching: download, fallback, and text extraction.

pub mod cache;
pub mod fetcher;
pub mod html;
pub mod pdf;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchResult;
use crate::types::document::ExtractedText;

pub use cache::{DocumentCache, MemoryCache};
pub use fetcher::ContentFetcher;

/// Source of extracted document text.
///
/// [`ContentFetcher`] is the HTTP implementation; tests inject
/// `MockDocumentSource` from the testing module.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Retrieve and convert the document at `url` into structured text.
    async fn fetch(&self, url: &Url) -> FetchResult<ExtractedText>;
}
