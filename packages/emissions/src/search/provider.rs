//! Search provider trait for report discovery.
//!
//! Abstracts over web search APIs so the locator can be tested without
//! network calls. Rate-limit errors are distinguishable from empty result
//! sets: an empty `Vec` means the provider answered and found nothing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use url::Url;

use crate::error::{SearchError, SearchResult};
use crate::security::SecretString;

/// A raw result from the search provider, before scoring.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    /// The discovered URL.
    pub url: Url,

    /// Result title.
    pub title: String,

    /// Snippet/description.
    pub snippet: String,
}

impl ProviderResult {
    /// Create a result from a URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            title: String::new(),
            snippet: String::new(),
        }
    }

    /// Create from a URL string, discarding unparseable URLs.
    pub fn from_url(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(Self::new)
    }

    /// Add a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Add a snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }
}

/// Web search abstraction consumed by the locator.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search the web for the query, optionally filtered by file type
    /// (e.g. `"pdf"`); providers without file-type filtering may ignore it.
    async fn search(
        &self,
        query: &str,
        file_type: Option<&str>,
    ) -> SearchResult<Vec<ProviderResult>>;
}

/// Brave-backed search provider.
///
/// Uses Brave's web search API. A 429 response surfaces as
/// [`SearchError::RateLimited`] so the caller can back off.
pub struct BraveSearch {
    api_key: SecretString,
    client: reqwest::Client,
    base_url: String,
    /// Results requested per query.
    pub count: usize,
}

impl BraveSearch {
    /// Create a new Brave search provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            client: reqwest::Client::new(),
            base_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
            count: 15,
        }
    }

    /// Create from the `BRAVE_API_KEY` environment variable.
    pub fn from_env() -> SearchResult<Self> {
        let api_key = std::env::var("BRAVE_API_KEY")
            .map_err(|_| SearchError::Provider("BRAVE_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Set the per-query result count.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set a custom base URL (for proxies and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    async fn search(
        &self,
        query: &str,
        file_type: Option<&str>,
    ) -> SearchResult<Vec<ProviderResult>> {
        #[derive(serde::Deserialize)]
        struct Response {
            #[serde(default)]
            web: Option<WebResults>,
        }

        #[derive(serde::Deserialize)]
        struct WebResults {
            #[serde(default)]
            results: Vec<BraveResult>,
        }

        #[derive(serde::Deserialize)]
        struct BraveResult {
            url: String,
            #[serde(default)]
            title: String,
            #[serde(default)]
            description: String,
        }

        // Brave has no dedicated file-type parameter; fold it into the query.
        let q = match file_type {
            Some(ext) => format!("{} filetype:{}", query, ext),
            None => query.to_string(),
        };

        let response = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", self.api_key.expose())
            .query(&[("q", q.as_str()), ("count", &self.count.to_string())])
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Provider(format!(
                "Brave API error {}: {}",
                status, body
            )));
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        let results = parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let url = Url::parse(&r.url).ok()?;
                Some(
                    ProviderResult::new(url)
                        .with_title(r.title)
                        .with_snippet(r.description),
                )
            })
            .collect();

        Ok(results)
    }
}

/// Mock search provider for testing.
#[derive(Default)]
pub struct MockSearchProvider {
    results: RwLock<HashMap<String, Vec<ProviderResult>>>,
    rate_limit_queries: RwLock<Vec<String>>,
    always_unavailable: bool,
}

impl MockSearchProvider {
    /// Create a new mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add results for a query substring match.
    pub fn with_results(self, query: &str, results: Vec<ProviderResult>) -> Self {
        self.results
            .write()
            .unwrap()
            .insert(query.to_string(), results);
        self
    }

    /// Add URL strings as results for a query substring match.
    pub fn with_urls(self, query: &str, urls: &[&str]) -> Self {
        let results = urls
            .iter()
            .filter_map(|u| ProviderResult::from_url(u))
            .collect();
        self.with_results(query, results)
    }

    /// Rate-limit the first call for this query substring.
    pub fn with_rate_limit_once(self, query: &str) -> Self {
        self.rate_limit_queries
            .write()
            .unwrap()
            .push(query.to_string());
        self
    }

    /// Fail every call with a provider error.
    pub fn always_unavailable() -> Self {
        Self {
            always_unavailable: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(
        &self,
        query: &str,
        _file_type: Option<&str>,
    ) -> SearchResult<Vec<ProviderResult>> {
        if self.always_unavailable {
            return Err(SearchError::Provider("provider down".to_string()));
        }

        {
            let mut limited = self.rate_limit_queries.write().unwrap();
            if let Some(pos) = limited.iter().position(|q| query.contains(q.as_str())) {
                limited.remove(pos);
                return Err(SearchError::RateLimited);
            }
        }

        let results = self.results.read().unwrap();
        Ok(results
            .iter()
            .find(|(key, _)| query.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_matches_query_substring() {
        let provider = MockSearchProvider::new()
            .with_urls("sustainability report", &["https://acme.com/esg-2024.pdf"]);

        let results = provider
            .search("Acme Corp sustainability report", Some("pdf"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url.as_str(), "https://acme.com/esg-2024.pdf");
    }

    #[tokio::test]
    async fn test_mock_rate_limits_once() {
        let provider = MockSearchProvider::new()
            .with_urls("ESG report", &["https://acme.com/esg.pdf"])
            .with_rate_limit_once("ESG report");

        let first = provider.search("Acme Corp ESG report", None).await;
        assert!(matches!(first, Err(SearchError::RateLimited)));

        let second = provider.search("Acme Corp ESG report", None).await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_an_error() {
        let provider = MockSearchProvider::new();
        let results = provider.search("anything", None).await.unwrap();
        assert!(results.is_empty());
    }
}
