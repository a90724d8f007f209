//! HTTP content fetcher with retry, fallback URLs, and archive mirror.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::fetch::cache::DocumentCache;
use crate::fetch::{html, pdf, DocumentSource};
use crate::retry::RetryPolicy;
use crate::types::config::FetchConfig;
use crate::types::document::ExtractedText;

/// Detected payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Pdf,
    Html,
}

/// Fetches report documents over HTTP and converts them to text.
///
/// Resilience order for a failing URL: bounded retry of the URL itself,
/// then deterministic alternates (scheme swap, trailing-slash variants),
/// then a web-archive snapshot. Only when everything fails does the
/// fetch error surface.
pub struct ContentFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    retry: RetryPolicy,
    cache: Option<Arc<dyn DocumentCache>>,
}

impl ContentFetcher {
    /// Create a fetcher with the given config.
    pub fn new(config: FetchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        let retry = RetryPolicy::new(config.max_attempts);
        Self {
            client,
            config,
            retry,
            cache: None,
        }
    }

    /// Memoize extracted documents in the given cache.
    pub fn with_cache(mut self, cache: Arc<dyn DocumentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Download one URL and return body plus the server's content type.
    async fn download(&self, url: &Url) -> FetchResult<(Vec<u8>, Option<String>)> {
        debug!(url = %url, "downloading document");
        let response = self
            .client
            .get(url.clone())
            .header("User-Agent", &self.config.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?
            .to_vec();

        Ok((body, content_type))
    }

    /// Convert a downloaded body into structured text.
    fn convert(&self, url: &Url, body: &[u8], content_type: Option<&str>) -> FetchResult<ExtractedText> {
        let max_chars = self.config.max_extracted_chars;
        match detect_format(url, body, content_type) {
            Some(DocumentFormat::Pdf) => pdf::extract(body, max_chars),
            Some(DocumentFormat::Html) => {
                let html_str = String::from_utf8_lossy(body);
                html::extract(&html_str, max_chars).map_err(|e| match e {
                    FetchError::EmptyDocument { .. } => FetchError::EmptyDocument {
                        url: url.to_string(),
                    },
                    other => other,
                })
            }
            None => Err(FetchError::UnsupportedFormat {
                content_type: content_type.unwrap_or("unknown").to_string(),
            }),
        }
    }
}

#[async_trait]
impl DocumentSource for ContentFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<ExtractedText> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(url.as_str()).await {
                debug!(url = %url, "document cache hit");
                return Ok(hit);
            }
        }

        let candidates = candidate_urls(url, self.config.archive_fallback);
        let mut last_error: Option<FetchError> = None;

        for (i, candidate) in candidates.iter().enumerate() {
            if i > 0 {
                info!(url = %candidate, "trying fallback URL");
            }

            let downloaded = self
                .retry
                .run(|| self.download(candidate), FetchError::is_retryable)
                .await;

            let (body, content_type) = match downloaded {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(url = %candidate, error = %e, "download failed");
                    last_error = Some(e);
                    continue;
                }
            };

            match self.convert(url, &body, content_type.as_deref()) {
                Ok(text) => {
                    info!(
                        url = %candidate,
                        segments = text.segments.len(),
                        truncated = text.truncated,
                        "document extracted"
                    );
                    if let Some(cache) = &self.cache {
                        cache.put(url.as_str(), &text).await;
                    }
                    return Ok(text);
                }
                // An unhandled format will not improve at a mirror.
                Err(e @ FetchError::UnsupportedFormat { .. }) => return Err(e),
                Err(e) => {
                    warn!(url = %candidate, error = %e, "conversion failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::InvalidUrl {
            url: url.to_string(),
        }))
    }
}

/// The original URL, its deterministic alternates, and the archive mirror.
fn candidate_urls(url: &Url, archive_fallback: bool) -> Vec<Url> {
    let mut candidates = vec![url.clone()];

    // Scheme swap.
    let mut swapped = url.clone();
    let other_scheme = if url.scheme() == "https" { "http" } else { "https" };
    if swapped.set_scheme(other_scheme).is_ok() {
        candidates.push(swapped);
    }

    // Trailing-slash toggle; pointless for direct file links.
    let path = url.path().to_string();
    if !path.ends_with(".pdf") && !path.ends_with(".html") && !path.ends_with(".htm") {
        let mut toggled = url.clone();
        if path.ends_with('/') && path.len() > 1 {
            toggled.set_path(path.trim_end_matches('/'));
        } else {
            toggled.set_path(&format!("{}/", path));
        }
        candidates.push(toggled);
    }

    if archive_fallback {
        if let Ok(archive) = Url::parse(&format!("https://web.archive.org/web/{}", url)) {
            candidates.push(archive);
        }
    }

    candidates
}

/// Decide PDF vs HTML from content type, URL extension, and magic bytes.
fn detect_format(url: &Url, body: &[u8], content_type: Option<&str>) -> Option<DocumentFormat> {
    if let Some(ct) = content_type {
        if ct.contains("application/pdf") {
            return Some(DocumentFormat::Pdf);
        }
        if ct.contains("text/html") || ct.contains("application/xhtml") {
            return Some(DocumentFormat::Html);
        }
    }

    if body.starts_with(b"%PDF") {
        return Some(DocumentFormat::Pdf);
    }

    let path = url.path().to_lowercase();
    if path.ends_with(".pdf") {
        return Some(DocumentFormat::Pdf);
    }
    if path.ends_with(".html") || path.ends_with(".htm") {
        return Some(DocumentFormat::Html);
    }

    // Sniff: plenty of servers send text/plain for HTML.
    let head = String::from_utf8_lossy(&body[..body.len().min(512)]).to_lowercase();
    if head.contains("<html") || head.contains("<!doctype html") {
        return Some(DocumentFormat::Html);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_urls_scheme_swap_and_archive() {
        let url = Url::parse("https://acme.com/esg-2024.pdf").unwrap();
        let candidates = candidate_urls(&url, true);

        assert_eq!(candidates[0].as_str(), "https://acme.com/esg-2024.pdf");
        assert_eq!(candidates[1].as_str(), "http://acme.com/esg-2024.pdf");
        assert!(candidates
            .last()
            .unwrap()
            .as_str()
            .starts_with("https://web.archive.org/web/"));
    }

    #[test]
    fn test_candidate_urls_slash_toggle_for_page_urls() {
        let url = Url::parse("https://acme.com/sustainability").unwrap();
        let candidates = candidate_urls(&url, false);
        assert!(candidates
            .iter()
            .any(|u| u.path() == "/sustainability/"));

        let slashed = Url::parse("https://acme.com/sustainability/").unwrap();
        let candidates = candidate_urls(&slashed, false);
        assert!(candidates.iter().any(|u| u.path() == "/sustainability"));
    }

    #[test]
    fn test_extracted_chars_cap_truncates_conversion() {
        let fetcher = ContentFetcher::new(FetchConfig::default().with_max_extracted_chars(40));
        let url = Url::parse("https://acme.com/report.html").unwrap();
        let body = b"<html><body><p>Scope 1 emissions were 14,390 metric tons CO2e \
                     across all operating regions this year.</p></body></html>";

        let text = fetcher.convert(&url, body, Some("text/html")).unwrap();

        assert!(text.truncated);
        let total: usize = text.segments.iter().map(|s| s.text.chars().count()).sum();
        assert!(total <= 40);
    }

    #[test]
    fn test_detect_format_prefers_content_type() {
        let url = Url::parse("https://acme.com/report").unwrap();
        assert_eq!(
            detect_format(&url, b"%PDF-1.7", Some("application/pdf")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            detect_format(&url, b"<html><body>", Some("text/html; charset=utf-8")),
            Some(DocumentFormat::Html)
        );
    }

    #[test]
    fn test_detect_format_magic_bytes_and_extension() {
        let pdf_url = Url::parse("https://acme.com/esg.pdf").unwrap();
        assert_eq!(
            detect_format(&pdf_url, b"not-really", Some("application/octet-stream")),
            Some(DocumentFormat::Pdf)
        );

        let plain_url = Url::parse("https://acme.com/page").unwrap();
        assert_eq!(
            detect_format(&plain_url, b"<!DOCTYPE html><html>", Some("text/plain")),
            Some(DocumentFormat::Html)
        );
        assert_eq!(detect_format(&plain_url, b"PK\x03\x04zipdata", None), None);
    }
}
