//! Report locator: query variants, relevance scoring, candidate selection.

use chrono::Datelike;
use tracing::{debug, info, warn};

use crate::error::{Result, SearchError, TrackerError};
use crate::retry::RetryPolicy;
use crate::search::provider::{ProviderResult, SearchProvider};
use crate::types::document::CandidateDocument;

/// Keywords that indicate report content.
const REPORT_KEYWORDS: &[&str] = &[
    "sustainability",
    "esg",
    "responsibility",
    "cdp",
    "climate",
    "emissions",
    "scope",
];

/// Keywords that indicate a document we do not want (filings, proxies).
const NEGATIVE_KEYWORDS: &[&str] = &["proxy statement", "10-k", "annual meeting", "sec filing"];

/// Minimum relevance score a candidate must clear.
const RELEVANCE_THRESHOLD: f32 = 0.5;

/// Locates a company's sustainability report via a search provider.
///
/// Issues several query variants, scores every result with a weighted
/// relevance function, and returns the best candidate above the threshold.
pub struct ReportLocator<S: SearchProvider> {
    provider: S,
    retry: RetryPolicy,
}

impl<S: SearchProvider> ReportLocator<S> {
    /// Create a locator over a search provider.
    pub fn new(provider: S) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy for provider calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Find the best report candidate for a company.
    ///
    /// Fails with [`TrackerError::NotFound`] when nothing clears the
    /// relevance threshold, or [`TrackerError::UpstreamUnavailable`] when
    /// every query variant failed at the provider.
    pub async fn locate(&self, company: &str) -> Result<CandidateDocument> {
        let recent_year = chrono::Utc::now().year();
        let variants = query_variants(company, recent_year);

        let mut candidates: Vec<CandidateDocument> = Vec::new();
        let mut last_error: Option<SearchError> = None;
        let mut any_succeeded = false;

        for (query, year, file_type) in &variants {
            debug!(query = %query, "searching for report");

            let outcome = self
                .retry
                .run(
                    || self.provider.search(query, *file_type),
                    SearchError::is_retryable,
                )
                .await;

            match outcome {
                Ok(results) => {
                    any_succeeded = true;
                    for result in results {
                        let score = relevance_score(&result, company, recent_year);
                        candidates.push(to_candidate(result, score, *year));
                    }
                }
                Err(e) => {
                    // One failed variant is not fatal as long as another answers.
                    warn!(query = %query, error = %e, "query variant failed");
                    last_error = Some(e);
                }
            }
        }

        if !any_succeeded {
            let source = last_error
                .map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
                .unwrap_or_else(|| "no query variants executed".into());
            return Err(TrackerError::UpstreamUnavailable(source));
        }

        let best = candidates
            .into_iter()
            .filter(|c| c.relevance_score > RELEVANCE_THRESHOLD)
            .max_by(|a, b| a.relevance_score.total_cmp(&b.relevance_score));

        match best {
            Some(candidate) => {
                info!(
                    url = %candidate.url,
                    score = candidate.relevance_score,
                    "selected report candidate"
                );
                Ok(candidate)
            }
            None => Err(TrackerError::NotFound {
                company: company.to_string(),
            }),
        }
    }
}

/// Query variants with the nominal year each one targets.
fn query_variants(company: &str, recent_year: i32) -> Vec<(String, i32, Option<&'static str>)> {
    vec![
        (
            format!("{} sustainability report", company),
            recent_year,
            Some("pdf"),
        ),
        (
            format!("{} CDP climate change response", company),
            recent_year - 1,
            None,
        ),
        (format!("{} ESG report", company), recent_year, Some("pdf")),
        (
            format!("{} scope 1 scope 2 emissions data", company),
            recent_year,
            None,
        ),
        (
            format!("{} corporate responsibility report", company),
            recent_year,
            Some("pdf"),
        ),
    ]
}

/// Weighted relevance of a search result for the company's report.
fn relevance_score(result: &ProviderResult, company: &str, recent_year: i32) -> f32 {
    let mut score = 0.0f32;
    let url = result.url.as_str().to_lowercase();
    let host = result.url.host_str().unwrap_or_default().to_lowercase();
    let title = result.title.to_lowercase();
    let snippet = result.snippet.to_lowercase();

    // Company match: the company's own domain is the strongest signal.
    let slug: String = company
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if !slug.is_empty() {
        if host.replace(['.', '-'], "").contains(&slug) {
            score += 0.3;
        } else if url.replace(['/', '-', '_'], "").contains(&slug) {
            score += 0.15;
        }
    }

    // Report keywords in URL, title, snippet.
    for keyword in REPORT_KEYWORDS {
        if url.contains(keyword) {
            score += 0.1;
        }
        if title.contains(keyword) {
            score += 0.05;
        }
        if snippet.contains(keyword) {
            score += 0.025;
        }
    }

    // Year tokens: most recent year preferred, then the two prior.
    let combined = format!("{} {} {}", url, title, snippet);
    if combined.contains(&recent_year.to_string()) {
        score += 0.15;
    } else if combined.contains(&(recent_year - 1).to_string()) {
        score += 0.1;
    } else if combined.contains(&(recent_year - 2).to_string()) {
        score += 0.05;
    }

    // Direct PDF links usually are the report itself.
    if url.ends_with(".pdf") {
        score += 0.2;
    }

    // Filings and proxy material score themselves out.
    for negative in NEGATIVE_KEYWORDS {
        if combined.contains(negative) {
            score -= 0.3;
        }
    }

    score.clamp(0.0, 1.0)
}

fn to_candidate(result: ProviderResult, score: f32, year: i32) -> CandidateDocument {
    CandidateDocument::new(result.url)
        .with_title(result.title)
        .with_snippet(result.snippet)
        .with_score(score)
        .with_query_year(year)
}
