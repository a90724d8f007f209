//! Candidate documents and extracted text.

use serde::{Deserialize, Serialize};
use url::Url;

/// A scored candidate from report search.
///
/// Produced by the locator, consumed once to pick the best candidate;
/// never persisted.
#[derive(Debug, Clone)]
pub struct CandidateDocument {
    /// The candidate URL.
    pub url: Url,

    /// Title from search results.
    pub title: String,

    /// Snippet/description from search results.
    pub snippet: String,

    /// Weighted relevance score (0.0-1.0).
    pub relevance_score: f32,

    /// Host the candidate came from.
    pub source_domain: String,

    /// Target year of the query variant that found this candidate.
    pub query_year: i32,
}

impl CandidateDocument {
    /// Create a candidate from a URL with empty metadata.
    pub fn new(url: Url) -> Self {
        let source_domain = url.host_str().unwrap_or_default().to_string();
        Self {
            url,
            title: String::new(),
            snippet: String::new(),
            relevance_score: 0.0,
            source_domain,
            query_year: 0,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.relevance_score = score;
        self
    }

    /// Set the originating query year.
    pub fn with_query_year(mut self, year: i32) -> Self {
        self.query_year = year;
        self
    }

    /// Nominal reporting year of the document.
    ///
    /// Prefers a year token in the URL or title; falls back to the year
    /// attached to the query variant that surfaced the candidate.
    pub fn report_year(&self) -> i32 {
        let haystack = format!("{} {}", self.url.as_str(), self.title);
        extract_year_token(&haystack).unwrap_or(self.query_year)
    }
}

/// First plausible 4-digit year (2000-2099) in the text.
fn extract_year_token(text: &str) -> Option<i32> {
    let year_pattern = regex::Regex::new(r"(?:^|[^0-9])(20\d{2})(?:[^0-9]|$)").unwrap();
    year_pattern
        .captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Tag for a segment of extracted text.
///
/// Classification is heuristic; the classifier lives in `fetch::pdf` as a
/// pure function so it can be tested without parsing a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentKind {
    /// Tabular rows (column separators, aligned numbers).
    Table,
    /// Narrative prose.
    Text,
    /// Section/table headings.
    Header,
    /// A single line carrying figures outside a detected table.
    Data,
}

/// One contiguous piece of extracted document text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSegment {
    /// 1-indexed page the segment came from; `None` for HTML documents.
    pub page: Option<u32>,

    /// Segment classification.
    pub kind: ContentKind,

    /// The text itself.
    pub text: String,
}

impl TextSegment {
    /// Create a segment.
    pub fn new(page: Option<u32>, kind: ContentKind, text: impl Into<String>) -> Self {
        Self {
            page,
            kind,
            text: text.into(),
        }
    }
}

/// Structured text for one fetched document.
///
/// Immutable once produced; page numbers are preserved for later
/// source attribution.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    /// Ordered segments in document reading order.
    pub segments: Vec<TextSegment>,

    /// Set when the document exceeded the extracted-text cap and was
    /// cut short.
    pub truncated: bool,
}

impl ExtractedText {
    /// Create from segments.
    pub fn new(segments: Vec<TextSegment>) -> Self {
        Self {
            segments,
            truncated: false,
        }
    }

    /// Mark the document as truncated.
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    /// Whether any text was extracted.
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }

    /// Lines in reading order, each with its originating page and kind.
    pub fn lines(&self) -> Vec<(Option<u32>, ContentKind, &str)> {
        self.segments
            .iter()
            .flat_map(|seg| {
                seg.text
                    .lines()
                    .map(move |line| (seg.page, seg.kind, line))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_year_from_url() {
        let candidate =
            CandidateDocument::new(Url::parse("https://acme.com/esg-2024.pdf").unwrap())
                .with_query_year(2023);
        assert_eq!(candidate.report_year(), 2024);
    }

    #[test]
    fn test_report_year_falls_back_to_query_year() {
        let candidate = CandidateDocument::new(Url::parse("https://acme.com/esg.pdf").unwrap())
            .with_title("Sustainability Report")
            .with_query_year(2023);
        assert_eq!(candidate.report_year(), 2023);
    }

    #[test]
    fn test_year_token_ignores_longer_digit_runs() {
        // Document ids like 120240001 must not read as 2024
        assert_eq!(extract_year_token("report-120240001"), None);
        assert_eq!(extract_year_token("fy2022-filing"), Some(2022));
    }

    #[test]
    fn test_lines_carry_page_and_kind() {
        let text = ExtractedText::new(vec![
            TextSegment::new(Some(3), ContentKind::Table, "a | b\nc | d"),
            TextSegment::new(Some(4), ContentKind::Text, "prose"),
        ]);

        let lines = text.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], (Some(3), ContentKind::Table, "a | b"));
        assert_eq!(lines[2], (Some(4), ContentKind::Text, "prose"));
    }
}
