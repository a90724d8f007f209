//! PDF text extraction with page attribution and line classification.
//!
//! Uses `lopdf` for page-by-page text and falls back to `pdf-extract`
//! for documents lopdf cannot read page-wise. Classification of lines
//! into table/header/data/text is a pure function, kept separate from
//! parsing so the heuristics are unit-testable.

use std::sync::LazyLock;

use lopdf::Document;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::types::document::{ContentKind, ExtractedText, TextSegment};

/// Patterns marking a page as relevant to emissions data.
static DATA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)scope\s*[123]",
        r"(?i)emissions",
        r"(?i)fy\d{2}",
        r"\b(19|20)\d{2}\b",
        r"(?i)mtco2e?",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Section/table heading markers.
static HEADING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(table|figure|notes?|section|appendix)\b").unwrap());

/// Extract structured text from PDF bytes.
///
/// Pages matching the emissions data patterns are kept; when no page
/// matches (some reports phrase things differently), every page is kept
/// and the segmenter's fallback takes over. `max_chars` caps the total
/// extracted text; hitting the cap sets the truncation flag.
pub fn extract(bytes: &[u8], max_chars: usize) -> FetchResult<ExtractedText> {
    let pages = match extract_pages_lopdf(bytes) {
        Ok(pages) if !pages.iter().all(|(_, t)| t.trim().is_empty()) => pages,
        // lopdf failed or produced nothing; try the pdf-extract renderer,
        // which handles some encodings lopdf does not.
        other => {
            if let Err(e) = &other {
                warn!(error = %e, "lopdf extraction failed, trying pdf-extract");
            }
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| FetchError::Pdf(e.to_string()))?;
            if text.trim().is_empty() {
                return Err(FetchError::Pdf("no extractable text in PDF".to_string()));
            }
            vec![(0u32, text)]
        }
    };

    let relevant: Vec<&(u32, String)> = pages
        .iter()
        .filter(|(_, text)| DATA_PATTERNS.iter().any(|p| p.is_match(text)))
        .collect();
    let selected: Vec<&(u32, String)> = if relevant.is_empty() {
        debug!("no pages matched data patterns, keeping all pages");
        pages.iter().collect()
    } else {
        relevant
    };

    let mut segments = Vec::new();
    let mut total_chars = 0usize;
    let mut truncated = false;

    'pages: for (page_num, text) in selected {
        let page = (*page_num > 0).then_some(*page_num);
        let lines = reflow_columns(text);
        for segment in classify_lines(page, &lines) {
            let len = segment.text.chars().count();
            if total_chars + len > max_chars {
                truncated = true;
                break 'pages;
            }
            total_chars += len;
            segments.push(segment);
        }
    }

    if segments.is_empty() {
        return Err(FetchError::Pdf("no text survived extraction".to_string()));
    }

    Ok(ExtractedText::new(segments).with_truncated(truncated))
}

/// Page-by-page text via lopdf, 1-indexed.
fn extract_pages_lopdf(bytes: &[u8]) -> FetchResult<Vec<(u32, String)>> {
    let doc = Document::load_mem(bytes).map_err(|e| FetchError::Pdf(e.to_string()))?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(FetchError::Pdf("PDF has no pages".to_string()));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    for number in page_numbers {
        // A single unreadable page is skipped, not fatal.
        match doc.extract_text(&[number]) {
            Ok(text) => pages.push((number, text)),
            Err(e) => debug!(page = number, error = %e, "skipping unreadable page"),
        }
    }
    Ok(pages)
}

/// Group classified lines into segments of consecutive equal kind.
fn classify_lines(page: Option<u32>, lines: &[String]) -> Vec<TextSegment> {
    let mut segments: Vec<TextSegment> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let kind = classify_line(trimmed);
        match segments.last_mut() {
            Some(last) if last.kind == kind => {
                last.text.push('\n');
                last.text.push_str(trimmed);
            }
            _ => segments.push(TextSegment::new(page, kind, trimmed)),
        }
    }
    segments
}

/// Classify one line of report text.
///
/// Pure and deliberately simple: tabular layout first, then section
/// headings, then figure-bearing lines, everything else is prose.
pub fn classify_line(line: &str) -> ContentKind {
    if is_tabular(line) {
        return ContentKind::Table;
    }

    let relevant = DATA_PATTERNS.iter().any(|p| p.is_match(line));
    if relevant {
        if HEADING_PATTERN.is_match(line) {
            return ContentKind::Header;
        }
        if line.chars().any(|c| c.is_ascii_digit()) {
            return ContentKind::Data;
        }
    }
    ContentKind::Text
}

/// Tabular layout: explicit separators, or several wide-gap columns
/// carrying at least one figure.
fn is_tabular(line: &str) -> bool {
    if line.contains('|') || line.contains('\t') {
        return true;
    }
    let columns = line.split("  ").filter(|c| !c.trim().is_empty()).count();
    columns >= 3 && line.chars().any(|c| c.is_ascii_digit())
}

/// Minimum long lines before column detection is attempted.
const MIN_COLUMN_SAMPLE: usize = 5;

/// Minimum line length considered for gutter detection.
const MIN_COLUMN_LINE_LEN: usize = 50;

/// Detect a two-column page layout and reflow it into reading order.
///
/// Looks for a vertical run of spaces (a gutter) shared by most long
/// lines in the middle of the page; when found, emits all left-column
/// lines before all right-column lines so unrelated columns are never
/// interleaved. Pages without a consistent gutter pass through unchanged.
pub fn reflow_columns(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    match detect_gutter(&lines) {
        Some(gutter) => {
            let mut left = Vec::new();
            let mut right = Vec::new();
            for line in &lines {
                let chars: Vec<char> = line.chars().collect();
                if chars.len() > gutter {
                    let l: String = chars[..gutter].iter().collect();
                    let r: String = chars[gutter..].iter().collect();
                    if !l.trim().is_empty() {
                        left.push(l.trim_end().to_string());
                    }
                    if !r.trim().is_empty() {
                        right.push(r.trim().to_string());
                    }
                } else if !line.trim().is_empty() {
                    left.push(line.trim_end().to_string());
                }
            }
            left.extend(right);
            left
        }
        None => lines.iter().map(|l| l.to_string()).collect(),
    }
}

/// Find a gutter column shared by at least 80% of long lines.
fn detect_gutter(lines: &[&str]) -> Option<usize> {
    let long: Vec<Vec<char>> = lines
        .iter()
        .filter(|l| l.trim().len() >= MIN_COLUMN_LINE_LEN)
        .map(|l| l.chars().collect())
        .collect();
    if long.len() < MIN_COLUMN_SAMPLE {
        return None;
    }

    let max_len = long.iter().map(|l| l.len()).max()?;
    let lo = max_len / 4;
    let hi = max_len * 3 / 4;

    let mut best: Option<usize> = None;
    for col in lo..hi {
        // A gutter column is blank (with a blank neighbor on each side)
        // in nearly every long line.
        let blank_count = long
            .iter()
            .filter(|chars| {
                let at = |i: usize| chars.get(i).copied().unwrap_or(' ');
                at(col.saturating_sub(1)) == ' ' && at(col) == ' ' && at(col + 1) == ' '
            })
            .count();
        if blank_count * 10 >= long.len() * 8 {
            best = Some(col);
            break;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table_line() {
        assert_eq!(
            classify_line("Scope 1 | 14,390 | 12,346"),
            ContentKind::Table
        );
        assert_eq!(
            classify_line("Scope 1   14,390   12,346   11,897"),
            ContentKind::Table
        );
    }

    #[test]
    fn test_classify_header_line() {
        assert_eq!(
            classify_line("Table 3: GHG emissions by scope"),
            ContentKind::Header
        );
    }

    #[test]
    fn test_classify_data_line() {
        assert_eq!(
            classify_line("Scope 1 emissions were 14,390 metric tons CO2e"),
            ContentKind::Data
        );
    }

    #[test]
    fn test_classify_prose_line() {
        assert_eq!(
            classify_line("We remain committed to reducing our footprint."),
            ContentKind::Text
        );
    }

    #[test]
    fn test_reflow_two_column_page() {
        // Two columns separated by a consistent gutter at ~30 chars.
        let page = "\
Our direct operations consume   Renewable power purchases
fuel across the global fleet    reduced market-based totals
and on-site generation units    across all three regions of
reported in the annual table    operation during the period
for every operating company     covered by this disclosure.
";
        let lines = reflow_columns(page);

        // Left column lines come before any right column line.
        let left_pos = lines
            .iter()
            .position(|l| l.starts_with("Our direct operations"))
            .unwrap();
        let right_pos = lines
            .iter()
            .position(|l| l.starts_with("Renewable power"))
            .unwrap();
        assert!(left_pos < right_pos);
        assert!(lines
            .iter()
            .any(|l| l.starts_with("for every operating company")));
    }

    #[test]
    fn test_reflow_leaves_single_column_alone() {
        let page = "Scope 1 emissions totaled 14,390 metric tons CO2e in fiscal 2024.\nShort line.\n";
        let lines = reflow_columns(page);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("14,390"));
    }

    #[test]
    fn test_classify_lines_groups_consecutive_kinds() {
        let lines = vec![
            "Scope 1 | 14,390".to_string(),
            "Scope 2 | 44,960".to_string(),
            "We remain committed.".to_string(),
        ];
        let segments = classify_lines(Some(7), &lines);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].kind, ContentKind::Table);
        assert!(segments[0].text.contains("Scope 2"));
        assert_eq!(segments[1].kind, ContentKind::Text);
        assert_eq!(segments[0].page, Some(7));
    }
}
