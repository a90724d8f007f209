//! HTML to structured text conversion.
//!
//! Regex-based DOM-text extraction with boilerplate stripped. HTML
//! reports carry no page numbers, so every segment has `page: None`.

use regex::Regex;

use crate::error::{FetchError, FetchResult};
use crate::types::document::{ContentKind, ExtractedText, TextSegment};

/// Convert an HTML document into classified text segments.
///
/// `max_chars` caps the output; hitting it sets the truncation flag.
pub fn extract(html: &str, max_chars: usize) -> FetchResult<ExtractedText> {
    let stripped = strip_boilerplate(html);

    let mut segments = Vec::new();
    let mut total = 0usize;
    let mut truncated = false;

    // Tables first: flatten rows to pipe-separated lines so the
    // segmenter's table handling sees them as one region.
    let table_pattern = Regex::new(r"(?s)<table[^>]*>(.*?)</table>").unwrap();
    let mut remainder = stripped.clone();
    for cap in table_pattern.captures_iter(&stripped) {
        let table_html = cap.get(0).unwrap().as_str();
        let flattened = flatten_table(cap.get(1).unwrap().as_str());
        if !flattened.is_empty() {
            remainder = remainder.replace(table_html, "");
            push_capped(
                &mut segments,
                TextSegment::new(None, ContentKind::Table, flattened),
                max_chars,
                &mut total,
                &mut truncated,
            );
        }
    }

    // Headings become header segments, the rest is prose.
    let heading_pattern = Regex::new(r"(?s)<h[1-4][^>]*>(.*?)</h[1-4]>").unwrap();
    for cap in heading_pattern.captures_iter(&remainder) {
        let text = to_text(cap.get(1).unwrap().as_str());
        if !text.is_empty() {
            push_capped(
                &mut segments,
                TextSegment::new(None, ContentKind::Header, text),
                max_chars,
                &mut total,
                &mut truncated,
            );
        }
    }
    let body = to_text(&heading_pattern.replace_all(&remainder, "").to_string());
    if !body.is_empty() {
        push_capped(
            &mut segments,
            TextSegment::new(None, ContentKind::Text, body),
            max_chars,
            &mut total,
            &mut truncated,
        );
    }

    if segments.is_empty() {
        return Err(FetchError::EmptyDocument {
            url: String::new(),
        });
    }

    Ok(ExtractedText::new(segments).with_truncated(truncated))
}

fn push_capped(
    segments: &mut Vec<TextSegment>,
    mut segment: TextSegment,
    max_chars: usize,
    total: &mut usize,
    truncated: &mut bool,
) {
    if *truncated {
        return;
    }
    let len = segment.text.chars().count();
    if *total + len > max_chars {
        let keep = max_chars.saturating_sub(*total);
        segment.text = segment.text.chars().take(keep).collect();
        *truncated = true;
        if segment.text.trim().is_empty() {
            return;
        }
    }
    *total += segment.text.chars().count();
    segments.push(segment);
}

/// Remove script, style, and navigation boilerplate.
fn strip_boilerplate(html: &str) -> String {
    let mut text = html.to_string();
    for pattern in &[
        r"(?s)<script[^>]*>.*?</script>",
        r"(?s)<style[^>]*>.*?</style>",
        r"(?s)<nav[^>]*>.*?</nav>",
        r"(?s)<header[^>]*>.*?</header>",
        r"(?s)<footer[^>]*>.*?</footer>",
        r"(?s)<!--.*?-->",
    ] {
        let re = Regex::new(pattern).unwrap();
        text = re.replace_all(&text, "").to_string();
    }
    text
}

/// Flatten table rows into pipe-separated lines.
fn flatten_table(table_html: &str) -> String {
    let row_pattern = Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap();
    let cell_pattern = Regex::new(r"(?s)<t[hd][^>]*>(.*?)</t[hd]>").unwrap();

    let mut rows = Vec::new();
    for row_cap in row_pattern.captures_iter(table_html) {
        let cells: Vec<String> = cell_pattern
            .captures_iter(row_cap.get(1).unwrap().as_str())
            .map(|c| to_text(c.get(1).unwrap().as_str()))
            .filter(|c| !c.is_empty())
            .collect();
        if !cells.is_empty() {
            rows.push(cells.join(" | "));
        }
    }
    rows.join("\n")
}

/// Strip remaining tags, decode entities, collapse whitespace.
fn to_text(html: &str) -> String {
    let br_pattern = Regex::new(r"<br\s*/?>").unwrap();
    let p_close = Regex::new(r"</(p|div|li|tr)>").unwrap();
    let tag_pattern = Regex::new(r"<[^>]+>").unwrap();
    let multi_newline = Regex::new(r"\n{3,}").unwrap();
    let spaces = Regex::new(r"[ \t]{2,}").unwrap();

    let mut text = br_pattern.replace_all(html, "\n").to_string();
    text = p_close.replace_all(&text, "\n").to_string();
    text = tag_pattern.replace_all(&text, "").to_string();

    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    text = spaces.replace_all(&text, " ").to_string();
    text = multi_newline.replace_all(&text, "\n\n").to_string();

    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scripts_and_nav() {
        let html = r#"
            <nav>Home | About</nav>
            <script>track();</script>
            <p>Scope 1 emissions were 14,390 metric tons CO2e.</p>
            <footer>Copyright</footer>
        "#;

        let text = extract(html, 10_000).unwrap();
        let all: String = text.segments.iter().map(|s| s.text.as_str()).collect();
        assert!(all.contains("14,390"));
        assert!(!all.contains("track()"));
        assert!(!all.contains("Copyright"));
    }

    #[test]
    fn test_table_flattened_with_separators() {
        let html = r#"
            <h2>GHG Emissions</h2>
            <table>
                <tr><th>Scope</th><th>2024</th><th>2023</th></tr>
                <tr><td>Scope 1</td><td>14,390</td><td>12,346</td></tr>
            </table>
        "#;

        let text = extract(html, 10_000).unwrap();
        let table = text
            .segments
            .iter()
            .find(|s| s.kind == ContentKind::Table)
            .unwrap();
        assert!(table.text.contains("Scope 1 | 14,390 | 12,346"));

        let header = text
            .segments
            .iter()
            .find(|s| s.kind == ContentKind::Header)
            .unwrap();
        assert_eq!(header.text, "GHG Emissions");
    }

    #[test]
    fn test_entity_decoding() {
        let html = "<p>Emissions &amp; energy: 1,200&nbsp;tCO2e</p>";
        let text = extract(html, 10_000).unwrap();
        assert!(text.segments[0].text.contains("Emissions & energy: 1,200 tCO2e"));
    }

    #[test]
    fn test_truncation_flag_set_at_cap() {
        let html = format!("<p>{}</p>", "emissions data ".repeat(1000));
        let text = extract(&html, 100).unwrap();
        assert!(text.truncated);
        let total: usize = text.segments.iter().map(|s| s.text.chars().count()).sum();
        assert!(total <= 100);
    }

    #[test]
    fn test_empty_document_is_an_error() {
        let err = extract("<script>only();</script>", 10_000).unwrap_err();
        assert!(matches!(err, FetchError::EmptyDocument { .. }));
    }
}
