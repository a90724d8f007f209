//! Packing windowed lines into bounded-size chunks.
//!
//! Table regions are atomic: a run of consecutive table lines is only
//! split when it cannot fit even with the configured slack past the
//! ceiling. Everything else packs greedily up to the ceiling.

use super::Line;
use crate::types::chunk::TextChunk;
use crate::types::document::ContentKind;

/// A packable unit: one table region or one plain line.
struct Region<'a> {
    lines: Vec<&'a Line>,
    is_table: bool,
    char_len: usize,
}

/// Pack lines into chunks of at most `max_chars`, letting a table
/// region overrun by up to `slack_chars` rather than splitting it.
pub fn pack_chunks(lines: &[Line], max_chars: usize, slack_chars: usize) -> Vec<TextChunk> {
    let regions = build_regions(lines);

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current: Vec<&Line> = Vec::new();
    let mut current_len = 0usize;
    let mut current_table = false;

    let mut flush =
        |current: &mut Vec<&Line>, current_len: &mut usize, current_table: &mut bool, chunks: &mut Vec<TextChunk>| {
            if current.is_empty() {
                return;
            }
            chunks.push(build_chunk(chunks.len(), current, *current_table));
            current.clear();
            *current_len = 0;
            *current_table = false;
        };

    for region in &regions {
        let addition = region.char_len + if current.is_empty() { 0 } else { 1 };
        let fits = current_len + addition <= max_chars;
        let fits_with_slack = current_len + addition <= max_chars + slack_chars;

        if fits || (region.is_table && fits_with_slack) {
            current.extend(&region.lines);
            current_len += addition;
            current_table |= region.is_table;
            continue;
        }

        flush(&mut current, &mut current_len, &mut current_table, &mut chunks);

        if region.char_len <= max_chars || (region.is_table && region.char_len <= max_chars + slack_chars)
        {
            current.extend(&region.lines);
            current_len = region.char_len;
            current_table = region.is_table;
        } else {
            // Region larger than ceiling + slack: splitting is unavoidable.
            for line in &region.lines {
                let line_len = line.text.chars().count() + if current.is_empty() { 0 } else { 1 };
                if current_len + line_len > max_chars && !current.is_empty() {
                    flush(&mut current, &mut current_len, &mut current_table, &mut chunks);
                }
                current_len += line.text.chars().count() + if current.is_empty() { 0 } else { 1 };
                current.push(line);
                current_table |= region.is_table;
            }
        }
    }

    flush(&mut current, &mut current_len, &mut current_table, &mut chunks);
    chunks
}

/// Group consecutive table lines into atomic regions; every other line
/// is its own region.
fn build_regions(lines: &[Line]) -> Vec<Region<'_>> {
    let mut regions: Vec<Region<'_>> = Vec::new();

    for line in lines {
        let is_table = line.kind == ContentKind::Table;
        let line_len = line.text.chars().count();

        match regions.last_mut() {
            Some(last) if last.is_table && is_table => {
                last.lines.push(line);
                last.char_len += line_len + 1; // joining newline
            }
            _ => regions.push(Region {
                lines: vec![line],
                is_table,
                char_len: line_len,
            }),
        }
    }
    regions
}

fn build_chunk(index: usize, lines: &[&Line], has_table: bool) -> TextChunk {
    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut pages = Vec::new();
    for line in lines {
        if let Some(page) = line.page {
            if pages.last() != Some(&page) {
                pages.push(page);
            }
        }
    }

    let mut chunk = TextChunk::new(index, text).with_pages(pages);
    if has_table {
        chunk = chunk.with_table();
    }
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(kind: ContentKind, text: &str) -> Line {
        Line {
            page: Some(1),
            kind,
            text: text.to_string(),
        }
    }

    fn text_lines(n: usize, len: usize) -> Vec<Line> {
        (0..n)
            .map(|i| line(ContentKind::Text, &format!("{:0>width$}", i, width = len)))
            .collect()
    }

    #[test]
    fn test_packs_under_ceiling() {
        let lines = text_lines(10, 99); // 10 lines of 99 chars + newlines
        let chunks = pack_chunks(&lines, 500, 50);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.char_len <= 500);
        }
        // Nothing lost.
        let total_lines: usize = chunks.iter().map(|c| c.text.lines().count()).sum();
        assert_eq!(total_lines, 10);
    }

    #[test]
    fn test_table_region_not_split_within_slack() {
        // 800 chars of prose, then a table region of exactly the ceiling.
        let mut lines = text_lines(4, 99);
        for i in 0..5 {
            lines.push(line(
                ContentKind::Table,
                &format!("row {:<95}", i), // 99 chars each
            ));
        }
        // Table region: 5 * 99 + 4 newlines = 499 chars, ceiling 500.
        let chunks = pack_chunks(&lines, 500, 100);

        let table_chunks: Vec<_> = chunks.iter().filter(|c| c.has_table).collect();
        assert_eq!(table_chunks.len(), 1, "table region was split");
        assert_eq!(table_chunks[0].text.lines().count(), 5);
    }

    #[test]
    fn test_table_at_exact_ceiling_not_split() {
        // A lone table region sized exactly at the ceiling.
        let rows = 5;
        let row_len = 100;
        let lines: Vec<Line> = (0..rows)
            .map(|i| line(ContentKind::Table, &format!("{:<width$}", i, width = row_len)))
            .collect();
        let region_len = rows * row_len + (rows - 1); // 504

        let chunks = pack_chunks(&lines, region_len, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_len, region_len);
    }

    #[test]
    fn test_oversized_table_finally_splits() {
        let lines: Vec<Line> = (0..50)
            .map(|i| line(ContentKind::Table, &format!("{:<99}", i)))
            .collect();
        let chunks = pack_chunks(&lines, 500, 100);

        assert!(chunks.len() > 1);
        let total_lines: usize = chunks.iter().map(|c| c.text.lines().count()).sum();
        assert_eq!(total_lines, 50);
    }

    #[test]
    fn test_chunk_indices_and_pages() {
        let mut lines = text_lines(3, 200);
        lines[1].page = Some(2);
        lines[2].page = Some(2);
        let chunks = pack_chunks(&lines, 250, 0);

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert_eq!(chunks[1].pages, vec![2]);
    }
}
