//! Keyword-anchored text segmentation and chunking.
//!
//! Scans extracted report text for emissions keywords, keeps a context
//! window around each hit, deduplicates repeated lines, and packs the
//! result into bounded-size chunks for model input.

mod chunker;

use indexmap::IndexSet;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::types::chunk::TextChunk;
use crate::types::config::SegmenterConfig;
use crate::types::document::{ContentKind, ExtractedText};

pub(crate) use chunker::pack_chunks;

/// Keyword anchors marking emissions-relevant regions (matched
/// case-insensitively).
const ANCHOR_KEYWORDS: &[&str] = &[
    "scope 1",
    "scope 2",
    "greenhouse gas",
    "ghg emissions",
    "co2e",
    "carbon emissions",
];

/// One line of windowed text with its provenance.
#[derive(Debug, Clone)]
pub(crate) struct Line {
    pub page: Option<u32>,
    pub kind: ContentKind,
    pub text: String,
}

/// Splits extracted text into model-sized chunks around keyword anchors.
pub struct TextSegmenter {
    config: SegmenterConfig,
    anchor_pattern: Regex,
}

impl TextSegmenter {
    /// Create a segmenter with the given config.
    pub fn new(config: SegmenterConfig) -> Self {
        let alternation = ANCHOR_KEYWORDS
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let anchor_pattern = Regex::new(&format!("(?i){}", alternation)).unwrap();
        Self {
            config,
            anchor_pattern,
        }
    }

    /// Segment a document into an ordered chunk sequence.
    ///
    /// Never fails: a document without any keyword anchor falls back to
    /// chunking the full deduplicated text, since some reports describe
    /// emissions without the literal keywords.
    pub fn segment(&self, text: &ExtractedText) -> Vec<TextChunk> {
        let lines = dedup_lines(text);
        let anchors: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.anchor_pattern.is_match(&line.text))
            .map(|(i, _)| i)
            .collect();

        let windowed: Vec<Line> = if anchors.is_empty() {
            debug!("no keyword anchors found, falling back to full text");
            lines
        } else {
            window_around(&lines, &anchors, self.config.lines_before, self.config.lines_after)
        };

        self.write_inspection_artifact(&windowed);

        let chunks = pack_chunks(
            &windowed,
            self.config.max_chunk_chars,
            self.config.table_slack_chars,
        );
        info!(
            anchors = anchors.len(),
            lines = windowed.len(),
            chunks = chunks.len(),
            "segmented document"
        );
        chunks
    }

    /// Persist the windowed, deduplicated text for external inspection.
    ///
    /// Best-effort: a write failure is logged, never fatal.
    fn write_inspection_artifact(&self, lines: &[Line]) {
        let Some(dir) = &self.config.inspect_dir else {
            return;
        };
        let joined: String = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let path = dir.join("model_input.txt");
        if let Err(e) = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, joined)) {
            warn!(path = %path.display(), error = %e, "failed to write inspection artifact");
        }
    }
}

/// Remove recurring identical lines (common in repeated table headers),
/// keeping the first occurrence and its provenance. Order-preserving and
/// idempotent.
pub(crate) fn dedup_lines(text: &ExtractedText) -> Vec<Line> {
    let mut seen: IndexSet<String> = IndexSet::new();
    let mut lines = Vec::new();

    for (page, kind, raw) in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            lines.push(Line {
                page,
                kind,
                text: trimmed.to_string(),
            });
        }
    }
    lines
}

/// Keep a window of `before`/`after` lines around each anchor index;
/// overlapping windows merge.
fn window_around(lines: &[Line], anchors: &[usize], before: usize, after: usize) -> Vec<Line> {
    let mut keep = vec![false; lines.len()];
    for &anchor in anchors {
        let start = anchor.saturating_sub(before);
        let end = (anchor + after + 1).min(lines.len());
        for flag in &mut keep[start..end] {
            *flag = true;
        }
    }
    lines
        .iter()
        .zip(keep)
        .filter(|(_, kept)| *kept)
        .map(|(line, _)| line.clone())
        .collect()
}
