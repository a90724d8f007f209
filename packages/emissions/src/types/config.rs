//! Configuration for the pipeline stages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for document fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Download attempts per URL before moving to fallbacks. Default: 3.
    pub max_attempts: u32,

    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,

    /// Cap on extracted text characters per document. Longer documents
    /// are cut short with the truncation flag set, not failed; the raw
    /// body is still parsed in full (PDFs cannot be byte-truncated and
    /// remain readable). Default: 26 million.
    pub max_extracted_chars: usize,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Try a web-archive snapshot after direct and alternate URLs fail.
    /// Default: true.
    pub archive_fallback: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
            max_extracted_chars: 26_000_000,
            user_agent: "Mozilla/5.0 (compatible; EmissionsBot/1.0)".to_string(),
            archive_fallback: true,
        }
    }
}

impl FetchConfig {
    /// Set the download attempt count.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the extracted-text cap.
    pub fn with_max_extracted_chars(mut self, chars: usize) -> Self {
        self.max_extracted_chars = chars;
        self
    }

    /// Disable the web-archive fallback.
    pub fn without_archive_fallback(mut self) -> Self {
        self.archive_fallback = false;
        self
    }
}

/// Configuration for text segmentation and chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Context lines kept above each keyword anchor. Default: 15.
    pub lines_before: usize,

    /// Context lines kept below each keyword anchor. Default: 15.
    pub lines_after: usize,

    /// Character ceiling per chunk. Default: 30,000.
    pub max_chunk_chars: usize,

    /// How far past the ceiling a chunk may grow to keep a table region
    /// whole. Default: 2,000.
    pub table_slack_chars: usize,

    /// Directory for the windowed-text inspection artifact; `None`
    /// disables writing it.
    pub inspect_dir: Option<PathBuf>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            lines_before: 15,
            lines_after: 15,
            max_chunk_chars: 30_000,
            table_slack_chars: 2_000,
            inspect_dir: None,
        }
    }
}

impl SegmenterConfig {
    /// Set the chunk character ceiling.
    pub fn with_max_chunk_chars(mut self, chars: usize) -> Self {
        self.max_chunk_chars = chars;
        self
    }

    /// Set the context window size (lines above and below).
    pub fn with_context_lines(mut self, before: usize, after: usize) -> Self {
        self.lines_before = before;
        self.lines_after = after;
        self
    }

    /// Set the table slack.
    pub fn with_table_slack(mut self, chars: usize) -> Self {
        self.table_slack_chars = chars;
        self
    }

    /// Write the windowed, deduplicated text into this directory.
    pub fn with_inspect_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inspect_dir = Some(dir.into());
        self
    }
}

/// Configuration for model extraction calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Retry attempts per chunk for retryable model errors. Default: 3.
    pub max_attempts: u32,

    /// Concurrent in-flight chunk calls. Kept conservatively low to
    /// respect provider rate limits. Default: 2.
    pub max_concurrent_chunks: usize,

    /// Sustained model requests per second. Default: 1.
    pub requests_per_second: u32,

    /// Per-call timeout in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_concurrent_chunks: 2,
            requests_per_second: 1,
            timeout_secs: 120,
        }
    }
}

impl ModelConfig {
    /// Set the chunk concurrency bound.
    pub fn with_max_concurrent_chunks(mut self, n: usize) -> Self {
        self.max_concurrent_chunks = n.max(1);
        self
    }

    /// Set the request rate.
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps.max(1);
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Fetch stage settings.
    pub fetch: FetchConfig,

    /// Segmenter settings.
    pub segmenter: SegmenterConfig,

    /// Model stage settings.
    pub model: ModelConfig,

    /// Directory the run artifact is written to; `None` disables
    /// persistence (useful in tests).
    pub output_dir: Option<PathBuf>,
}

impl TrackerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist run artifacts into this directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Replace the segmenter settings.
    pub fn with_segmenter(mut self, segmenter: SegmenterConfig) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Replace the model settings.
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TrackerConfig::default();
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.segmenter.max_chunk_chars, 30_000);
        assert_eq!(config.segmenter.lines_before, 15);
        assert_eq!(config.model.max_concurrent_chunks, 2);
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn test_concurrency_floor_is_one() {
        let config = ModelConfig::default().with_max_concurrent_chunks(0);
        assert_eq!(config.max_concurrent_chunks, 1);
    }
}
