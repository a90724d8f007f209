//! Data types for the emissions pipeline.

pub mod chunk;
pub mod config;
pub mod document;
pub mod emissions;

pub use chunk::TextChunk;
pub use config::{FetchConfig, ModelConfig, SegmenterConfig, TrackerConfig};
pub use document::{CandidateDocument, ContentKind, ExtractedText, TextSegment};
pub use emissions::{
    EmissionsRecord, EmissionsValue, ReportArtifact, SourceDetails, YearRecord, CANONICAL_UNIT,
};
