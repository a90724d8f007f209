//! Corporate GHG Emissions Extraction Pipeline
//!
//! Finds a company's latest sustainability report on the public web,
//! pulls the text out of the PDF or HTML document, and uses a language
//! model to extract Scope 1 and Scope 2 emissions figures into a
//! validated, canonically-united record.
//!
//! # Design
//!
//! - Trait seams at every external boundary (search, fetch, model) so
//!   each stage is testable in isolation
//! - Pure pipeline stages wired explicitly by the orchestrator, no
//!   global state
//! - One shared retry policy parameterized per call site
//! - Strict parsing of model output against a fixed schema; values
//!   normalized to metric tons CO2e, implausible ones flagged
//!
//! # Usage
//!
//! ```rust,ignore
//! use emissions::{
//!     BraveSearch, ClaudeModel, ContentFetcher, EmissionsTracker, TrackerConfig,
//! };
//!
//! let config = TrackerConfig::new().with_output_dir("./results");
//! let tracker = EmissionsTracker::new(
//!     BraveSearch::from_env()?,
//!     ContentFetcher::new(config.fetch.clone()),
//!     ClaudeModel::from_env()?,
//!     config,
//! );
//!
//! let record = tracker.process("Acme Corp").await?;
//! println!("{}: {:?}", record.company, record.current_year);
//! ```
//!
//! # Modules
//!
//! - [`search`] - Report discovery (search provider trait, locator)
//! - [`fetch`] - Document download and PDF/HTML text extraction
//! - [`segment`] - Keyword windowing, dedup, and chunking
//! - [`ai`] - Model client, prompts, and response normalization
//! - [`aggregate`] - Cross-chunk merging and conflict resolution
//! - [`pipeline`] - The orchestrator and run artifacts
//! - [`testing`] - Mock implementations for testing

pub mod aggregate;
pub mod ai;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod retry;
pub mod search;
pub mod security;
pub mod segment;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use aggregate::{ConflictScorer, ResultAggregator};
pub use ai::{ChunkFindings, ClaudeModel, ExtractionClient, ExtractionModel};
pub use error::{FetchError, ModelError, SearchError, TrackerError};
pub use fetch::{ContentFetcher, DocumentCache, DocumentSource, MemoryCache};
pub use pipeline::EmissionsTracker;
pub use retry::RetryPolicy;
pub use search::{BraveSearch, ReportLocator, SearchProvider};
pub use segment::TextSegmenter;
pub use types::{
    CandidateDocument, EmissionsRecord, EmissionsValue, ExtractedText, FetchConfig, ModelConfig,
    ReportArtifact, SegmenterConfig, SourceDetails, TextChunk, TrackerConfig, YearRecord,
    CANONICAL_UNIT,
};
