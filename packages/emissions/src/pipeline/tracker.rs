//! The orchestrator: locate, fetch, segment, extract, aggregate,
//! persist.
//!
//! Generic over its collaborators so any stage can be swapped in tests
//! without touching the others. All wiring is explicit; nothing global.

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::aggregate::ResultAggregator;
use crate::ai::{ExtractionClient, ExtractionModel};
use crate::error::{FetchError, ModelError, Result, TrackerError};
use crate::fetch::DocumentSource;
use crate::pipeline::artifact;
use crate::search::{ReportLocator, SearchProvider};
use crate::segment::TextSegmenter;
use crate::types::{EmissionsRecord, ReportArtifact, TrackerConfig};

/// End-to-end emissions pipeline.
pub struct EmissionsTracker<S, D, M>
where
    S: SearchProvider,
    D: DocumentSource,
    M: ExtractionModel,
{
    locator: ReportLocator<S>,
    source: D,
    segmenter: TextSegmenter,
    client: ExtractionClient<M>,
    aggregator: ResultAggregator,
    config: TrackerConfig,
}

impl<S, D, M> EmissionsTracker<S, D, M>
where
    S: SearchProvider,
    D: DocumentSource,
    M: ExtractionModel,
{
    /// Wire a tracker from its collaborators.
    pub fn new(provider: S, source: D, model: M, config: TrackerConfig) -> Self {
        Self {
            locator: ReportLocator::new(provider),
            source,
            segmenter: TextSegmenter::new(config.segmenter.clone()),
            client: ExtractionClient::new(model, config.model.clone()),
            aggregator: ResultAggregator::new(),
            config,
        }
    }

    /// Replace the aggregator (e.g. to install a custom conflict scorer).
    pub fn with_aggregator(mut self, aggregator: ResultAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Run the full pipeline for one company.
    ///
    /// On success the record is returned and, when an output directory
    /// is configured, the artifact is persisted. Every failure maps to
    /// exactly one [`TrackerError`] variant; no artifact is written on
    /// failure.
    pub async fn process(&self, company: &str) -> Result<EmissionsRecord> {
        let run_id = Uuid::now_v7();
        let span = info_span!("emissions_run", run_id = %run_id, company = company);
        self.process_inner(company).instrument(span).await
    }

    async fn process_inner(&self, company: &str) -> Result<EmissionsRecord> {
        let candidate = self.locator.locate(company).await?;
        info!(
            url = %candidate.url,
            score = candidate.relevance_score,
            "located candidate report"
        );

        let text = self
            .source
            .fetch(&candidate.url)
            .await
            .map_err(|e| match e {
                FetchError::UnsupportedFormat { content_type } => {
                    TrackerError::UnsupportedFormat { content_type }
                }
                other => TrackerError::FetchFailed {
                    url: candidate.url.to_string(),
                    source: Box::new(other),
                },
            })?;

        let chunks = self.segmenter.segment(&text);
        info!(
            chunks = chunks.len(),
            truncated = text.truncated,
            "segmented report text"
        );

        let findings = self
            .client
            .extract_all(company, &chunks)
            .await
            .map_err(|e| match e {
                ModelError::Schema(_) | ModelError::Empty => TrackerError::ExtractionFailed,
                other => TrackerError::UpstreamUnavailable(Box::new(other)),
            })?;

        let record = self.aggregator.aggregate(company, &findings)?;

        if let Some(dir) = &self.config.output_dir {
            let report = ReportArtifact {
                record: record.clone(),
                report_url: candidate.url.to_string(),
                report_year: candidate.report_year(),
            };
            artifact::write_artifact(dir, &report).await?;
        }

        Ok(record)
    }
}
