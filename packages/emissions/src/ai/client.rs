//! Per-chunk extraction client: prompting, strict parsing, unit
//! normalization, and bounded-parallel dispatch across chunks.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ai::model::ExtractionModel;
use crate::ai::prompts::{format_extract_prompt, CLARIFY_PROMPT, EXTRACT_SYSTEM_PROMPT};
use crate::error::{ModelError, ModelResult};
use crate::retry::RetryPolicy;
use crate::types::{EmissionsValue, ModelConfig, TextChunk};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// What one chunk yielded after parsing and normalization.
#[derive(Debug, Clone)]
pub struct ChunkFindings {
    /// Index of the source chunk.
    pub chunk_index: usize,

    /// First page contributing to the source chunk, if known.
    pub page_hint: Option<u32>,

    /// Company name as the model read it from the text.
    pub company: Option<String>,

    /// Sector, when stated.
    pub sector: Option<String>,

    /// Per-year values in canonical units.
    pub years: Vec<PartialYear>,

    /// Where in the report the model says the data sits.
    pub location: Option<String>,

    /// Surrounding text the model quoted.
    pub context: Option<String>,
}

/// One year's normalized values from a single chunk. Aggregation merges
/// these across chunks; any scope may be absent.
#[derive(Debug, Clone)]
pub struct PartialYear {
    pub year: i32,
    pub scope_1: Option<EmissionsValue>,
    pub scope_2_market_based: Option<EmissionsValue>,
    pub scope_2_location_based: Option<EmissionsValue>,
}

impl PartialYear {
    fn has_any_value(&self) -> bool {
        self.scope_1.is_some()
            || self.scope_2_market_based.is_some()
            || self.scope_2_location_based.is_some()
    }
}

// Raw response shape, exactly as the system prompt pins it. Parsed
// strictly; anything off-schema is a schema error, not a silent default.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelResponse {
    pub company: Option<String>,
    pub sector: Option<String>,
    pub current_year: Option<RawYear>,
    #[serde(default)]
    pub previous_years: Vec<RawYear>,
    pub source_details: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawYear {
    pub year: Option<i32>,
    pub scope_1: Option<RawValue>,
    pub scope_2_market_based: Option<RawValue>,
    pub scope_2_location_based: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawValue {
    pub value: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSource {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Parse a model reply into the fixed response shape.
///
/// Tolerates surrounding prose and markdown fences by slicing from the
/// first `{` to the last `}` before parsing; the JSON itself is parsed
/// strictly.
pub(crate) fn parse_response(raw: &str) -> ModelResult<ModelResponse> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => raw,
    };
    serde_json::from_str(body).map_err(ModelError::Schema)
}

/// Multiplier converting a printed unit into metric tons CO2e.
///
/// Substring match over the lowercased unit, most specific first so
/// "million metric tons" never matches the bare "metric tons" rule.
/// Unknown units return `None` and the value is dropped.
pub(crate) fn unit_factor(unit: &str) -> Option<f64> {
    let unit = unit.to_lowercase();
    if unit.contains("million metric ton") || unit.contains("million tonne") {
        Some(1_000_000.0)
    } else if unit.contains("kiloton") || unit.contains("ktco2") || unit.contains("kt ") {
        Some(1_000.0)
    } else if unit.contains("short ton") {
        Some(0.907_185)
    } else if unit.contains("kilogram") || unit.contains("kg") {
        Some(0.001)
    } else if unit.contains("metric ton")
        || unit.contains("tonne")
        || unit.contains("tco2")
        || unit.contains("mtco2")
        || unit.contains("t co2")
    {
        Some(1.0)
    } else {
        None
    }
}

/// Normalize one raw value into canonical units.
///
/// Drops values with a missing or unrecognized unit, and negative
/// values, logging the reason.
fn normalize_value(raw: &RawValue, field: &str) -> Option<EmissionsValue> {
    let value = raw.value?;
    let unit = raw.unit.as_deref()?;

    if value < 0.0 {
        warn!(field = field, value = value, "dropping negative emissions value");
        return None;
    }

    match unit_factor(unit) {
        Some(factor) => Some(EmissionsValue::new(value * factor)),
        None => {
            warn!(field = field, unit = unit, "dropping value with unrecognized unit");
            None
        }
    }
}

fn normalize_year(raw: &RawYear) -> Option<PartialYear> {
    let year = raw.year?;
    let partial = PartialYear {
        year,
        scope_1: raw.scope_1.as_ref().and_then(|v| normalize_value(v, "scope_1")),
        scope_2_market_based: raw
            .scope_2_market_based
            .as_ref()
            .and_then(|v| normalize_value(v, "scope_2_market_based")),
        scope_2_location_based: raw
            .scope_2_location_based
            .as_ref()
            .and_then(|v| normalize_value(v, "scope_2_location_based")),
    };
    partial.has_any_value().then_some(partial)
}

/// Turn a parsed response into findings for one chunk.
///
/// Returns `None` when no year carried a usable value.
fn into_findings(response: ModelResponse, chunk: &TextChunk) -> Option<ChunkFindings> {
    let mut years: Vec<PartialYear> = Vec::new();
    if let Some(current) = &response.current_year {
        years.extend(normalize_year(current));
    }
    for previous in &response.previous_years {
        years.extend(normalize_year(previous));
    }

    if years.is_empty() {
        return None;
    }

    let (location, context) = match response.source_details {
        Some(source) => (source.location, source.context),
        None => (None, None),
    };

    Some(ChunkFindings {
        chunk_index: chunk.index,
        page_hint: chunk.page_hint(),
        company: response.company,
        sector: response.sector,
        years,
        location,
        context,
    })
}

/// Extraction client driving the model across report chunks.
///
/// Each chunk gets one prompt; transport failures retry with backoff,
/// schema failures get one clarification follow-up, and calls are paced
/// by a shared rate limiter with bounded concurrency across chunks.
pub struct ExtractionClient<M: ExtractionModel> {
    model: M,
    config: ModelConfig,
    retry: RetryPolicy,
    limiter: Arc<DefaultRateLimiter>,
}

impl<M: ExtractionModel> ExtractionClient<M> {
    /// Create a client over a model.
    pub fn new(model: M, config: ModelConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(nonzero!(1u32)),
        );
        let retry = RetryPolicy::new(config.max_attempts);
        Self {
            model,
            config,
            retry,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One paced, retried, time-bounded model call.
    ///
    /// A call exceeding the configured timeout fails with
    /// [`ModelError::Timeout`], which is retryable; a chunk whose calls
    /// keep timing out ends up skipped by [`Self::extract_all`].
    async fn call_model(&self, user_prompt: &str) -> ModelResult<String> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        self.limiter.until_ready().await;
        self.retry
            .run(
                || async {
                    match tokio::time::timeout(
                        timeout,
                        self.model.generate(EXTRACT_SYSTEM_PROMPT, user_prompt),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ModelError::Timeout),
                    }
                },
                ModelError::is_retryable,
            )
            .await
    }

    /// Run extraction on one chunk.
    ///
    /// Returns `Ok(None)` when the model replied validly but the text
    /// holds no usable emissions data. A reply that fails schema parsing
    /// twice (original plus one clarification) is an error.
    pub async fn extract_chunk(
        &self,
        company: &str,
        chunk: &TextChunk,
        prior_years: &[i32],
    ) -> ModelResult<Option<ChunkFindings>> {
        let user_prompt = format_extract_prompt(company, &chunk.text, prior_years);

        let raw = self.call_model(&user_prompt).await?;

        let response = match parse_response(&raw) {
            Ok(response) => response,
            Err(first_err) => {
                debug!(
                    chunk = chunk.index,
                    error = %first_err,
                    "schema parse failed, sending clarification"
                );
                let clarify_prompt = format!("{}\n\n{}", user_prompt, CLARIFY_PROMPT);
                let raw = self.call_model(&clarify_prompt).await?;
                parse_response(&raw)?
            }
        };

        Ok(into_findings(response, chunk))
    }

    /// Run extraction across all chunks with bounded concurrency.
    ///
    /// Chunks that persistently fail are skipped with a warning; the call
    /// errors only when every chunk failed. Years found by finished
    /// chunks are fed into later prompts so the model prioritizes years
    /// not yet covered.
    pub async fn extract_all(
        &self,
        company: &str,
        chunks: &[TextChunk],
    ) -> ModelResult<Vec<ChunkFindings>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let seen_years: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));

        let results: Vec<ModelResult<Option<ChunkFindings>>> = stream::iter(chunks)
            .map(|chunk| {
                let seen_years = Arc::clone(&seen_years);
                async move {
                    let prior = seen_years.lock().await.clone();
                    let result = self.extract_chunk(company, chunk, &prior).await;
                    if let Ok(Some(findings)) = &result {
                        let mut seen = seen_years.lock().await;
                        for partial in &findings.years {
                            if !seen.contains(&partial.year) {
                                seen.push(partial.year);
                            }
                        }
                    }
                    result
                }
            })
            .buffer_unordered(self.config.max_concurrent_chunks.max(1))
            .collect()
            .await;

        let mut findings = Vec::new();
        let mut clean_replies = 0usize;
        let mut last_error = None;
        for result in results {
            match result {
                Ok(Some(f)) => {
                    clean_replies += 1;
                    findings.push(f);
                }
                Ok(None) => clean_replies += 1,
                Err(e) => {
                    warn!(error = %e, "skipping chunk after persistent model failure");
                    last_error = Some(e);
                }
            }
        }

        // An empty result is legitimate when at least one chunk parsed
        // cleanly; if every chunk failed, surface the failure.
        if clean_replies == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        findings.sort_by_key(|f| f.chunk_index);
        Ok(findings)
    }
}
