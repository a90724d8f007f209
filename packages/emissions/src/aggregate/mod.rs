//! Merging per-chunk findings into one validated emissions record.
//!
//! Values for the same year and scope can appear in several chunks (a
//! summary table plus narrative text, or restated prior years). The
//! aggregator groups by year, resolves material conflicts with a
//! pluggable scorer, applies plausibility flags, and enforces the output
//! invariants.

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::ai::ChunkFindings;
use crate::error::{Result, TrackerError};
use crate::types::{EmissionsRecord, EmissionsValue, SourceDetails, YearRecord};

/// Plausibility range for Scope 1, in metric tons CO2e.
const SCOPE_1_RANGE: (f64, f64) = (100.0, 10_000_000.0);

/// Plausibility range for Scope 2 (either method), in metric tons CO2e.
const SCOPE_2_RANGE: (f64, f64) = (1_000.0, 20_000_000.0);

/// Relative difference beyond which two values for the same year and
/// scope are a material conflict rather than rounding noise.
const CONFLICT_THRESHOLD: f64 = 0.05;

/// One value competing for a year/scope slot, with its provenance.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Normalized value.
    pub value: EmissionsValue,

    /// Index of the chunk it came from.
    pub chunk_index: usize,

    /// First page of that chunk, if known.
    pub page: Option<u32>,

    /// Location the model reported for the chunk's data.
    pub location: Option<String>,

    /// Context the model quoted for the chunk's data.
    pub context: Option<String>,
}

impl Candidate {
    fn context_text(&self) -> String {
        let mut text = String::new();
        if let Some(location) = &self.location {
            text.push_str(location);
            text.push(' ');
        }
        if let Some(context) = &self.context {
            text.push_str(context);
        }
        text
    }
}

/// Decides which of two materially conflicting values wins.
///
/// Higher score wins; ties fall to the earlier chunk, then the earlier
/// page.
pub trait ConflictScorer: Send + Sync {
    /// Score a candidate for the given company.
    fn score(&self, company: &str, candidate: &Candidate) -> i32;
}

/// Default precedence: values whose surrounding context names the
/// company score +2, and context mentioning "total" or "consolidated"
/// scores +1, so company-wide figures beat per-segment ones.
pub struct DefaultScorer;

impl ConflictScorer for DefaultScorer {
    fn score(&self, company: &str, candidate: &Candidate) -> i32 {
        let context = candidate.context_text().to_lowercase();
        let mut score = 0;
        if context.contains(&company.to_lowercase()) {
            score += 2;
        }
        if context.contains("total") || context.contains("consolidated") {
            score += 1;
        }
        score
    }
}

#[derive(Debug, Default)]
struct YearCandidates {
    scope_1: Vec<Candidate>,
    scope_2_market_based: Vec<Candidate>,
    scope_2_location_based: Vec<Candidate>,
}

/// Merges chunk findings into the final record.
pub struct ResultAggregator {
    scorer: Box<dyn ConflictScorer>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    /// Create an aggregator with the default conflict scorer.
    pub fn new() -> Self {
        Self {
            scorer: Box::new(DefaultScorer),
        }
    }

    /// Replace the conflict scorer.
    pub fn with_scorer(mut self, scorer: Box<dyn ConflictScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Merge findings into one validated record.
    ///
    /// Fails with [`TrackerError::NoDataFound`] when no year carries a
    /// single scope value.
    pub fn aggregate(&self, company: &str, findings: &[ChunkFindings]) -> Result<EmissionsRecord> {
        let mut by_year: IndexMap<i32, YearCandidates> = IndexMap::new();

        for finding in findings {
            for partial in &finding.years {
                let slot = by_year.entry(partial.year).or_default();
                for (values, field) in [
                    (&partial.scope_1, &mut slot.scope_1),
                    (&partial.scope_2_market_based, &mut slot.scope_2_market_based),
                    (&partial.scope_2_location_based, &mut slot.scope_2_location_based),
                ] {
                    if let Some(value) = values {
                        field.push(Candidate {
                            value: value.clone(),
                            chunk_index: finding.chunk_index,
                            page: finding.page_hint,
                            location: finding.location.clone(),
                            context: finding.context.clone(),
                        });
                    }
                }
            }
        }

        let mut notes: Vec<String> = Vec::new();
        let mut years: Vec<(YearRecord, Option<Candidate>)> = Vec::new();

        for (year, candidates) in by_year {
            let scope_1 =
                self.resolve(company, year, "scope_1", candidates.scope_1, &mut notes);
            let scope_2_market_based = self.resolve(
                company,
                year,
                "scope_2_market_based",
                candidates.scope_2_market_based,
                &mut notes,
            );
            let scope_2_location_based = self.resolve(
                company,
                year,
                "scope_2_location_based",
                candidates.scope_2_location_based,
                &mut notes,
            );

            // First resolved candidate provides the year's provenance.
            let provenance = scope_1
                .clone()
                .or_else(|| scope_2_market_based.clone())
                .or_else(|| scope_2_location_based.clone());

            let record = YearRecord {
                year,
                scope_1: scope_1.map(|c| apply_plausibility(c.value, SCOPE_1_RANGE)),
                scope_2_market_based: scope_2_market_based
                    .map(|c| apply_plausibility(c.value, SCOPE_2_RANGE)),
                scope_2_location_based: scope_2_location_based
                    .map(|c| apply_plausibility(c.value, SCOPE_2_RANGE)),
            };
            if record.has_any_value() {
                years.push((record, provenance));
            }
        }

        if years.is_empty() {
            return Err(TrackerError::NoDataFound);
        }

        years.sort_by_key(|(record, _)| std::cmp::Reverse(record.year));
        let mut years = years.into_iter();
        let (current_year, provenance) = match years.next() {
            Some(pair) => pair,
            None => return Err(TrackerError::NoDataFound),
        };
        let previous_years: Vec<YearRecord> =
            years.take(2).map(|(record, _)| record).collect();

        let sector = findings.iter().find_map(|f| f.sector.clone());

        let mut context = provenance
            .as_ref()
            .and_then(|c| c.context.clone())
            .unwrap_or_default();
        for note in &notes {
            if !context.is_empty() {
                context.push_str(" | ");
            }
            context.push_str(note);
        }
        let location = provenance
            .as_ref()
            .and_then(|c| c.location.clone())
            .unwrap_or_default();

        info!(
            company = company,
            current_year = current_year.year,
            previous_years = previous_years.len(),
            conflicts = notes.len(),
            "aggregated emissions record"
        );

        Ok(EmissionsRecord {
            company: company.to_string(),
            sector,
            current_year,
            previous_years,
            source_details: SourceDetails { location, context },
            processed_at: Utc::now(),
        })
    }

    /// Pick the winning candidate for one year/scope slot.
    ///
    /// Non-material disagreements (within the conflict threshold) keep
    /// the winner silently; material conflicts record the losing value.
    fn resolve(
        &self,
        company: &str,
        year: i32,
        scope: &str,
        mut candidates: Vec<Candidate>,
        notes: &mut Vec<String>,
    ) -> Option<Candidate> {
        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by_key(|c| {
            (
                std::cmp::Reverse(self.scorer.score(company, c)),
                c.chunk_index,
                c.page.unwrap_or(u32::MAX),
            )
        });
        let winner = candidates.remove(0);

        for loser in &candidates {
            if relative_difference(winner.value.value, loser.value.value) > CONFLICT_THRESHOLD {
                debug!(
                    year = year,
                    scope = scope,
                    kept = winner.value.value,
                    discarded = loser.value.value,
                    "resolved conflicting values"
                );
                notes.push(format!(
                    "{} {}: kept {} over conflicting {}",
                    scope, year, winner.value.value, loser.value.value
                ));
            }
        }

        Some(winner)
    }
}

fn relative_difference(a: f64, b: f64) -> f64 {
    let larger = a.abs().max(b.abs());
    if larger == 0.0 {
        return 0.0;
    }
    (a - b).abs() / larger
}

fn apply_plausibility(value: EmissionsValue, range: (f64, f64)) -> EmissionsValue {
    if value.value < range.0 || value.value > range.1 {
        value.flagged()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::PartialYear;

    fn findings(
        chunk_index: usize,
        year: i32,
        scope_1: Option<f64>,
        context: &str,
    ) -> ChunkFindings {
        ChunkFindings {
            chunk_index,
            page_hint: Some(chunk_index as u32 + 1),
            company: Some("Acme Corp".to_string()),
            sector: Some("Manufacturing".to_string()),
            years: vec![PartialYear {
                year,
                scope_1: scope_1.map(EmissionsValue::new),
                scope_2_market_based: None,
                scope_2_location_based: None,
            }],
            location: Some(format!("page {}", chunk_index + 1)),
            context: Some(context.to_string()),
        }
    }

    #[test]
    fn test_company_consolidated_context_beats_earlier_position() {
        let all = vec![
            findings(0, 2024, Some(500_000.0), "segment operations data"),
            findings(
                1,
                2024,
                Some(100_000.0),
                "Acme Corp consolidated emissions",
            ),
        ];

        let record = ResultAggregator::new().aggregate("Acme Corp", &all).unwrap();
        let scope_1 = record.current_year.scope_1.unwrap();
        assert_eq!(scope_1.value, 100_000.0);
        assert!(record.source_details.context.contains("500000"));
    }

    #[test]
    fn test_tie_falls_to_earlier_chunk() {
        let all = vec![
            findings(2, 2024, Some(900_000.0), "emissions summary"),
            findings(1, 2024, Some(300_000.0), "emissions summary"),
        ];

        let record = ResultAggregator::new().aggregate("Acme Corp", &all).unwrap();
        assert_eq!(record.current_year.scope_1.unwrap().value, 300_000.0);
    }

    #[test]
    fn test_rounding_noise_is_not_a_conflict() {
        let all = vec![
            findings(0, 2024, Some(100_000.0), "summary"),
            findings(1, 2024, Some(101_000.0), "summary"),
        ];

        let record = ResultAggregator::new().aggregate("Acme Corp", &all).unwrap();
        assert_eq!(record.current_year.scope_1.unwrap().value, 100_000.0);
        assert!(!record.source_details.context.contains("kept"));
    }

    #[test]
    fn test_previous_years_capped_and_descending() {
        let all = vec![
            findings(0, 2021, Some(10_000.0), "summary"),
            findings(1, 2024, Some(14_390.0), "summary"),
            findings(2, 2022, Some(11_000.0), "summary"),
            findings(3, 2023, Some(12_346.0), "summary"),
        ];

        let record = ResultAggregator::new().aggregate("Acme Corp", &all).unwrap();
        assert_eq!(record.current_year.year, 2024);
        let previous: Vec<i32> = record.previous_years.iter().map(|y| y.year).collect();
        assert_eq!(previous, vec![2023, 2022]);
        assert!(record.invariants_hold());
    }

    #[test]
    fn test_scopes_merge_across_chunks() {
        let mut with_scope_2 = findings(1, 2024, None, "energy table");
        with_scope_2.years[0].scope_2_market_based = Some(EmissionsValue::new(50_000.0));
        let all = vec![findings(0, 2024, Some(14_390.0), "summary"), with_scope_2];

        let record = ResultAggregator::new().aggregate("Acme Corp", &all).unwrap();
        assert_eq!(record.current_year.scope_1.unwrap().value, 14_390.0);
        assert_eq!(
            record.current_year.scope_2_market_based.unwrap().value,
            50_000.0
        );
    }

    #[test]
    fn test_implausible_values_flagged_not_dropped() {
        let mut tiny = findings(0, 2024, Some(50.0), "summary");
        tiny.years[0].scope_2_market_based = Some(EmissionsValue::new(25_000_000.0));

        let record = ResultAggregator::new().aggregate("Acme Corp", &[tiny]).unwrap();
        let scope_1 = record.current_year.scope_1.unwrap();
        let scope_2 = record.current_year.scope_2_market_based.unwrap();
        assert!(scope_1.out_of_range);
        assert_eq!(scope_1.value, 50.0);
        assert!(scope_2.out_of_range);
    }

    #[test]
    fn test_no_values_is_no_data_found() {
        let result = ResultAggregator::new().aggregate("Acme Corp", &[]);
        assert!(matches!(result, Err(TrackerError::NoDataFound)));
    }

    #[test]
    fn test_custom_scorer_is_honored() {
        struct PreferLargest;
        impl ConflictScorer for PreferLargest {
            fn score(&self, _company: &str, candidate: &Candidate) -> i32 {
                candidate.value.value as i32
            }
        }

        let all = vec![
            findings(0, 2024, Some(100_000.0), "Acme Corp consolidated"),
            findings(1, 2024, Some(500_000.0), "segment"),
        ];

        let record = ResultAggregator::new()
            .with_scorer(Box::new(PreferLargest))
            .aggregate("Acme Corp", &all)
            .unwrap();
        assert_eq!(record.current_year.scope_1.unwrap().value, 500_000.0);
    }
}
