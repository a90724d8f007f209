//! Emissions record types, the pipeline's final output shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The one unit every extracted value is normalized to.
pub const CANONICAL_UNIT: &str = "metric tons CO2e";

/// A single emissions figure in canonical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsValue {
    /// Non-negative value in metric tons CO2e.
    pub value: f64,

    /// Always [`CANONICAL_UNIT`] after normalization.
    pub unit: String,

    /// Set when the value falls outside the plausibility range for its
    /// scope. Flagged values are retained, not dropped; legitimate
    /// outliers exist and the caller decides.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub out_of_range: bool,
}

impl EmissionsValue {
    /// Create a value in canonical units.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            unit: CANONICAL_UNIT.to_string(),
            out_of_range: false,
        }
    }

    /// Mark the value as outside its plausibility range.
    pub fn flagged(mut self) -> Self {
        self.out_of_range = true;
        self
    }
}

/// Scope figures for one reporting year. Any scope may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    /// Reporting year.
    pub year: i32,

    /// Direct emissions from owned/controlled sources.
    pub scope_1: Option<EmissionsValue>,

    /// Purchased-energy emissions, market-based method.
    pub scope_2_market_based: Option<EmissionsValue>,

    /// Purchased-energy emissions, location-based method.
    pub scope_2_location_based: Option<EmissionsValue>,
}

impl YearRecord {
    /// Create an empty record for a year.
    pub fn new(year: i32) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    /// Whether any scope carries a value.
    pub fn has_any_value(&self) -> bool {
        self.scope_1.is_some()
            || self.scope_2_market_based.is_some()
            || self.scope_2_location_based.is_some()
    }
}

/// Where in the report the figures came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDetails {
    /// Page/section description, e.g. "page 47, GHG emissions table".
    pub location: String,

    /// Surrounding narrative, plus any recorded aggregation discrepancies.
    pub context: String,
}

/// Final validated output of one pipeline run.
///
/// Created once per successful run and never mutated after the artifact
/// is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionsRecord {
    /// Company name as given to the pipeline.
    pub company: String,

    /// Sector, when the report states one.
    pub sector: Option<String>,

    /// Most recent reporting year found.
    pub current_year: YearRecord,

    /// Up to two earlier years, most recent first, all strictly below
    /// `current_year.year`.
    pub previous_years: Vec<YearRecord>,

    /// Source attribution.
    pub source_details: SourceDetails,

    /// When the run completed.
    pub processed_at: DateTime<Utc>,
}

impl EmissionsRecord {
    /// Check the record's structural invariants.
    ///
    /// Returns `false` if previous years are not strictly decreasing and
    /// below the current year, if any value is negative or carries a
    /// non-canonical unit, or if the current year has no value at all.
    pub fn invariants_hold(&self) -> bool {
        if !self.current_year.has_any_value() {
            return false;
        }
        if self.previous_years.len() > 2 {
            return false;
        }

        let mut last_year = self.current_year.year;
        for prev in &self.previous_years {
            if prev.year >= last_year {
                return false;
            }
            last_year = prev.year;
        }

        let all_years = std::iter::once(&self.current_year).chain(self.previous_years.iter());
        for year in all_years {
            for value in [
                &year.scope_1,
                &year.scope_2_market_based,
                &year.scope_2_location_based,
            ]
            .into_iter()
            .flatten()
            {
                if value.value < 0.0 || value.unit != CANONICAL_UNIT {
                    return false;
                }
            }
        }
        true
    }
}

/// The persisted JSON artifact: the record plus document provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    #[serde(flatten)]
    pub record: EmissionsRecord,

    /// URL of the report the figures came from.
    pub report_url: String,

    /// The document's nominal reporting year (distinct from the years
    /// inside the record).
    pub report_year: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_years(current: i32, previous: &[i32]) -> EmissionsRecord {
        let mut current_year = YearRecord::new(current);
        current_year.scope_1 = Some(EmissionsValue::new(1000.0));

        EmissionsRecord {
            company: "Acme Corp".into(),
            sector: None,
            current_year,
            previous_years: previous
                .iter()
                .map(|&y| {
                    let mut r = YearRecord::new(y);
                    r.scope_1 = Some(EmissionsValue::new(900.0));
                    r
                })
                .collect(),
            source_details: SourceDetails::default(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_invariants_hold_for_descending_years() {
        assert!(record_with_years(2024, &[2023, 2022]).invariants_hold());
        assert!(record_with_years(2024, &[]).invariants_hold());
    }

    #[test]
    fn test_invariants_reject_bad_year_order() {
        assert!(!record_with_years(2024, &[2024]).invariants_hold());
        assert!(!record_with_years(2024, &[2022, 2023]).invariants_hold());
        assert!(!record_with_years(2024, &[2023, 2023]).invariants_hold());
        assert!(!record_with_years(2024, &[2023, 2022, 2021]).invariants_hold());
    }

    #[test]
    fn test_invariants_reject_empty_current_year() {
        let mut record = record_with_years(2024, &[]);
        record.current_year.scope_1 = None;
        assert!(!record.invariants_hold());
    }

    #[test]
    fn test_invariants_reject_negative_value() {
        let mut record = record_with_years(2024, &[]);
        record.current_year.scope_1 = Some(EmissionsValue {
            value: -5.0,
            unit: CANONICAL_UNIT.into(),
            out_of_range: false,
        });
        assert!(!record.invariants_hold());
    }

    #[test]
    fn test_out_of_range_flag_omitted_when_false() {
        let json = serde_json::to_string(&EmissionsValue::new(100.0)).unwrap();
        assert!(!json.contains("out_of_range"));

        let flagged = serde_json::to_string(&EmissionsValue::new(100.0).flagged()).unwrap();
        assert!(flagged.contains("out_of_range"));
    }

    #[test]
    fn test_artifact_flattens_record() {
        let artifact = ReportArtifact {
            record: record_with_years(2024, &[2023]),
            report_url: "https://acme.com/esg-2024.pdf".into(),
            report_year: 2024,
        };

        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["company"], "Acme Corp");
        assert_eq!(json["report_year"], 2024);
        assert_eq!(json["current_year"]["year"], 2024);
    }
}
