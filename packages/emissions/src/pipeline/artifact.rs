//! Run artifact persistence.
//!
//! One pretty-printed JSON file per successful run, named after the
//! company. Written once and never mutated; failed runs leave nothing.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::types::ReportArtifact;

/// Filesystem-safe name for a company: lowercased, spaces to
/// underscores, everything outside `[a-z0-9._-]` dropped.
pub fn company_slug(company: &str) -> String {
    company
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

/// Path the artifact for `company` lands at under `dir`.
pub fn artifact_path(dir: &Path, company: &str) -> PathBuf {
    dir.join(format!("{}.json", company_slug(company)))
}

/// Write the artifact, creating the directory if needed.
pub async fn write_artifact(dir: &Path, artifact: &ReportArtifact) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = artifact_path(dir, &artifact.record.company);
    let json = serde_json::to_string_pretty(artifact)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&path, json).await?;
    info!(path = %path.display(), "wrote run artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmissionsRecord, EmissionsValue, SourceDetails, YearRecord};
    use chrono::Utc;

    fn sample_artifact() -> ReportArtifact {
        let mut current_year = YearRecord::new(2024);
        current_year.scope_1 = Some(EmissionsValue::new(14_390.0));
        ReportArtifact {
            record: EmissionsRecord {
                company: "Acme Corp".into(),
                sector: None,
                current_year,
                previous_years: vec![],
                source_details: SourceDetails::default(),
                processed_at: Utc::now(),
            },
            report_url: "https://acme.example/esg-2024.pdf".into(),
            report_year: 2024,
        }
    }

    #[test]
    fn test_slug_is_filesystem_safe() {
        assert_eq!(company_slug("Acme Corp"), "acme_corp");
        assert_eq!(company_slug("Smith & Sons, Inc."), "smith__sons_inc.");
        assert_eq!(company_slug("Ø Energy"), "_energy");
    }

    #[tokio::test]
    async fn test_artifact_round_trips_with_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = sample_artifact();

        write_artifact(dir.path(), &artifact).await.unwrap();

        let written = tokio::fs::read_to_string(artifact_path(dir.path(), "Acme Corp"))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        // Flattened record fields sit beside the provenance fields.
        assert_eq!(value["company"], "Acme Corp");
        assert_eq!(value["report_year"], 2024);
        assert_eq!(value["current_year"]["scope_1"]["value"], 14390.0);
    }
}
