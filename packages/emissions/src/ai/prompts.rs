//! Prompts for emissions extraction.
//!
//! The output schema is fixed and embedded in the system prompt; the
//! client parses responses strictly against it.

/// System instructions with the exact output schema.
pub const EXTRACT_SYSTEM_PROMPT: &str = r#"You extract greenhouse-gas emissions data from sustainability report text.

Extract the following:
1. The most recent Scope 1 and Scope 2 emissions data, with reporting year and measurement type (market-based or location-based).
2. Scope 1 and Scope 2 data for the previous two years, when present.
3. The context of where the data was found (page, table or section).

Report values exactly as printed, with the unit exactly as printed
(e.g. "metric tons CO2e", "million metric tons CO2e", "kilotons CO2e").
Do not convert units yourself and do not guess missing values: use null
for anything the text does not state.

Return ONLY this JSON format, with no surrounding prose:
{
  "company": "<company name or null>",
  "sector": "<sector or null>",
  "current_year": {
    "year": <YYYY or null>,
    "scope_1": {"value": <number or null>, "unit": "<unit as printed>"},
    "scope_2_market_based": {"value": <number or null>, "unit": "<unit as printed>"},
    "scope_2_location_based": {"value": <number or null>, "unit": "<unit as printed>"}
  },
  "previous_years": [
    {
      "year": <YYYY or null>,
      "scope_1": {"value": <number or null>, "unit": "<unit as printed>"},
      "scope_2_market_based": {"value": <number or null>, "unit": "<unit as printed>"},
      "scope_2_location_based": {"value": <number or null>, "unit": "<unit as printed>"}
    }
  ],
  "source_details": {
    "location": "<where found>",
    "context": "<relevant surrounding text>"
  }
}"#;

/// Follow-up sent once when a response fails schema parsing.
pub const CLARIFY_PROMPT: &str = "Your previous reply was not valid JSON in the required schema. \
Return ONLY the JSON object, exactly in the schema from the instructions: \
no prose, no markdown, no code fences.";

/// Format the per-chunk user prompt.
pub fn format_extract_prompt(company: &str, chunk_text: &str, prior_years: &[i32]) -> String {
    let prior_section = if prior_years.is_empty() {
        String::new()
    } else {
        let years: Vec<String> = prior_years.iter().map(|y| y.to_string()).collect();
        format!(
            "\nYears already captured from other sections: {}. \
             Still report them if this text covers them; data for other years is especially valuable.\n",
            years.join(", ")
        )
    };

    format!(
        "Company: {}\n{}\nReport text to analyze:\n{}",
        company, prior_section, chunk_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_company_and_text() {
        let prompt = format_extract_prompt("Acme Corp", "Scope 1: 14,390", &[]);
        assert!(prompt.contains("Company: Acme Corp"));
        assert!(prompt.contains("Scope 1: 14,390"));
        assert!(!prompt.contains("already captured"));
    }

    #[test]
    fn test_prompt_mentions_prior_years() {
        let prompt = format_extract_prompt("Acme Corp", "text", &[2024, 2023]);
        assert!(prompt.contains("2024, 2023"));
    }

    #[test]
    fn test_system_prompt_pins_schema_fields() {
        for field in [
            "scope_1",
            "scope_2_market_based",
            "scope_2_location_based",
            "previous_years",
            "source_details",
        ] {
            assert!(EXTRACT_SYSTEM_PROMPT.contains(field), "missing {}", field);
        }
    }
}
