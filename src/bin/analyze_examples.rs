//! Runs the guarantee analyzer over the records of an examples file and logs
//! the parsed values and slider ranges.
//!
//! Usage: `analyze-examples [path]` (defaults to `EXAMPLES_PATH` or `examples.json`).

use contract_comparator::analyzer::{analyze_extracted_contract, AnalysisError};
use serde_json::Value;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("EXAMPLES_PATH").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("examples.json"));

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
    let records: Vec<Value> = serde_json::from_str(&content)?;
    tracing::info!("Loaded {} records from {}", records.len(), path.display());

    let mut failures = 0;
    for raw in &records {
        match describe_record(raw) {
            Ok(lines) => {
                for line in lines {
                    tracing::info!("{}", line);
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ {}: {}", level_id(raw), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} records could not be analyzed", failures, records.len());
    }
    Ok(())
}

/// Header line plus one line per slider for a single record.
///
/// Reads the header from the analyzer's own report so any record the
/// analyzer accepts can be described.
fn describe_record(raw: &Value) -> Result<Vec<String>, AnalysisError> {
    let report = analyze_extracted_contract(raw)?;
    let info = &report.contract_info;
    let summary = &report.analysis.summary;

    let mut lines = vec![format!(
        "✓ [{}] {} / {} / {}: {} guarantees ({} %, {} €, {} unknown)",
        level_id(raw),
        info.insurer,
        info.contract_name,
        info.level_name,
        summary.total_guarantees,
        summary.percentage_count,
        summary.euros_count,
        summary.unknown_count
    )];

    lines.extend(report.frontend_config.sliders.iter().map(|slider| {
        format!(
            "  {}: {} -> {}-{}{} (default {})",
            slider.label, slider.extracted_value, slider.min, slider.max, slider.unit, slider.default
        )
    }));

    Ok(lines)
}

fn level_id(raw: &Value) -> String {
    match raw.get("level_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_records_are_described() {
        let lines = describe_record(&json!({
            "level_id": 7,
            "insurer": null,
            "contract_name": "Santé Plus",
            "benefits": { "OPTIQUE": { "verres_complexes": "300€" } }
        }))
        .unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("✓ [7]  / Santé Plus / : 1 guarantees"));
        assert!(lines[1].starts_with("  Verres Complexes: "));
    }

    #[test]
    fn test_string_benefits_describe_an_empty_report() {
        let lines = describe_record(&json!({ "level_id": "n1", "benefits": "aucune" })).unwrap();
        assert_eq!(lines, vec!["✓ [n1]  /  / : 0 guarantees (0 %, 0 €, 0 unknown)"]);
    }

    #[test]
    fn test_missing_benefits_is_reported() {
        let raw = json!({ "level_id": null, "insurer": "Acme" });
        assert_eq!(describe_record(&raw), Err(AnalysisError::MissingBenefits));
        assert_eq!(level_id(&raw), "?");
    }
}
