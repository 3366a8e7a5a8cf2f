//! Contract benefit analysis.
//!
//! Walks the `benefits` block of an extracted contract
//! (`{category: {guarantee_id: raw_value}}`), parses every value, derives its
//! slider and aggregates counts. Output maps keep the input's insertion order.

use crate::frontend_config::{build_frontend_config, FrontendConfig};
use crate::guarantee_catalog::GuaranteeCatalog;
use crate::slider::{generate_slider_config, SliderConfig};
use crate::value_parser::{parse_value, ParsedValue, ValueKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Identifies one guarantee inside a contract.
///
/// Serialized as the composite string `"{category}_{guarantee_id}"`; the pair
/// itself is kept so that categories containing underscores are never split
/// in the wrong place. Serialization only: the composite form cannot be split
/// back unambiguously, so reports are not deserializable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliderKey {
    pub category: String,
    pub guarantee_id: String,
}

impl SliderKey {
    pub fn new(category: impl Into<String>, guarantee_id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            guarantee_id: guarantee_id.into(),
        }
    }

    /// Recover a key from its composite form by splitting on the first `_`.
    ///
    /// Only exact for underscore-free categories; the guarantee id keeps any
    /// further underscores.
    pub fn parse(composite: &str) -> Option<Self> {
        composite
            .split_once('_')
            .map(|(category, guarantee_id)| Self::new(category, guarantee_id))
    }
}

impl fmt::Display for SliderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.category, self.guarantee_id)
    }
}

impl Serialize for SliderKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_guarantees: usize,
    pub percentage_count: usize,
    pub euros_count: usize,
    pub unknown_count: usize,
}

impl Summary {
    fn record(&mut self, kind: ValueKind) {
        self.total_guarantees += 1;
        match kind {
            ValueKind::Percentage => self.percentage_count += 1,
            ValueKind::Euros => self.euros_count += 1,
            ValueKind::Unknown => self.unknown_count += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContractAnalysis {
    pub guarantees: IndexMap<String, IndexMap<String, ParsedValue>>,
    pub slider_configs: IndexMap<SliderKey, SliderConfig>,
    pub summary: Summary,
}

/// Header fields of the analyzed contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub insurer: String,
    pub contract_name: String,
    pub level_name: String,
}

/// Full result for one contract: header, analysis and UI configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractReport {
    pub contract_info: ContractInfo,
    pub analysis: ContractAnalysis,
    pub frontend_config: FrontendConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    MissingBenefits,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::MissingBenefits => write!(f, "No benefits found in contract"),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<AnalysisError> for crate::errors::AppError {
    fn from(err: AnalysisError) -> Self {
        crate::errors::AppError::BadRequest(err.to_string())
    }
}

/// Applies the value parser and slider generator over a contract's benefits.
#[derive(Debug, Clone, Copy)]
pub struct GuaranteeAnalyzer<'c> {
    catalog: &'c GuaranteeCatalog,
}

impl Default for GuaranteeAnalyzer<'static> {
    fn default() -> Self {
        Self::new(GuaranteeCatalog::shared())
    }
}

impl<'c> GuaranteeAnalyzer<'c> {
    pub fn new(catalog: &'c GuaranteeCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'c GuaranteeCatalog {
        self.catalog
    }

    /// Analyze every guarantee of every category.
    ///
    /// Categories whose value is not an object are skipped. When two pairs
    /// share a composite id (`a_b`/`c` and `a`/`b_c`) the later slider takes
    /// the earlier one's place, so serialized ids stay unique.
    pub fn analyze_benefits(&self, benefits: &Map<String, Value>) -> ContractAnalysis {
        let mut analysis = ContractAnalysis::default();
        let mut composites: HashMap<String, SliderKey> = HashMap::new();

        for (category, guarantees) in benefits {
            let Some(guarantees) = guarantees.as_object() else {
                tracing::debug!("Skipping non-object benefit category '{}'", category);
                continue;
            };

            let parsed_in_category = analysis.guarantees.entry(category.clone()).or_default();

            for (guarantee_id, raw) in guarantees {
                let parsed = parse_value(&raw_text(raw));
                let slider = generate_slider_config(guarantee_id, &parsed, self.catalog);

                analysis.summary.record(parsed.kind);
                parsed_in_category.insert(guarantee_id.clone(), parsed);

                let key = SliderKey::new(category.clone(), guarantee_id.clone());
                match composites.insert(key.to_string(), key.clone()) {
                    Some(previous) if previous != key => {
                        tracing::warn!(
                            "Slider id '{}' is shared by {}/{} and {}/{}, keeping the latter",
                            key,
                            previous.category,
                            previous.guarantee_id,
                            key.category,
                            key.guarantee_id
                        );
                        match analysis.slider_configs.shift_remove_full(&previous) {
                            Some((index, _, _)) => {
                                analysis.slider_configs.shift_insert(index, key, slider);
                            }
                            None => {
                                analysis.slider_configs.insert(key, slider);
                            }
                        }
                    }
                    _ => {
                        analysis.slider_configs.insert(key, slider);
                    }
                }
            }
        }

        analysis
    }

    pub fn build_frontend_config(&self, analysis: &ContractAnalysis) -> FrontendConfig {
        build_frontend_config(analysis, self.catalog)
    }

    /// Analyze a full contract record.
    ///
    /// Fails only when the record has no `benefits` key. A `benefits` value that
    /// is not an object yields an empty analysis.
    pub fn analyze_contract(&self, contract: &Value) -> Result<ContractReport, AnalysisError> {
        let benefits = contract
            .get("benefits")
            .ok_or(AnalysisError::MissingBenefits)?;

        let analysis = match benefits.as_object() {
            Some(map) => self.analyze_benefits(map),
            None => {
                tracing::warn!("Contract benefits are not an object, nothing to analyze");
                ContractAnalysis::default()
            }
        };
        let frontend_config = self.build_frontend_config(&analysis);

        Ok(ContractReport {
            contract_info: ContractInfo {
                insurer: text_field(contract, "insurer"),
                contract_name: text_field(contract, "contract_name"),
                level_name: text_field(contract, "level_name"),
            },
            analysis,
            frontend_config,
        })
    }
}

/// Analyze an extracted contract with the standard catalog.
pub fn analyze_extracted_contract(contract: &Value) -> Result<ContractReport, AnalysisError> {
    GuaranteeAnalyzer::default().analyze_contract(contract)
}

/// Text form of a raw guarantee value; `null` reads as empty.
fn raw_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_field(contract: &Value, key: &str) -> String {
    contract
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn benefits(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_euros_guarantee() {
        let analysis = GuaranteeAnalyzer::default().analyze_benefits(&benefits(json!({
            "hospitalisation": { "chambre_particuliere": "80€" }
        })));

        assert_eq!(
            analysis.summary,
            Summary {
                total_guarantees: 1,
                percentage_count: 0,
                euros_count: 1,
                unknown_count: 0,
            }
        );
        let slider = &analysis.slider_configs[&SliderKey::new("hospitalisation", "chambre_particuliere")];
        assert_eq!((slider.max, slider.step), (200, 5));
    }

    #[test]
    fn test_skips_non_object_categories() {
        let analysis = GuaranteeAnalyzer::default().analyze_benefits(&benefits(json!({
            "remarques": "voir conditions générales",
            "optique": { "verres_complexes": "300€" },
            "liste": ["a", "b"]
        })));

        assert_eq!(analysis.summary.total_guarantees, 1);
        assert_eq!(analysis.summary.euros_count, 1);
        assert_eq!(analysis.guarantees.len(), 1);
        assert!(analysis.guarantees.contains_key("optique"));
    }

    #[test]
    fn test_null_and_numeric_values() {
        let analysis = GuaranteeAnalyzer::default().analyze_benefits(&benefits(json!({
            "dentaire": { "inlay": null, "prothese": 250 }
        })));

        let dentaire = &analysis.guarantees["dentaire"];
        assert_eq!(dentaire["inlay"].kind, ValueKind::Unknown);
        assert_eq!(dentaire["inlay"].numeric_value, 0.0);
        assert_eq!(dentaire["prothese"].kind, ValueKind::Unknown);
        assert_eq!(dentaire["prothese"].numeric_value, 250.0);
        assert_eq!(analysis.summary.unknown_count, 2);
    }

    #[test]
    fn test_preserves_insertion_order() {
        let analysis = GuaranteeAnalyzer::default().analyze_benefits(&benefits(json!({
            "zeta": { "b": "1%", "a": "2%" },
            "alpha": { "z": "3€" }
        })));

        let keys: Vec<String> = analysis.slider_configs.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["zeta_b", "zeta_a", "alpha_z"]);
    }

    #[test]
    fn test_slider_key_composite_form() {
        let key = SliderKey::new("SOINS_COURANTS", "consultation_generaliste_optam");
        let serialized = serde_json::to_string(&key).unwrap();
        assert_eq!(serialized, "\"SOINS_COURANTS_consultation_generaliste_optam\"");

        let parsed = SliderKey::parse("dentaire_soins_dentaires").unwrap();
        assert_eq!(parsed, SliderKey::new("dentaire", "soins_dentaires"));
        assert!(SliderKey::parse("nounderscore").is_none());

        // underscore categories cannot be recovered from the composite form
        let lossy = SliderKey::parse(&key.to_string()).unwrap();
        assert_eq!(lossy, SliderKey::new("SOINS", "COURANTS_consultation_generaliste_optam"));
        assert_ne!(lossy, key);
    }

    #[test]
    fn test_colliding_composite_ids_stay_unique() {
        let analysis = GuaranteeAnalyzer::default().analyze_benefits(&benefits(json!({
            "a_b": { "c": "100%" },
            "x": { "y": "5€" },
            "a": { "b_c": "40€" }
        })));

        assert_eq!(analysis.summary.total_guarantees, 3);
        assert_eq!(analysis.guarantees["a_b"]["c"].kind, ValueKind::Percentage);

        let keys: Vec<String> = analysis.slider_configs.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a_b_c", "x_y"]);
        let winner = &analysis.slider_configs[&SliderKey::new("a", "b_c")];
        assert_eq!(winner.kind, ValueKind::Euros);

        let serialized = serde_json::to_string(&analysis.slider_configs).unwrap();
        assert_eq!(serialized.matches("\"a_b_c\"").count(), 1);

        let frontend = GuaranteeAnalyzer::default().build_frontend_config(&analysis);
        let ids: Vec<&str> = frontend.sliders.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a_b_c", "x_y"]);
    }

    #[test]
    fn test_missing_benefits() {
        let err = analyze_extracted_contract(&json!({ "insurer": "X" })).unwrap_err();
        assert_eq!(err, AnalysisError::MissingBenefits);
        assert_eq!(err.to_string(), "No benefits found in contract");
    }

    #[test]
    fn test_contract_info_defaults_to_empty() {
        let report = analyze_extracted_contract(&json!({ "benefits": {} })).unwrap();
        assert_eq!(report.contract_info, ContractInfo::default());
        assert_eq!(report.analysis.summary.total_guarantees, 0);
        assert!(report.frontend_config.sliders.is_empty());
    }
}
