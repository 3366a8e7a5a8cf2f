use crate::analyzer::ContractAnalysis;
use crate::guarantee_catalog::GuaranteeCatalog;
use crate::value_parser::ValueKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One slider as consumed by the form renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderDescriptor {
    pub id: String,
    pub category: String,
    pub guarantee: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub default: f64,
    pub unit: String,
    pub suffix: String,
    pub extracted_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub sliders: Vec<SliderDescriptor>,
    /// Category -> its sliders, categories in first-seen order.
    pub form_structure: IndexMap<String, Vec<SliderDescriptor>>,
    /// Reserved for client-side validation; always empty for now.
    pub validation_rules: Map<String, Value>,
}

/// Flatten an analysis into slider descriptors, plus a per-category grouping.
pub fn build_frontend_config(
    analysis: &ContractAnalysis,
    catalog: &GuaranteeCatalog,
) -> FrontendConfig {
    let mut config = FrontendConfig::default();

    for (key, slider) in &analysis.slider_configs {
        let descriptor = SliderDescriptor {
            id: key.to_string(),
            category: key.category.clone(),
            guarantee: key.guarantee_id.clone(),
            label: catalog.label_for(&key.guarantee_id),
            kind: slider.kind,
            min: slider.min,
            max: slider.max,
            step: slider.step,
            default: slider.default_value,
            unit: slider.unit.clone(),
            suffix: slider.suffix.clone(),
            extracted_value: slider.extracted_display.clone(),
        };

        config
            .form_structure
            .entry(key.category.clone())
            .or_default()
            .push(descriptor.clone());
        config.sliders.push(descriptor);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::GuaranteeAnalyzer;
    use serde_json::json;

    fn analyze(value: Value) -> ContractAnalysis {
        GuaranteeAnalyzer::default().analyze_benefits(value.as_object().unwrap())
    }

    #[test]
    fn test_empty_analysis() {
        let config = build_frontend_config(&ContractAnalysis::default(), GuaranteeCatalog::shared());
        assert!(config.sliders.is_empty());
        assert!(config.form_structure.is_empty());
        assert!(config.validation_rules.is_empty());
    }

    #[test]
    fn test_descriptor_fields() {
        let analysis = analyze(json!({
            "dentaire": { "soins_dentaires": "125 % BR" }
        }));
        let config = build_frontend_config(&analysis, GuaranteeCatalog::shared());

        assert_eq!(config.sliders.len(), 1);
        let slider = &config.sliders[0];
        assert_eq!(slider.id, "dentaire_soins_dentaires");
        assert_eq!(slider.category, "dentaire");
        assert_eq!(slider.guarantee, "soins_dentaires");
        assert_eq!(slider.label, "Soins Dentaires");
        assert_eq!(slider.kind, ValueKind::Percentage);
        assert_eq!((slider.min, slider.max, slider.step), (0, 500, 25));
        assert_eq!(slider.default, 125.0);
        assert_eq!(slider.suffix, "% BR");
        assert_eq!(slider.extracted_value, "125.0% BR");
    }

    #[test]
    fn test_grouping_by_category_keeps_order() {
        let analysis = analyze(json!({
            "HOSPITALISATION": {
                "honoraires_chirurgien_optam": "200 % BR",
                "chambre_particuliere": "60 €"
            },
            "SOINS_COURANTS": {
                "consultation_generaliste_optam": "150 % BR"
            },
            "OPTIQUE": {
                "verres_complexes": "400 €",
                "lentilles_acceptees": "100 €"
            }
        }));
        let config = build_frontend_config(&analysis, GuaranteeCatalog::shared());

        let ids: Vec<&str> = config.sliders.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "HOSPITALISATION_honoraires_chirurgien_optam",
                "HOSPITALISATION_chambre_particuliere",
                "SOINS_COURANTS_consultation_generaliste_optam",
                "OPTIQUE_verres_complexes",
                "OPTIQUE_lentilles_acceptees",
            ]
        );

        let categories: Vec<&str> = config.form_structure.keys().map(|k| k.as_str()).collect();
        assert_eq!(categories, vec!["HOSPITALISATION", "SOINS_COURANTS", "OPTIQUE"]);

        // category with an underscore is kept whole
        let soins = &config.form_structure["SOINS_COURANTS"];
        assert_eq!(soins.len(), 1);
        assert_eq!(soins[0].guarantee, "consultation_generaliste_optam");
        assert_eq!(soins[0].label, "Consultation Généraliste OPTAM");
        assert_eq!((soins[0].max, soins[0].step), (400, 25));

        let optique = &config.form_structure["OPTIQUE"];
        assert_eq!(optique[1].label, "Lentilles Acceptees");
    }
}
