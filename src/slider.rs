use crate::guarantee_catalog::GuaranteeCatalog;
use crate::value_parser::{ParsedValue, ValueKind};
use serde::{Deserialize, Serialize};

/// Numeric input range for one guarantee in the UI.
///
/// `default_value` is the extracted value and is not clamped into
/// `[min, max]`: a large value can sit above an overridden `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderConfig {
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub unit: String,
    pub suffix: String,
    pub default_value: f64,
    pub extracted_display: String,
    pub guarantee_id: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
}

/// Truncating conversion of a positive product, saturating on overflow.
fn scaled(value: f64, factor: f64) -> i64 {
    (value * factor) as i64
}

/// Derive the slider range for a guarantee from its parsed value.
pub fn generate_slider_config(
    guarantee_id: &str,
    parsed: &ParsedValue,
    catalog: &GuaranteeCatalog,
) -> SliderConfig {
    let value = parsed.numeric_value;

    let (min, mut max, mut step, unit, suffix) = match parsed.kind {
        ValueKind::Percentage => {
            let max = if value > 300.0 {
                500_i64.max(scaled(value, 1.2))
            } else {
                500
            };
            (0, max, 25, "%", "% BR")
        }
        ValueKind::Euros => {
            let max = if value > 500.0 {
                1000_i64.max(scaled(value, 1.5))
            } else {
                1000
            };
            (0, max, 10, "€", "€")
        }
        ValueKind::Unknown => {
            let max = if value > 0.0 {
                100_i64.max(scaled(value, 2.0))
            } else {
                100
            };
            (0, max, 1, "", "")
        }
    };

    if let Some(o) = catalog.override_for(guarantee_id, parsed.kind) {
        max = o.max;
        step = o.step;
    }

    SliderConfig {
        min,
        max,
        step,
        unit: unit.to_string(),
        suffix: suffix.to_string(),
        default_value: value,
        extracted_display: parsed.display_text.clone(),
        guarantee_id: guarantee_id.to_string(),
        kind: parsed.kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_parser::parse_value;

    fn generate(id: &str, raw: &str) -> SliderConfig {
        generate_slider_config(id, &parse_value(raw), GuaranteeCatalog::shared())
    }

    #[test]
    fn test_percentage_base_range() {
        let config = generate("soins_dentaires", "125 % BR");
        assert_eq!((config.min, config.max, config.step), (0, 500, 25));
        assert_eq!(config.unit, "%");
        assert_eq!(config.suffix, "% BR");
        assert_eq!(config.default_value, 125.0);
        assert_eq!(config.extracted_display, "125.0% BR");
        assert_eq!(config.guarantee_id, "soins_dentaires");
        assert_eq!(config.kind, ValueKind::Percentage);
    }

    #[test]
    fn test_large_percentage_extends_max() {
        assert_eq!(generate("soins_dentaires", "300%").max, 500);
        assert_eq!(generate("soins_dentaires", "350%").max, 500);
        assert_eq!(generate("soins_dentaires", "450%").max, 540);
        assert_eq!(generate("soins_dentaires", "1000%").max, 1200);
    }

    #[test]
    fn test_large_euros_extends_max() {
        let config = generate("forfait", "400€");
        assert_eq!((config.max, config.step), (1000, 10));
        assert_eq!(generate("forfait", "900€").max, 1350);
    }

    #[test]
    fn test_unknown_range() {
        let config = generate("cures", "3 jours");
        assert_eq!((config.min, config.max, config.step), (0, 100, 1));
        assert_eq!(config.unit, "");
        assert_eq!(generate("cures", "80 jours").max, 160);
        assert_eq!(generate("cures", "non couvert").max, 100);
    }

    #[test]
    fn test_override_beats_scaling() {
        let config = generate("implantologie", "1800€");
        assert_eq!((config.max, config.step), (2000, 50));

        let config = generate("implantologie", "5000€");
        assert_eq!((config.max, config.step), (2000, 50));
        // default is left above max
        assert_eq!(config.default_value, 5000.0);
    }

    #[test]
    fn test_override_keeps_unit_and_suffix() {
        let config = generate("chambre_particuliere", "80€");
        assert_eq!((config.max, config.step), (200, 5));
        assert_eq!(config.unit, "€");
        assert_eq!(config.suffix, "€");
    }

    #[test]
    fn test_override_ignored_for_other_kind() {
        let config = generate("chambre_particuliere", "100%");
        assert_eq!((config.max, config.step), (500, 25));
    }
}
