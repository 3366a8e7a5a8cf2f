//! Static per-guarantee tables: slider overrides and display labels.
//!
//! Built once and shared, so the slider generator and the frontend builder stay
//! pure functions of their input and this catalog.

use crate::value_parser::ValueKind;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Replacement for the generic `max`/`step` of a slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliderOverride {
    pub max: i64,
    pub step: i64,
}

#[derive(Debug, Clone)]
pub struct GuaranteeCatalog {
    overrides: HashMap<String, HashMap<ValueKind, SliderOverride>>,
    labels: HashMap<String, String>,
}

static SHARED: Lazy<GuaranteeCatalog> = Lazy::new(GuaranteeCatalog::default);

impl GuaranteeCatalog {
    /// Empty catalog: no overrides, every label derived from the id.
    pub fn empty() -> Self {
        Self {
            overrides: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    /// Process-wide catalog with the standard tables.
    pub fn shared() -> &'static GuaranteeCatalog {
        &SHARED
    }

    pub fn with_override(mut self, guarantee_id: &str, kind: ValueKind, max: i64, step: i64) -> Self {
        self.overrides
            .entry(guarantee_id.to_string())
            .or_default()
            .insert(kind, SliderOverride { max, step });
        self
    }

    pub fn with_label(mut self, guarantee_id: &str, label: &str) -> Self {
        self.labels.insert(guarantee_id.to_string(), label.to_string());
        self
    }

    /// Override for an exact guarantee id and value kind, if any.
    pub fn override_for(&self, guarantee_id: &str, kind: ValueKind) -> Option<SliderOverride> {
        self.overrides
            .get(guarantee_id)
            .and_then(|by_kind| by_kind.get(&kind))
            .copied()
    }

    /// Display label for a guarantee id.
    ///
    /// Unmapped ids fall back to underscores replaced by spaces, title-cased.
    pub fn label_for(&self, guarantee_id: &str) -> String {
        match self.labels.get(guarantee_id) {
            Some(label) => label.clone(),
            None => title_case(&guarantee_id.replace('_', " ")),
        }
    }
}

impl Default for GuaranteeCatalog {
    fn default() -> Self {
        Self::empty()
            .with_override("chambre_particuliere", ValueKind::Euros, 200, 5)
            .with_override("honoraires_chirurgien_optam", ValueKind::Percentage, 600, 25)
            .with_override("consultation_generaliste_optam", ValueKind::Percentage, 400, 25)
            .with_override("implantologie", ValueKind::Euros, 2000, 50)
            .with_override("orthodontie", ValueKind::Percentage, 300, 25)
            .with_override("orthodontie", ValueKind::Euros, 1500, 50)
            .with_override("verres_complexes", ValueKind::Euros, 800, 25)
            .with_label("honoraires_chirurgien_optam", "Honoraires Chirurgien OPTAM")
            .with_label("chambre_particuliere", "Chambre Particulière")
            .with_label("consultation_generaliste_optam", "Consultation Généraliste OPTAM")
            .with_label("soins_dentaires", "Soins Dentaires")
            .with_label("implantologie", "Implantologie")
            .with_label("orthodontie", "Orthodontie")
            .with_label("verres_complexes", "Verres Complexes")
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alphabetic = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_alphabetic {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            out.push(c);
            previous_alphabetic = false;
        }
    }
    out
}
