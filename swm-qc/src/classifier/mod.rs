//! Threshold classification
//!
//! Turns a numeric result into a status label and display color. The
//! classifier only reads an immutable [`ThresholdRegistry`]; it is cheap to
//! clone and safe to share across request handlers.
//!
//! Lookup order for `(domain, parameter, value)`:
//! 1. missing, NaN or infinite value: `Unknown` / gray
//! 2. configured table for the pair: first band containing the value
//! 3. reference values for the pair: generic range or upper-limit bands
//! 4. otherwise `Unknown` / gray

pub mod builtin;
pub mod palette;
pub mod table;

pub use table::{ClassificationResult, ThresholdBand, ThresholdRegistry, ThresholdTable};

use crate::parameters::ParameterKind;
use std::sync::Arc;
use swm_common::db::ReferenceValues;
use swm_common::Domain;

#[derive(Debug, Clone)]
pub struct ThresholdClassifier {
    registry: Arc<ThresholdRegistry>,
}

impl ThresholdClassifier {
    pub fn new(registry: Arc<ThresholdRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ThresholdRegistry {
        &self.registry
    }

    pub fn classify(&self, domain: Domain, parameter: &str, value: Option<f64>) -> ClassificationResult {
        let Some(value) = usable(value) else {
            return ClassificationResult::unknown();
        };

        if let Some(table) = self.registry.table(domain, parameter) {
            return from_band(table, value);
        }

        match self
            .registry
            .reference(domain, parameter)
            .and_then(builtin::generic_table)
        {
            Some(table) => from_band(&table, value),
            None => {
                tracing::trace!(%domain, parameter, "No thresholds configured");
                ClassificationResult::unknown()
            }
        }
    }

    /// Status label only
    pub fn status(&self, domain: Domain, parameter: &str, value: Option<f64>) -> String {
        self.classify(domain, parameter, value).status
    }
}

/// Classify against explicit reference values, bypassing any registry
///
/// Known kinds use their own band shape (pH acid/alkaline labels, fixed biological
/// bands); anything else uses the generic shape the bounds describe.
pub fn classify_with_reference(
    domain: Domain,
    parameter: &str,
    value: Option<f64>,
    reference: &ReferenceValues,
) -> ClassificationResult {
    let Some(value) = usable(value) else {
        return ClassificationResult::unknown();
    };

    let table = ParameterKind::from_code(domain, parameter)
        .and_then(|kind| kind.band_table(Some(reference)))
        .or_else(|| builtin::generic_table(reference));

    match table {
        Some(table) => from_band(&table, value),
        None => ClassificationResult::unknown(),
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn from_band(table: &ThresholdTable, value: f64) -> ClassificationResult {
    table
        .classify(value)
        .map(|band| ClassificationResult::new(band.status.as_str(), band.color.as_str()))
        .unwrap_or_else(ClassificationResult::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swm_common::db::default_reference_value_set;

    fn classifier() -> ThresholdClassifier {
        ThresholdClassifier::new(Arc::new(ThresholdRegistry::from_reference_values(
            &default_reference_value_set(),
        )))
    }

    #[test]
    fn test_dissolved_oxygen_with_normal_range() {
        let reference = ReferenceValues::normal_range(80.0, 130.0);

        let normal = classify_with_reference(Domain::Chemical, "do_percent", Some(100.0), &reference);
        assert_eq!(normal, ClassificationResult::new("Normal", palette::NORMAL));

        let caution = classify_with_reference(Domain::Chemical, "do_percent", Some(60.0), &reference);
        assert_eq!(caution, ClassificationResult::new("Caution", palette::CAUTION));

        let unknown = classify_with_reference(Domain::Chemical, "do_percent", Some(f64::NAN), &reference);
        assert_eq!(unknown, ClassificationResult::new("Unknown", "gray"));
    }

    #[test]
    fn test_missing_and_malformed_values_are_unknown() {
        let c = classifier();
        for value in [None, Some(f64::NAN), Some(f64::INFINITY), Some(f64::NEG_INFINITY)] {
            let result = c.classify(Domain::Chemical, "pH", value);
            assert!(result.is_unknown(), "{:?} should be unknown", value);
            assert_eq!(result.color, palette::UNKNOWN);
        }
    }

    #[test]
    fn test_configured_tables() {
        let c = classifier();
        assert_eq!(c.status(Domain::Chemical, "pH", Some(5.5)), palette::STATUS_BELOW_NORMAL);
        assert_eq!(c.status(Domain::Chemical, "pH", Some(7.0)), "Normal");
        assert_eq!(c.status(Domain::Chemical, "do_percent", Some(40.0)), "Poor");
        assert_eq!(c.status(Domain::Chemical, "Phosphorus", Some(0.07)), "Caution");
        assert_eq!(c.status(Domain::Chemical, "Chloride", Some(280.0)), "Caution");
        assert_eq!(c.status(Domain::Fish, "comparison_to_reference", Some(0.81)), "Good");
        assert_eq!(
            c.status(Domain::Macro, "comparison_to_reference", Some(0.4)),
            "Moderately Impaired"
        );
        assert_eq!(c.status(Domain::Habitat, "total_score", Some(83.0)), "B");
    }

    #[test]
    fn test_unconfigured_pair_uses_reference_fallback() {
        let mut registry = ThresholdRegistry::empty();
        registry.insert_reference(
            Domain::Chemical,
            "Turbidity",
            ReferenceValues::upper_limits(10.0, 25.0),
        );
        let c = ThresholdClassifier::new(Arc::new(registry));

        assert_eq!(c.status(Domain::Chemical, "Turbidity", Some(5.0)), "Normal");
        assert_eq!(c.status(Domain::Chemical, "Turbidity", Some(30.0)), "Poor");
        // No table and no reference values
        assert!(c.classify(Domain::Chemical, "Conductivity", Some(5.0)).is_unknown());
    }

    #[test]
    fn test_classify_with_empty_reference_is_unknown() {
        let result = classify_with_reference(
            Domain::Chemical,
            "Turbidity",
            Some(3.0),
            &ReferenceValues::default(),
        );
        assert!(result.is_unknown());
    }

    #[test]
    fn test_classify_with_reference_uses_fixed_bio_bands() {
        let result = classify_with_reference(
            Domain::Fish,
            "comparison_to_reference",
            Some(0.99),
            &ReferenceValues::default(),
        );
        assert_eq!(result.status, "Excellent");
    }

    #[test]
    fn test_classifier_is_shareable_across_threads() {
        let c = classifier();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let c = c.clone();
                std::thread::spawn(move || c.status(Domain::Habitat, "total_score", Some(55.0 + 10.0 * i as f64)))
            })
            .collect();
        let statuses: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(statuses, vec!["F", "D", "C", "B"]);
    }
}
