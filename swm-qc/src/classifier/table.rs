//! Threshold bands, tables and the registry keyed by (domain, parameter)

use super::palette;
use crate::parameters::ParameterKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use swm_common::db::{ReferenceValueSet, ReferenceValues};
use swm_common::Domain;

/// Status and display color for one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub status: String,
    pub color: String,
}

impl ClassificationResult {
    pub fn new(status: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            color: color.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(palette::STATUS_UNKNOWN, palette::UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.status == palette::STATUS_UNKNOWN
    }
}

/// Half-open interval `[lower, upper)` mapped to a status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub lower: f64,
    pub upper: f64,
    pub status: String,
    pub color: String,
}

impl ThresholdBand {
    pub fn new(lower: f64, upper: f64, status: &str, color: &str) -> Self {
        Self {
            lower,
            upper,
            status: status.to_string(),
            color: color.to_string(),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value < self.upper
    }
}

/// Ordered bands for one parameter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdTable {
    bands: Vec<ThresholdBand>,
}

impl ThresholdTable {
    pub fn new(bands: Vec<ThresholdBand>) -> Self {
        Self { bands }
    }

    /// Build a table from ascending cut points: `labels.len()` must be `cuts.len() + 1`
    ///
    /// `cuts = [a, b]` yields `(-inf, a)`, `[a, b)`, `[b, inf)`.
    pub fn from_cuts(cuts: &[f64], labels: &[(&str, &str)]) -> Self {
        debug_assert_eq!(labels.len(), cuts.len() + 1);
        let mut bounds = Vec::with_capacity(cuts.len() + 2);
        bounds.push(f64::NEG_INFINITY);
        bounds.extend_from_slice(cuts);
        bounds.push(f64::INFINITY);

        let bands = bounds
            .windows(2)
            .zip(labels)
            .map(|(w, (status, color))| ThresholdBand::new(w[0], w[1], status, color))
            .collect();
        Self { bands }
    }

    pub fn bands(&self) -> &[ThresholdBand] {
        &self.bands
    }

    /// First band containing the value
    pub fn classify(&self, value: f64) -> Option<&ThresholdBand> {
        self.bands.iter().find(|band| band.contains(value))
    }

    /// Bands are contiguous and cover `(-inf, inf)`
    pub fn is_exhaustive(&self) -> bool {
        let (Some(first), Some(last)) = (self.bands.first(), self.bands.last()) else {
            return false;
        };
        first.lower == f64::NEG_INFINITY
            && last.upper == f64::INFINITY
            && self.bands.windows(2).all(|w| w[0].upper == w[1].lower)
            && self.bands.iter().all(|b| b.lower < b.upper)
    }

    /// Status labels in band order (legend text)
    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.bands.iter().map(|b| b.status.as_str())
    }
}

/// All configured tables plus the reference values behind the fallback path
///
/// Built once per process and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ThresholdRegistry {
    tables: BTreeMap<(Domain, String), ThresholdTable>,
    reference: BTreeMap<(Domain, String), ReferenceValues>,
}

impl ThresholdRegistry {
    /// Empty registry: every lookup falls through to `Unknown`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fixed biological/habitat tables and chemical tables derived from `reference`
    ///
    /// Chemical parameters with no known kind, or whose reference values lack the
    /// bounds their kind needs, are left to the generic fallback.
    pub fn from_reference_values(reference: &ReferenceValueSet) -> Self {
        let mut registry = Self::empty();

        for kind in [
            ParameterKind::FishIbi,
            ParameterKind::MacroBioassessment,
            ParameterKind::Habitat,
        ] {
            if let Some(table) = kind.band_table(None) {
                registry.insert(kind.domain(), bio_code(kind), table);
            }
        }

        for (code, values) in reference {
            registry
                .reference
                .insert((Domain::Chemical, code.clone()), values.clone());

            if let Some(table) =
                ParameterKind::chemical(code).and_then(|kind| kind.band_table(Some(values)))
            {
                registry.insert(Domain::Chemical, code, table);
            }
        }

        registry
    }

    /// Register or replace the table for a parameter
    pub fn insert(&mut self, domain: Domain, parameter: &str, table: ThresholdTable) {
        self.tables.insert((domain, parameter.to_string()), table);
    }

    /// Register reference values without an explicit table
    pub fn insert_reference(&mut self, domain: Domain, parameter: &str, values: ReferenceValues) {
        self.reference.insert((domain, parameter.to_string()), values);
    }

    pub fn table(&self, domain: Domain, parameter: &str) -> Option<&ThresholdTable> {
        self.tables.get(&(domain, parameter.to_string()))
    }

    pub fn reference(&self, domain: Domain, parameter: &str) -> Option<&ReferenceValues> {
        self.reference.get(&(domain, parameter.to_string()))
    }

    /// Configured (domain, parameter) pairs
    pub fn parameters(&self) -> impl Iterator<Item = (Domain, &str)> {
        self.tables.keys().map(|(d, p)| (*d, p.as_str()))
    }
}

fn bio_code(kind: ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Habitat => crate::parameters::HABITAT_TOTAL_SCORE,
        _ => crate::parameters::COMPARISON_TO_REFERENCE,
    }
}
