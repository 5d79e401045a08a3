//! Habitat assessment duplicates
//!
//! Two assessments of one site on one date are the same assessment entered
//! twice. They are averaged: metrics to one decimal, the total to a whole
//! number, and the grade recomputed from the averaged total.

use crate::classifier::ThresholdClassifier;
use crate::parameters::HABITAT_TOTAL_SCORE;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use swm_common::{Domain, LogContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitatRecord {
    pub site_name: String,
    pub assessment_date: NaiveDate,
    pub year: i32,
    /// Metric values in source column order
    pub metrics: Vec<(String, Option<f64>)>,
    pub total_score: Option<f64>,
    pub grade: Option<String>,
}

pub struct HabitatDuplicateResolver {
    classifier: ThresholdClassifier,
    context: LogContext,
}

impl HabitatDuplicateResolver {
    pub fn new(classifier: ThresholdClassifier, context: LogContext) -> Self {
        Self { classifier, context }
    }

    /// Average same-site, same-date assessments; the merged record takes the first one's position
    pub fn resolve(&self, records: Vec<HabitatRecord>) -> Vec<HabitatRecord> {
        let _guard = self.context.span().enter();

        let mut groups: HashMap<(String, NaiveDate), Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            groups
                .entry((record.site_name.clone(), record.assessment_date))
                .or_default()
                .push(idx);
        }

        let mut merged: HashMap<usize, HabitatRecord> = HashMap::new();
        let mut dropped = vec![false; records.len()];
        for indices in groups.values().filter(|g| g.len() > 1) {
            let group: Vec<&HabitatRecord> = indices.iter().map(|&i| &records[i]).collect();
            merged.insert(indices[0], self.average(&group));
            for &i in indices {
                dropped[i] = true;
            }
        }

        let resolved_groups = merged.len();
        let before = records.len();

        let resolved: Vec<HabitatRecord> = records
            .into_iter()
            .enumerate()
            .filter_map(|(idx, record)| match merged.remove(&idx) {
                Some(average) => Some(average),
                None if dropped[idx] => None,
                None => Some(record),
            })
            .collect();

        if resolved_groups > 0 {
            tracing::info!(
                groups = resolved_groups,
                removed = before - resolved.len(),
                "Averaged duplicate habitat assessments"
            );
        }

        resolved
    }

    fn average(&self, group: &[&HabitatRecord]) -> HabitatRecord {
        let mut averaged = group[0].clone();

        for (name, value) in averaged.metrics.iter_mut() {
            let values = group.iter().filter_map(|r| {
                r.metrics
                    .iter()
                    .find(|(n, _)| n.as_str() == name.as_str())
                    .and_then(|(_, v)| *v)
            });
            *value = mean(values).map(|m| round_to(m, 1));
        }

        averaged.total_score = mean(group.iter().filter_map(|r| r.total_score)).map(|m| round_to(m, 0));

        let grade = self
            .classifier
            .classify(Domain::Habitat, HABITAT_TOTAL_SCORE, averaged.total_score);
        averaged.grade = (!grade.is_unknown()).then_some(grade.status);

        averaged
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Round half to even at `decimals` places
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
