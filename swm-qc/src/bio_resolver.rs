//! Biological duplicate resolution
//!
//! Fish and macroinvertebrate submissions sometimes contain several samples for
//! the same site and year. When the field-work log confirms replicate visits the
//! samples are kept and given the logged visit dates; otherwise they are the
//! same sample entered twice and collapse into one averaged record.

use crate::field_log::FieldLogMatcher;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use swm_common::LogContext;

/// One fish or macroinvertebrate sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioRecord {
    pub sample_id: String,
    pub site_name: String,
    pub year: i32,
    pub collection_date: Option<NaiveDate>,
    /// Macro only
    pub season: Option<String>,
    /// Macro only
    pub habitat: Option<String>,
    pub comparison_to_reference: Option<f64>,
    pub total_score: Option<f64>,
    /// Integrity class (fish) or biological condition (macro)
    pub class_label: Option<String>,
    /// Per-metric scores in source column order
    pub metric_scores: Vec<(String, Option<f64>)>,
}

impl BioRecord {
    pub fn new(sample_id: impl Into<String>, site_name: impl Into<String>, year: i32) -> Self {
        Self {
            sample_id: sample_id.into(),
            site_name: site_name.into(),
            year,
            collection_date: None,
            season: None,
            habitat: None,
            comparison_to_reference: None,
            total_score: None,
            class_label: None,
            metric_scores: Vec::new(),
        }
    }

    fn group_key(&self) -> GroupKey {
        (
            self.site_name.clone(),
            self.year,
            self.season.clone(),
            self.habitat.clone(),
        )
    }
}

type GroupKey = (String, i32, Option<String>, Option<String>);

/// Per-run counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub replicate_groups: usize,
    pub collapsed_groups: usize,
    pub dates_assigned: usize,
}

pub struct BiologicalDuplicateResolver<'a> {
    field_log: &'a FieldLogMatcher,
    context: LogContext,
}

impl<'a> BiologicalDuplicateResolver<'a> {
    pub fn new(field_log: &'a FieldLogMatcher, context: LogContext) -> Self {
        Self { field_log, context }
    }

    /// Resolve duplicates, keeping input order
    ///
    /// A collapsed group takes the position of its first record.
    pub fn resolve(&self, records: Vec<BioRecord>) -> Vec<BioRecord> {
        self.resolve_with_stats(records).0
    }

    pub fn resolve_with_stats(&self, mut records: Vec<BioRecord>) -> (Vec<BioRecord>, ResolutionStats) {
        let _guard = self.context.span().enter();
        let mut stats = ResolutionStats::default();

        let mut groups: HashMap<GroupKey, Vec<usize>> = HashMap::new();
        let mut group_order: Vec<GroupKey> = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            let key = record.group_key();
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    group_order.push(key);
                    Vec::new()
                })
                .push(idx);
        }

        // Index of the first record -> the record replacing the whole group
        let mut collapsed: HashMap<usize, BioRecord> = HashMap::new();
        let mut dropped = vec![false; records.len()];

        for key in &group_order {
            let indices = &groups[key];
            if indices.len() < 2 {
                continue;
            }

            let (site_name, year, _, _) = key;
            let verdict = self.field_log.match_site(site_name, *year);

            if verdict.is_replicate {
                stats.replicate_groups += 1;
                stats.dates_assigned += assign_dates(&mut records, indices, &verdict.dates);
                tracing::debug!(
                    site = %site_name,
                    year,
                    samples = indices.len(),
                    log_dates = verdict.dates.len(),
                    "Kept replicate samples"
                );
            } else {
                stats.collapsed_groups += 1;
                let group: Vec<&BioRecord> = indices.iter().map(|&i| &records[i]).collect();
                collapsed.insert(indices[0], collapse(&group));
                for &i in indices {
                    dropped[i] = true;
                }
                tracing::debug!(
                    site = %site_name,
                    year,
                    samples = indices.len(),
                    "Averaged duplicate samples"
                );
            }
        }

        let resolved: Vec<BioRecord> = records
            .into_iter()
            .enumerate()
            .filter_map(|(idx, record)| match collapsed.remove(&idx) {
                Some(merged) => Some(merged),
                None if dropped[idx] => None,
                None => Some(record),
            })
            .collect();

        if stats.replicate_groups + stats.collapsed_groups > 0 {
            tracing::info!(
                replicate_groups = stats.replicate_groups,
                collapsed_groups = stats.collapsed_groups,
                dates_assigned = stats.dates_assigned,
                "Resolved biological duplicates"
            );
        }

        (resolved, stats)
    }
}

/// Give log dates to group members in `(collection_date, sample_id)` order
///
/// Members beyond the number of log dates keep their own dates.
fn assign_dates(records: &mut [BioRecord], indices: &[usize], dates: &[NaiveDate]) -> usize {
    let mut ordered = indices.to_vec();
    ordered.sort_by(|&a, &b| {
        (records[a].collection_date, &records[a].sample_id)
            .cmp(&(records[b].collection_date, &records[b].sample_id))
    });

    let mut assigned = 0;
    for (&idx, &date) in ordered.iter().zip(dates) {
        let record = &mut records[idx];
        record.collection_date = Some(date);
        record.year = date.year();
        assigned += 1;
    }
    assigned
}

/// Average the reference ratio and clear component scores
fn collapse(group: &[&BioRecord]) -> BioRecord {
    let mut merged = group[0].clone();

    let values: Vec<f64> = group
        .iter()
        .filter_map(|r| r.comparison_to_reference)
        .filter(|v| !v.is_nan())
        .collect();
    merged.comparison_to_reference = if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    };

    merged.total_score = None;
    for (_, score) in merged.metric_scores.iter_mut() {
        *score = None;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_log::{FieldLog, FieldLogRecord};
    use approx::assert_relative_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fish(sample_id: &str, site: &str, year: i32, ratio: Option<f64>) -> BioRecord {
        BioRecord {
            collection_date: Some(ymd(year, 6, 1)),
            comparison_to_reference: ratio,
            total_score: Some(40.0),
            class_label: Some("Good".to_string()),
            metric_scores: vec![
                ("total_species".to_string(), Some(5.0)),
                ("sensitive_benthic".to_string(), Some(3.0)),
            ],
            ..BioRecord::new(sample_id, site, year)
        }
    }

    fn matcher(records: Vec<FieldLogRecord>) -> FieldLogMatcher {
        FieldLogMatcher::new(FieldLog::from_records(records), LogContext::detached())
    }

    fn log_row(site: &str, date: &str, marker: Option<&str>) -> FieldLogRecord {
        FieldLogRecord::from_raw(site, date, marker).unwrap()
    }

    #[test]
    fn test_collapse_without_log() {
        let m = matcher(vec![]);
        let resolver = BiologicalDuplicateResolver::new(&m, LogContext::detached());

        let (out, stats) = resolver.resolve_with_stats(vec![
            fish("S1", "Coal Creek", 2022, Some(0.6)),
            fish("S2", "Coal Creek", 2022, Some(0.8)),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(stats.collapsed_groups, 1);
        let merged = &out[0];
        assert_eq!(merged.sample_id, "S1");
        assert_relative_eq!(merged.comparison_to_reference.unwrap(), 0.7, epsilon = 1e-12);
        assert_eq!(merged.total_score, None);
        assert!(merged.metric_scores.iter().all(|(_, s)| s.is_none()));
        assert_eq!(merged.class_label.as_deref(), Some("Good"));
    }

    #[test]
    fn test_collapse_ignores_missing_ratios() {
        let m = matcher(vec![]);
        let resolver = BiologicalDuplicateResolver::new(&m, LogContext::detached());

        let out = resolver.resolve(vec![
            fish("S1", "Coal Creek", 2022, None),
            fish("S2", "Coal Creek", 2022, Some(0.5)),
            fish("S3", "Coal Creek", 2022, Some(f64::NAN)),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].comparison_to_reference, Some(0.5));

        let all_missing = resolver.resolve(vec![
            fish("S1", "Coal Creek", 2022, None),
            fish("S2", "Coal Creek", 2022, None),
        ]);
        assert_eq!(all_missing[0].comparison_to_reference, None);
    }

    #[test]
    fn test_replicates_get_log_dates_in_order() {
        let m = matcher(vec![
            log_row("Coal Creek", "6/10/2023", None),
            log_row("Coal Creek", "8/20/2023", Some("REP")),
        ]);
        let resolver = BiologicalDuplicateResolver::new(&m, LogContext::detached());

        let mut later = fish("S2", "Coal Creek", 2023, Some(0.8));
        later.collection_date = Some(ymd(2023, 9, 1));
        let mut earlier = fish("S1", "Coal Creek", 2023, Some(0.6));
        earlier.collection_date = Some(ymd(2023, 9, 1));

        let (out, stats) = resolver.resolve_with_stats(vec![later, earlier]);

        assert_eq!(out.len(), 2);
        assert_eq!(stats.replicate_groups, 1);
        assert_eq!(stats.dates_assigned, 2);
        // Same stored date: sample id breaks the tie
        assert_eq!(out[0].sample_id, "S2");
        assert_eq!(out[0].collection_date, Some(ymd(2023, 8, 20)));
        assert_eq!(out[1].sample_id, "S1");
        assert_eq!(out[1].collection_date, Some(ymd(2023, 6, 10)));
        assert_eq!(out[1].metric_scores[0].1, Some(5.0));
    }

    #[test]
    fn test_replicate_dates_from_adjacent_year_update_year() {
        let m = matcher(vec![
            log_row("Coal Creek", "12/15/2022", Some("REP")),
            log_row("Coal Creek", "12/29/2022", None),
        ]);
        let resolver = BiologicalDuplicateResolver::new(&m, LogContext::detached());

        let out = resolver.resolve(vec![
            fish("S1", "Coal Creek", 2023, Some(0.6)),
            fish("S2", "Coal Creek", 2023, Some(0.7)),
        ]);
        assert!(out.iter().all(|r| r.year == 2022));
    }

    #[test]
    fn test_surplus_replicates_keep_their_dates() {
        let m = matcher(vec![
            log_row("Coal Creek", "6/10/2023", Some("REP")),
            log_row("Coal Creek", "8/20/2023", None),
        ]);
        let resolver = BiologicalDuplicateResolver::new(&m, LogContext::detached());

        let mut third = fish("S3", "Coal Creek", 2023, Some(0.9));
        third.collection_date = Some(ymd(2023, 10, 5));
        let out = resolver.resolve(vec![
            fish("S1", "Coal Creek", 2023, Some(0.6)),
            fish("S2", "Coal Creek", 2023, Some(0.7)),
            third,
        ]);

        assert_eq!(out.len(), 3);
        assert_eq!(out[2].collection_date, Some(ymd(2023, 10, 5)));
    }

    #[test]
    fn test_singletons_and_order_preserved() {
        let m = matcher(vec![]);
        let resolver = BiologicalDuplicateResolver::new(&m, LogContext::detached());

        let out = resolver.resolve(vec![
            fish("A", "Bird Creek", 2021, Some(0.5)),
            fish("B1", "Coal Creek", 2022, Some(0.4)),
            fish("C", "Dog Creek", 2022, Some(0.3)),
            fish("B2", "Coal Creek", 2022, Some(0.6)),
        ]);

        let ids: Vec<&str> = out.iter().map(|r| r.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B1", "C"]);
        assert_eq!(out[0], fish("A", "Bird Creek", 2021, Some(0.5)));
    }

    #[test]
    fn test_macro_groups_split_by_season_and_habitat() {
        let m = matcher(vec![]);
        let resolver = BiologicalDuplicateResolver::new(&m, LogContext::detached());

        let macro_record = |id: &str, season: &str, habitat: &str| BioRecord {
            season: Some(season.to_string()),
            habitat: Some(habitat.to_string()),
            comparison_to_reference: Some(0.5),
            ..BioRecord::new(id, "Coal Creek", 2023)
        };

        let out = resolver.resolve(vec![
            macro_record("M1", "Summer", "Riffle"),
            macro_record("M2", "Winter", "Riffle"),
            macro_record("M3", "Summer", "Vegetation"),
            macro_record("M4", "Summer", "Riffle"),
        ]);

        let ids: Vec<&str> = out.iter().map(|r| r.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["M1", "M2", "M3"]);
    }
}
