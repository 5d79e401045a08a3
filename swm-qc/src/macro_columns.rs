//! Column labels for macroinvertebrate metric tables
//!
//! One site's macro samples are shown as one column per sample, grouped by
//! season. A year with a single habitat is labelled by the year alone; a year
//! sampled in several habitats gets a habitat letter. Further samples that would
//! share a label get `(REP)`, `(REP 2)`, ... so no column hides another.

use crate::bio_resolver::BioRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One labelled sample column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroColumn {
    pub label: String,
    pub sample_id: String,
    pub year: i32,
    pub season: Option<String>,
    pub habitat: Option<String>,
    pub collection_date: Option<NaiveDate>,
}

/// One-letter habitat code; `U` for missing or unrecognised habitats
pub fn habitat_abbreviation(habitat: Option<&str>) -> char {
    let habitat = habitat.map(|h| h.trim().to_ascii_lowercase()).unwrap_or_default();
    if habitat.starts_with("riffle") {
        'R'
    } else if habitat.starts_with("vegetation") {
        'V'
    } else if habitat.starts_with("woody") {
        'W'
    } else {
        'U'
    }
}

/// Label every sample of one site
///
/// Output is ordered by year, season, then collection date and sample id. Labels
/// are unique within a season.
pub fn label_collections(events: &[BioRecord]) -> Vec<MacroColumn> {
    let mut by_period: BTreeMap<(i32, Option<&str>), Vec<&BioRecord>> = BTreeMap::new();
    for event in events {
        by_period
            .entry((event.year, event.season.as_deref()))
            .or_default()
            .push(event);
    }

    let mut columns = Vec::with_capacity(events.len());

    for ((year, _), mut samples) in by_period {
        samples.sort_by(|a, b| {
            (a.collection_date, &a.sample_id).cmp(&(b.collection_date, &b.sample_id))
        });

        let habitats: BTreeSet<char> = samples
            .iter()
            .map(|s| habitat_abbreviation(s.habitat.as_deref()))
            .collect();
        let multi_habitat = habitats.len() > 1;

        let mut seen: HashMap<String, usize> = HashMap::new();
        for sample in samples {
            let base = if multi_habitat {
                format!("{}-{}", year, habitat_abbreviation(sample.habitat.as_deref()))
            } else {
                year.to_string()
            };

            let count = seen.entry(base.clone()).or_insert(0);
            let label = match *count {
                0 => base,
                1 => format!("{} (REP)", base),
                n => format!("{} (REP {})", base, n),
            };
            *count += 1;

            columns.push(MacroColumn {
                label,
                sample_id: sample.sample_id.clone(),
                year,
                season: sample.season.clone(),
                habitat: sample.habitat.clone(),
                collection_date: sample.collection_date,
            });
        }
    }

    columns
}
