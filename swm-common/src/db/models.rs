//! Database models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Survey data domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Chemical,
    Fish,
    Macro,
    Habitat,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Chemical => "chemical",
            Domain::Fish => "fish",
            Domain::Macro => "macro",
            Domain::Habitat => "habitat",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chemical" | "chem" => Ok(Domain::Chemical),
            "fish" => Ok(Domain::Fish),
            "macro" | "macroinvertebrate" => Ok(Domain::Macro),
            "habitat" => Ok(Domain::Habitat),
            other => Err(crate::Error::UnsupportedDomain(other.to_string())),
        }
    }
}

/// One sampling visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEvent {
    pub event_id: i64,
    pub site_name: String,
    pub collection_date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub domain: Domain,
}

/// One chemical result attached to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub event_id: i64,
    pub parameter_code: String,
    pub value: Option<f64>,
    pub status: Option<String>,
}

/// Chemical events sharing a site and date
///
/// `keep_event_id` is always the smallest id in `event_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateGroup {
    pub site_name: String,
    pub collection_date: NaiveDate,
    pub event_count: usize,
    pub event_ids: Vec<i64>,
    pub keep_event_id: i64,
}

impl ReplicateGroup {
    /// Build a group from unordered ids; returns None for an empty id list
    pub fn new(site_name: String, collection_date: NaiveDate, mut event_ids: Vec<i64>) -> Option<Self> {
        event_ids.sort_unstable();
        event_ids.dedup();
        let keep_event_id = *event_ids.first()?;
        Some(Self {
            site_name,
            collection_date,
            event_count: event_ids.len(),
            event_ids,
            keep_event_id,
        })
    }

    /// Every event id except the one that survives
    pub fn removed_event_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.event_ids
            .iter()
            .copied()
            .filter(move |id| *id != self.keep_event_id)
    }
}

/// Named reference bounds for one parameter
///
/// Mirrors the `threshold_type` values stored in `chemical_reference_values`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValues {
    pub normal_min: Option<f64>,
    pub normal_max: Option<f64>,
    pub caution_min: Option<f64>,
    pub caution_max: Option<f64>,
    pub normal: Option<f64>,
    pub caution: Option<f64>,
    pub poor: Option<f64>,
}

impl ReferenceValues {
    /// Only a normal range
    pub fn normal_range(min: f64, max: f64) -> Self {
        Self {
            normal_min: Some(min),
            normal_max: Some(max),
            ..Self::default()
        }
    }

    /// Only upper limits for the normal and caution bands
    pub fn upper_limits(normal: f64, caution: f64) -> Self {
        Self {
            normal: Some(normal),
            caution: Some(caution),
            ..Self::default()
        }
    }

    /// Set one bound by its stored threshold type; returns false for an unknown type
    pub fn set(&mut self, threshold_type: &str, value: f64) -> bool {
        let slot = match threshold_type {
            "normal_min" => &mut self.normal_min,
            "normal_max" => &mut self.normal_max,
            "caution_min" => &mut self.caution_min,
            "caution_max" => &mut self.caution_max,
            "normal" => &mut self.normal,
            "caution" => &mut self.caution,
            "poor" => &mut self.poor,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reference values keyed by parameter code
pub type ReferenceValueSet = BTreeMap<String, ReferenceValues>;
