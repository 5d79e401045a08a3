//! Parameter kinds
//!
//! Every parameter the engine understands maps to one [`ParameterKind`]. The
//! kind owns the two pieces of behavior that used to be spread across string
//! comparisons: which reading is the worst case when duplicates are merged, and
//! which band table turns a value into a status. Adding a parameter means adding
//! a code to [`ParameterKind::from_code`], not a new branch at each call site.

use crate::classifier::builtin;
use crate::classifier::ThresholdTable;
use std::fmt;
use swm_common::db::ReferenceValues;
use swm_common::Domain;

/// Neutral pH, the pivot of the pH worst-case rule
pub const NEUTRAL_PH: f64 = 7.0;

/// Code of the biological index ratio column (fish and macro)
pub const COMPARISON_TO_REFERENCE: &str = "comparison_to_reference";

/// Code of the habitat assessment total
pub const HABITAT_TOTAL_SCORE: &str = "total_score";

/// Nutrient-class chemical parameters (higher is worse)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nutrient {
    Nitrate,
    Nitrite,
    Ammonia,
    SolubleNitrogen,
    Phosphorus,
    Chloride,
}

impl Nutrient {
    pub const ALL: [Nutrient; 6] = [
        Nutrient::Nitrate,
        Nutrient::Nitrite,
        Nutrient::Ammonia,
        Nutrient::SolubleNitrogen,
        Nutrient::Phosphorus,
        Nutrient::Chloride,
    ];

    /// Parameter code as stored in `chemical_parameters`
    pub fn code(&self) -> &'static str {
        match self {
            Nutrient::Nitrate => "Nitrate",
            Nutrient::Nitrite => "Nitrite",
            Nutrient::Ammonia => "Ammonia",
            Nutrient::SolubleNitrogen => "soluble_nitrogen",
            Nutrient::Phosphorus => "Phosphorus",
            Nutrient::Chloride => "Chloride",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.code() == code)
    }
}

/// How the worst of several readings is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorstCaseRule {
    /// Greatest absolute distance from the pivot; ties keep the earliest reading
    FurthestFrom(f64),
    /// Lowest reading
    Minimum,
    /// Highest reading
    Maximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Ph,
    DissolvedOxygen,
    Nutrient(Nutrient),
    Habitat,
    FishIbi,
    MacroBioassessment,
}

impl ParameterKind {
    /// Resolve a parameter code within a domain
    pub fn from_code(domain: Domain, code: &str) -> Option<Self> {
        match domain {
            Domain::Chemical => Self::chemical(code),
            Domain::Fish if code == COMPARISON_TO_REFERENCE => Some(ParameterKind::FishIbi),
            Domain::Macro if code == COMPARISON_TO_REFERENCE => Some(ParameterKind::MacroBioassessment),
            Domain::Habitat if code == HABITAT_TOTAL_SCORE => Some(ParameterKind::Habitat),
            _ => None,
        }
    }

    /// Resolve a chemical parameter code
    pub fn chemical(code: &str) -> Option<Self> {
        match code {
            "pH" => Some(ParameterKind::Ph),
            "do_percent" => Some(ParameterKind::DissolvedOxygen),
            other => Nutrient::from_code(other).map(ParameterKind::Nutrient),
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            ParameterKind::Ph | ParameterKind::DissolvedOxygen | ParameterKind::Nutrient(_) => {
                Domain::Chemical
            }
            ParameterKind::Habitat => Domain::Habitat,
            ParameterKind::FishIbi => Domain::Fish,
            ParameterKind::MacroBioassessment => Domain::Macro,
        }
    }

    /// Worst-case merge rule; biological and habitat kinds are averaged instead
    pub fn worst_case_rule(&self) -> Option<WorstCaseRule> {
        match self {
            ParameterKind::Ph => Some(WorstCaseRule::FurthestFrom(NEUTRAL_PH)),
            ParameterKind::DissolvedOxygen => Some(WorstCaseRule::Minimum),
            ParameterKind::Nutrient(_) => Some(WorstCaseRule::Maximum),
            ParameterKind::Habitat | ParameterKind::FishIbi | ParameterKind::MacroBioassessment => None,
        }
    }

    /// Band table for this kind
    ///
    /// Chemical kinds derive their bands from reference values and return None when
    /// the required bounds are missing. Biological and habitat kinds use fixed bands.
    pub fn band_table(&self, reference: Option<&ReferenceValues>) -> Option<ThresholdTable> {
        match self {
            ParameterKind::Ph => reference.and_then(builtin::ph_table),
            ParameterKind::DissolvedOxygen => reference.and_then(builtin::range_table),
            ParameterKind::Nutrient(_) => reference.and_then(builtin::upper_limit_table),
            ParameterKind::FishIbi => Some(builtin::fish_integrity_table()),
            ParameterKind::MacroBioassessment => Some(builtin::macro_condition_table()),
            ParameterKind::Habitat => Some(builtin::habitat_grade_table()),
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::Ph => f.write_str("pH"),
            ParameterKind::DissolvedOxygen => f.write_str("do_percent"),
            ParameterKind::Nutrient(n) => f.write_str(n.code()),
            ParameterKind::Habitat => f.write_str("habitat"),
            ParameterKind::FishIbi => f.write_str("fish_ibi"),
            ParameterKind::MacroBioassessment => f.write_str("macro_bioassessment"),
        }
    }
}
