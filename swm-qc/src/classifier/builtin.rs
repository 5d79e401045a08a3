//! Band tables: fixed published bands and shapes derived from reference values

use super::palette::*;
use super::table::ThresholdTable;
use swm_common::db::ReferenceValues;

/// Fish IBI integrity classes on `comparison_to_reference`
pub fn fish_integrity_table() -> ThresholdTable {
    ThresholdTable::from_cuts(
        &[0.47, 0.60, 0.76, 0.97],
        &[
            ("Very Poor", RAMP_WORST),
            ("Poor", RAMP_LOW),
            ("Fair", RAMP_MIDDLE),
            ("Good", RAMP_GOOD),
            ("Excellent", RAMP_BEST),
        ],
    )
}

/// Macroinvertebrate biological condition on `comparison_to_reference`
pub fn macro_condition_table() -> ThresholdTable {
    ThresholdTable::from_cuts(
        &[0.17, 0.54, 0.83],
        &[
            ("Severely Impaired", SEVERELY_IMPAIRED),
            ("Moderately Impaired", MODERATELY_IMPAIRED),
            ("Slightly Impaired", SLIGHTLY_IMPAIRED),
            ("Non-impaired", NON_IMPAIRED),
        ],
    )
}

/// Habitat letter grade on the 0-100 total score
pub fn habitat_grade_table() -> ThresholdTable {
    ThresholdTable::from_cuts(
        &[60.0, 70.0, 80.0, 90.0],
        &[
            ("F", RAMP_WORST),
            ("D", RAMP_LOW),
            ("C", RAMP_MIDDLE),
            ("B", RAMP_GOOD),
            ("A", RAMP_BEST),
        ],
    )
}

/// pH: acidic below the normal range, alkaline above it
pub fn ph_table(reference: &ReferenceValues) -> Option<ThresholdTable> {
    let (min, max) = (reference.normal_min?, reference.normal_max?);
    if min >= max {
        return None;
    }
    Some(ThresholdTable::from_cuts(
        &[min, max],
        &[
            (STATUS_BELOW_NORMAL, BELOW_NORMAL),
            (STATUS_NORMAL, NORMAL),
            (STATUS_ABOVE_NORMAL, ABOVE_NORMAL),
        ],
    ))
}

/// Two-sided range: normal min/max, optionally wrapped by caution min/max
///
/// Without caution bounds anything outside the normal range is `Caution`.
pub fn range_table(reference: &ReferenceValues) -> Option<ThresholdTable> {
    let (min, max) = (reference.normal_min?, reference.normal_max?);
    if min >= max {
        return None;
    }

    match (reference.caution_min, reference.caution_max) {
        (Some(cmin), Some(cmax)) if cmin < min && cmax > max => Some(ThresholdTable::from_cuts(
            &[cmin, min, max, cmax],
            &[
                (STATUS_POOR, POOR),
                (STATUS_CAUTION, CAUTION),
                (STATUS_NORMAL, NORMAL),
                (STATUS_CAUTION, CAUTION),
                (STATUS_POOR, POOR),
            ],
        )),
        _ => Some(ThresholdTable::from_cuts(
            &[min, max],
            &[
                (STATUS_CAUTION, CAUTION),
                (STATUS_NORMAL, NORMAL),
                (STATUS_CAUTION, CAUTION),
            ],
        )),
    }
}

/// One-sided upper limits: `normal`, optionally followed by `caution`
pub fn upper_limit_table(reference: &ReferenceValues) -> Option<ThresholdTable> {
    let normal = reference.normal?;

    match reference.caution {
        Some(caution) if caution > normal => Some(ThresholdTable::from_cuts(
            &[normal, caution],
            &[
                (STATUS_NORMAL, NORMAL),
                (STATUS_CAUTION, CAUTION),
                (STATUS_POOR, POOR),
            ],
        )),
        _ => Some(ThresholdTable::from_cuts(
            &[normal],
            &[(STATUS_NORMAL, NORMAL), (STATUS_CAUTION, CAUTION)],
        )),
    }
}

/// Fallback for parameters without a known kind: whichever shape the bounds describe
pub fn generic_table(reference: &ReferenceValues) -> Option<ThresholdTable> {
    range_table(reference).or_else(|| upper_limit_table(reference))
}
