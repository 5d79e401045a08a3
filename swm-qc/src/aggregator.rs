//! Worst-case aggregation of replicate chemical readings

use crate::error::{QcError, QcResult};
use crate::parameters::{ParameterKind, WorstCaseRule};

/// Pick the worst reading for a parameter
///
/// Missing and NaN readings are ignored; if nothing remains the result is `None`.
/// Parameters without a worst-case rule are an error rather than a silent pick.
pub fn worst_case(values: &[Option<f64>], parameter: &str) -> QcResult<Option<f64>> {
    let rule = ParameterKind::chemical(parameter)
        .and_then(|kind| kind.worst_case_rule())
        .ok_or_else(|| QcError::UnknownParameterKind(parameter.to_string()))?;

    Ok(apply_rule(rule, values))
}

/// Apply a rule to raw readings
pub fn apply_rule(rule: WorstCaseRule, values: &[Option<f64>]) -> Option<f64> {
    let mut valid = values.iter().flatten().copied().filter(|v| !v.is_nan());

    let first = valid.next()?;
    let worst = match rule {
        // Strict comparison keeps the earliest reading on a tie
        WorstCaseRule::FurthestFrom(pivot) => valid.fold(first, |worst, v| {
            if (v - pivot).abs() > (worst - pivot).abs() {
                v
            } else {
                worst
            }
        }),
        WorstCaseRule::Minimum => valid.fold(first, f64::min),
        WorstCaseRule::Maximum => valid.fold(first, f64::max),
    };

    Some(worst)
}
