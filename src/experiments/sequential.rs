use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::config::EngineConfig;
use super::distributions::two_tailed_critical_value;
use super::stats::pooled_z_score;
use crate::error::{Result, StatsError};
use crate::types::VariantObservation;

/// Alpha-spending rule for interim looks.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpendingFunction {
    #[default]
    #[serde(rename = "obrien-fleming")]
    OBrienFleming,
    #[serde(rename = "pocock")]
    Pocock,
}

impl FromStr for SpendingFunction {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "obrien-fleming" => Ok(Self::OBrienFleming),
            "pocock" => Ok(Self::Pocock),
            other => Err(StatsError::InvalidInput(format!(
                "unknown spending function '{}', expected 'obrien-fleming' or 'pocock'",
                other
            ))),
        }
    }
}

impl fmt::Display for SpendingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OBrienFleming => write!(f, "obrien-fleming"),
            Self::Pocock => write!(f, "pocock"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SequentialTestDecision {
    pub boundary: f64,
    pub z_score: f64,
    /// Share of the planned sample seen so far, in [0, 1].
    pub information_fraction: f64,
    pub spending_function: SpendingFunction,
    pub should_stop: bool,
}

/// Interim stop/continue decision.
///
/// The plan is `2 * minimum_sample_size` visitors in total. O'Brien-Fleming
/// scales the critical value by `1/sqrt(fraction)`, so early looks need a
/// very large |z|. Pocock returns the flat critical value at every look.
pub fn sequential_test(
    control: &VariantObservation,
    treatment: &VariantObservation,
    spending_function: SpendingFunction,
    config: &EngineConfig,
) -> Result<SequentialTestDecision> {
    config.validate_sequential_plan()?;
    control.validate("control")?;
    treatment.validate("treatment")?;

    let total = control.visitors as f64 + treatment.visitors as f64;
    let planned = 2.0 * config.minimum_sample_size as f64;
    let information_fraction = (total / planned).min(1.0);

    let z_alpha = two_tailed_critical_value(config.confidence_level)?;
    let boundary = match spending_function {
        SpendingFunction::OBrienFleming => z_alpha / information_fraction.sqrt(),
        SpendingFunction::Pocock => z_alpha,
    };

    let z_score = pooled_z_score(control, treatment);
    let should_stop = z_score.abs() > boundary;

    tracing::debug!(
        %spending_function,
        information_fraction,
        boundary,
        z_score,
        should_stop,
        "sequential boundary evaluated"
    );

    Ok(SequentialTestDecision {
        boundary,
        z_score,
        information_fraction,
        spending_function,
        should_stop,
    })
}
