use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distributions::sample_beta;
use crate::error::{Result, StatsError};
use crate::types::VariantObservation;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BanditRecommendation {
    /// One posterior draw per variant.
    pub samples: BTreeMap<String, f64>,
    pub recommended: String,
    /// `clamp(k / sqrt(total_visitors), 0.1, 1)`. Reported only; it does not
    /// influence the draw.
    pub exploration_rate: f64,
}

/// Thompson sampling over `Beta(conversions + 1, failures + 1)` posteriors.
///
/// Variants are visited in key order, so a seeded RNG reproduces the same
/// draws. Ties go to the first key. Arms with no traffic yet draw from the
/// uniform prior.
pub fn thompson_sampling<R: Rng + ?Sized>(
    variants: &BTreeMap<String, VariantObservation>,
    rng: &mut R,
) -> Result<BanditRecommendation> {
    if variants.is_empty() {
        return Err(StatsError::NoVariants);
    }

    let mut samples = BTreeMap::new();
    let mut best: Option<(&str, f64)> = None;
    let mut total_visitors = 0.0;

    for (name, observation) in variants {
        observation.validate_counts(name)?;
        total_visitors += observation.visitors as f64;

        let (alpha, beta) = observation.posterior();
        let draw = sample_beta(alpha, beta, rng)?;
        if best.map_or(true, |(_, top)| draw > top) {
            best = Some((name.as_str(), draw));
        }
        samples.insert(name.clone(), draw);
    }

    let recommended = best
        .map(|(name, _)| name.to_string())
        .ok_or(StatsError::NoVariants)?;

    let exploration_rate = if total_visitors == 0.0 {
        1.0
    } else {
        (variants.len() as f64 / total_visitors.sqrt()).clamp(0.1, 1.0)
    };

    tracing::debug!(
        arms = variants.len(),
        total_visitors,
        recommended = %recommended,
        exploration_rate,
        "thompson sampling draw"
    );

    Ok(BanditRecommendation {
        samples,
        recommended,
        exploration_rate,
    })
}
