//! Beta-Binomial posterior comparison of two variants.
//!
//! Each variant's conversion rate is modelled as
//! `Beta(conversions + 1, visitors - conversions + 1)`. The win probability is
//! a Monte Carlo estimate, so repeated calls with identical inputs return
//! close but not identical values unless the same seeded RNG is supplied.
//! The closed-form probability is returned alongside as a reference.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distributions::{ln_beta, sample_beta, two_tailed_critical_value};
use super::stats::Interval;
use crate::error::{Result, StatsError};
use crate::types::VariantObservation;

/// Mass covered by the per-arm credible intervals.
pub const CREDIBLE_LEVEL: f64 = 0.95;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BayesianResult {
    /// Monte Carlo estimate of P(treatment rate > control rate).
    pub probability_treatment_better: f64,
    /// Monte Carlo estimate of P(control rate > treatment rate).
    pub probability_control_better: f64,
    /// Closed-form P(treatment rate > control rate).
    pub exact_probability_treatment_better: f64,
    /// Skew-corrected normal approximation, not exact Beta quantiles.
    pub control_credible_interval: Interval,
    pub treatment_credible_interval: Interval,
    /// Point estimate `max(0, treatment_rate - control_rate)` of the loss from
    /// keeping control.
    pub control_expected_loss: f64,
    /// Point estimate `max(0, control_rate - treatment_rate)` of the loss from
    /// shipping treatment.
    pub treatment_expected_loss: f64,
    pub samples: u64,
}

/// Monte Carlo win probability with `samples` posterior draws per arm.
///
/// ```
/// use rand::{rngs::StdRng, SeedableRng};
/// use variantlab::{calculate_bayesian_probability, VariantObservation};
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let result = calculate_bayesian_probability(
///     &VariantObservation::new(1000, 50),
///     &VariantObservation::new(1000, 200),
///     10_000,
///     &mut rng,
/// )
/// .unwrap();
/// assert!(result.probability_treatment_better > 0.99);
/// ```
pub fn calculate_bayesian_probability<R: Rng + ?Sized>(
    control: &VariantObservation,
    treatment: &VariantObservation,
    samples: u64,
    rng: &mut R,
) -> Result<BayesianResult> {
    control.validate("control")?;
    treatment.validate("treatment")?;
    if samples == 0 {
        return Err(StatsError::InvalidInput(
            "Monte Carlo sample count must be > 0".to_string(),
        ));
    }

    let (alpha_c, beta_c) = control.posterior();
    let (alpha_t, beta_t) = treatment.posterior();

    let mut treatment_wins: u64 = 0;
    let mut control_wins: u64 = 0;
    for _ in 0..samples {
        let c = sample_beta(alpha_c, beta_c, rng)?;
        let t = sample_beta(alpha_t, beta_t, rng)?;
        if t > c {
            treatment_wins += 1;
        } else if c > t {
            control_wins += 1;
        }
    }

    let probability_treatment_better = treatment_wins as f64 / samples as f64;
    let probability_control_better = control_wins as f64 / samples as f64;

    let control_rate = control.conversion_rate();
    let treatment_rate = treatment.conversion_rate();

    tracing::debug!(
        samples,
        probability_treatment_better,
        "bayesian posterior comparison finished"
    );

    Ok(BayesianResult {
        probability_treatment_better,
        probability_control_better,
        exact_probability_treatment_better: exact_probability_b_greater_a(
            control, treatment,
        ),
        control_credible_interval: beta_credible_interval(alpha_c, beta_c, CREDIBLE_LEVEL)?,
        treatment_credible_interval: beta_credible_interval(alpha_t, beta_t, CREDIBLE_LEVEL)?,
        control_expected_loss: (treatment_rate - control_rate).max(0.0),
        treatment_expected_loss: (control_rate - treatment_rate).max(0.0),
        samples,
    })
}

/// [`calculate_bayesian_probability`] driven by the thread-local RNG.
pub fn calculate_bayesian_probability_random(
    control: &VariantObservation,
    treatment: &VariantObservation,
    samples: u64,
) -> Result<BayesianResult> {
    calculate_bayesian_probability(control, treatment, samples, &mut rand::thread_rng())
}

/// Runs the Monte Carlo estimate on tokio's blocking pool so async callers
/// on a latency-sensitive path are not stalled by the sampling loop.
#[cfg(feature = "async")]
pub async fn spawn_bayesian_probability(
    control: VariantObservation,
    treatment: VariantObservation,
    samples: u64,
) -> Result<BayesianResult> {
    use rand::SeedableRng;

    tokio::task::spawn_blocking(move || {
        let mut rng = rand::rngs::StdRng::from_entropy();
        calculate_bayesian_probability(&control, &treatment, samples, &mut rng)
    })
    .await
    .map_err(|e| StatsError::Worker(e.to_string()))?
}

/// Computes P(B > A) using Evan Miller's closed-form sum over Beta functions.
/// Posterior A: Beta(a_conv+1, a_visitors-a_conv+1), likewise for B.
/// Cost is linear in B's conversion count.
fn exact_probability_b_greater_a(a: &VariantObservation, b: &VariantObservation) -> f64 {
    let (alpha_a, beta_a) = a.posterior();
    let (alpha_b, beta_b) = b.posterior();

    // P(B > A) = sum_{i=0}^{alpha_b-1} B(alpha_a+i, beta_a+beta_b) / ((beta_b+i)*B(1+i, beta_b)*B(alpha_a, beta_a))
    let ln_beta_a = ln_beta(alpha_a, beta_a);
    let total: f64 = (0..=b.conversions)
        .map(|i| {
            let i = i as f64;
            let log_num = ln_beta(alpha_a + i, beta_a + beta_b);
            let log_den = (beta_b + i).ln() + ln_beta(1.0 + i, beta_b) + ln_beta_a;
            (log_num - log_den).exp()
        })
        .sum();

    total.clamp(0.0, 1.0)
}

/// Credible interval for Beta(alpha, beta) from its mean, variance and
/// skewness via a Cornish-Fisher corrected normal quantile, clamped to [0, 1].
fn beta_credible_interval(alpha: f64, beta: f64, level: f64) -> Result<Interval> {
    let sum = alpha + beta;
    let mean = alpha / sum;
    let sd = (alpha * beta / (sum * sum * (sum + 1.0))).sqrt();
    let skew = 2.0 * (beta - alpha) * (sum + 1.0).sqrt() / ((sum + 2.0) * (alpha * beta).sqrt());

    let z = two_tailed_critical_value(level)?;
    let corrected = |z: f64| z + (z * z - 1.0) * skew / 6.0;

    Ok(Interval {
        lower: (mean + sd * corrected(-z)).clamp(0.0, 1.0),
        upper: (mean + sd * corrected(z)).clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn obs(visitors: u64, conversions: u64) -> VariantObservation {
        VariantObservation::new(visitors, conversions)
    }

    #[test]
    fn dominant_treatment_wins_almost_always() {
        let mut rng = StdRng::seed_from_u64(2024);
        let r = calculate_bayesian_probability(&obs(1000, 50), &obs(1000, 200), 100_000, &mut rng)
            .unwrap();
        assert!(
            r.probability_treatment_better > 0.99,
            "p={}",
            r.probability_treatment_better
        );
        assert!(r.exact_probability_treatment_better > 0.99);
        assert_eq!(r.samples, 100_000);
    }

    #[test]
    fn equal_arms_are_a_coin_flip() {
        let mut rng = StdRng::seed_from_u64(5);
        let r = calculate_bayesian_probability(&obs(1000, 100), &obs(1000, 100), 50_000, &mut rng)
            .unwrap();
        assert!((r.probability_treatment_better - 0.5).abs() < 0.02);
        assert!((r.exact_probability_treatment_better - 0.5).abs() < 0.02);
    }

    #[test]
    fn monte_carlo_converges_to_closed_form() {
        let mut rng = StdRng::seed_from_u64(77);
        let r = calculate_bayesian_probability(&obs(1000, 100), &obs(1000, 115), 100_000, &mut rng)
            .unwrap();
        assert!(
            (r.probability_treatment_better - r.exact_probability_treatment_better).abs() < 0.01,
            "mc={} exact={}",
            r.probability_treatment_better,
            r.exact_probability_treatment_better
        );
    }

    #[test]
    fn win_probabilities_sum_to_at_most_one() {
        let mut rng = StdRng::seed_from_u64(8);
        let r = calculate_bayesian_probability(&obs(200, 20), &obs(200, 25), 10_000, &mut rng)
            .unwrap();
        let total = r.probability_treatment_better + r.probability_control_better;
        assert!(total <= 1.0 + 1e-12);
        assert!(total > 0.999);
    }

    #[test]
    fn same_seed_gives_same_estimate() {
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            calculate_bayesian_probability(&obs(500, 40), &obs(500, 52), 5_000, &mut rng)
                .unwrap()
                .probability_treatment_better
        };
        assert_eq!(run(13), run(13));
    }

    #[test]
    fn expected_loss_is_one_sided_point_estimate() {
        let mut rng = StdRng::seed_from_u64(1);
        let r = calculate_bayesian_probability(&obs(1000, 100), &obs(1000, 140), 1_000, &mut rng)
            .unwrap();
        assert!((r.control_expected_loss - 0.04).abs() < 1e-12);
        assert_eq!(r.treatment_expected_loss, 0.0);
    }

    #[test]
    fn credible_intervals_bracket_posterior_means() {
        let mut rng = StdRng::seed_from_u64(1);
        let r = calculate_bayesian_probability(&obs(1000, 100), &obs(1000, 140), 1_000, &mut rng)
            .unwrap();
        let control_mean = 101.0 / 1002.0;
        let treatment_mean = 141.0 / 1002.0;
        assert!(r.control_credible_interval.contains(control_mean));
        assert!(r.treatment_credible_interval.contains(treatment_mean));
        // Width is roughly 2 * 1.96 * sd ≈ 0.037 for the control posterior.
        let width = r.control_credible_interval.upper - r.control_credible_interval.lower;
        assert!((width - 0.037).abs() < 0.003, "width={}", width);
    }

    #[test]
    fn credible_interval_is_skewed_away_from_zero_for_rare_events() {
        let interval = beta_credible_interval(2.0, 200.0, 0.95).unwrap();
        let mean = 2.0 / 202.0;
        assert!(interval.lower >= 0.0);
        assert!(interval.upper - mean > mean - interval.lower);
    }

    #[test]
    fn invalid_observations_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            calculate_bayesian_probability(&obs(0, 0), &obs(10, 1), 100, &mut rng),
            Err(StatsError::InvalidInput(_))
        ));
        assert!(calculate_bayesian_probability(&obs(10, 11), &obs(10, 1), 100, &mut rng).is_err());
        assert!(calculate_bayesian_probability(&obs(10, 1), &obs(10, 1), 0, &mut rng).is_err());
    }

    #[test]
    fn thread_rng_variant_produces_bounded_probability() {
        let r = calculate_bayesian_probability_random(&obs(300, 30), &obs(300, 45), 2_000).unwrap();
        assert!((0.0..=1.0).contains(&r.probability_treatment_better));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn spawned_estimate_matches_dominance() {
        let r = spawn_bayesian_probability(obs(1000, 50), obs(1000, 200), 20_000)
            .await
            .unwrap();
        assert!(r.probability_treatment_better > 0.99);
    }
}
