use std::collections::BTreeMap;

use rand::Rng;

use crate::error::Result;
use crate::experiments::bandit::{thompson_sampling, BanditRecommendation};
use crate::experiments::bayesian::{calculate_bayesian_probability, BayesianResult};
use crate::experiments::config::EngineConfig;
use crate::experiments::report::{create_test_report, Report};
use crate::experiments::sequential::{sequential_test, SequentialTestDecision, SpendingFunction};
use crate::experiments::stats::{calculate_sample_size, calculate_significance_with, SignificanceResult};
use crate::types::{ExperimentData, VariantObservation};

/// Stateless statistics service. The configuration is its only state and
/// every call reads it without mutating it.
///
/// ```
/// use variantlab::{StatsEngine, VariantObservation};
///
/// let mut engine = StatsEngine::default();
/// engine.set_confidence_level(0.99).unwrap();
/// let result = engine
///     .calculate_significance(&VariantObservation::new(1000, 100), &VariantObservation::new(1000, 140))
///     .unwrap();
/// assert_eq!(result.confidence_level, 0.99);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StatsEngine {
    config: EngineConfig,
}

impl StatsEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_confidence_level(&mut self, level: f64) -> Result<()> {
        self.config.set_confidence_level(level)
    }

    pub fn set_minimum_sample_size(&mut self, n: u64) -> Result<()> {
        self.config.set_minimum_sample_size(n)
    }

    pub fn calculate_significance(
        &self,
        control: &VariantObservation,
        treatment: &VariantObservation,
    ) -> Result<SignificanceResult> {
        calculate_significance_with(control, treatment, &self.config)
    }

    /// Uses `monte_carlo_samples` draws from the supplied RNG.
    pub fn calculate_bayesian_probability<R: Rng + ?Sized>(
        &self,
        control: &VariantObservation,
        treatment: &VariantObservation,
        rng: &mut R,
    ) -> Result<BayesianResult> {
        calculate_bayesian_probability(control, treatment, self.config.monte_carlo_samples, rng)
    }

    /// Per-variant sample size at the configured confidence level and power
    /// threshold.
    pub fn calculate_sample_size(
        &self,
        baseline_conversion: f64,
        minimum_detectable_effect: f64,
    ) -> Result<u64> {
        calculate_sample_size(
            baseline_conversion,
            minimum_detectable_effect,
            self.config.confidence_level,
            self.config.power_threshold,
        )
    }

    pub fn sequential_test(
        &self,
        control: &VariantObservation,
        treatment: &VariantObservation,
        spending_function: SpendingFunction,
    ) -> Result<SequentialTestDecision> {
        sequential_test(control, treatment, spending_function, &self.config)
    }

    pub fn thompson_sampling<R: Rng + ?Sized>(
        &self,
        variants: &BTreeMap<String, VariantObservation>,
        rng: &mut R,
    ) -> Result<BanditRecommendation> {
        thompson_sampling(variants, rng)
    }

    pub fn create_test_report(&self, data: &ExperimentData) -> Report {
        create_test_report(data, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;

    #[test]
    fn new_rejects_invalid_config() {
        let config = EngineConfig {
            confidence_level: 1.2,
            ..EngineConfig::default()
        };
        assert!(matches!(
            StatsEngine::new(config),
            Err(StatsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn failed_setter_leaves_config_unchanged() {
        let mut engine = StatsEngine::default();
        assert!(engine.set_confidence_level(-0.1).is_err());
        assert!(engine.set_minimum_sample_size(0).is_err());
        assert_eq!(engine.config(), &EngineConfig::default());
    }

    #[test]
    fn sample_size_follows_configured_power() {
        let default = StatsEngine::default();
        let strict = StatsEngine::new(EngineConfig::strict()).unwrap();
        let n_default = default.calculate_sample_size(0.1, 0.1).unwrap();
        let n_strict = strict.calculate_sample_size(0.1, 0.1).unwrap();
        assert!(n_strict > n_default);
    }

    #[test]
    fn minimum_sample_size_drives_sequential_plan() {
        let mut engine = StatsEngine::default();
        engine.set_minimum_sample_size(400).unwrap();
        let d = engine
            .sequential_test(
                &VariantObservation::new(100, 10),
                &VariantObservation::new(100, 12),
                SpendingFunction::OBrienFleming,
            )
            .unwrap();
        assert!((d.information_fraction - 0.25).abs() < 1e-12);
    }
}
