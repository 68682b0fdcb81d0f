use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
pub const DEFAULT_MINIMUM_SAMPLE_SIZE: u64 = 100;
pub const DEFAULT_MINIMUM_DETECTABLE_EFFECT: f64 = 0.05;
pub const DEFAULT_POWER_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MONTE_CARLO_SAMPLES: u64 = 100_000;

/// Options shared by every statistics operation.
///
/// A flat value: callers pass it into the free functions or hand it to a
/// [`crate::StatsEngine`]. Changing it goes through the validating setters.
///
/// # Example
/// ```
/// use variantlab::EngineConfig;
///
/// let mut config = EngineConfig::default();
/// assert_eq!(config.confidence_level, 0.95);
/// config.set_confidence_level(0.99).unwrap();
/// assert!(config.set_confidence_level(1.5).is_err());
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Two-tailed confidence level, strictly inside (0, 1).
    pub confidence_level: f64,
    /// Visitors per variant before results are considered readable. Also the
    /// per-arm plan used for the sequential information fraction.
    pub minimum_sample_size: u64,
    /// Relative lift the sample-size estimate is sized to detect.
    pub minimum_detectable_effect: f64,
    /// Power below which a warning is recommended, and the target power for
    /// sample-size estimates.
    pub power_threshold: f64,
    /// Posterior draws per arm for the Monte Carlo win probability.
    pub monte_carlo_samples: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            minimum_sample_size: DEFAULT_MINIMUM_SAMPLE_SIZE,
            minimum_detectable_effect: DEFAULT_MINIMUM_DETECTABLE_EFFECT,
            power_threshold: DEFAULT_POWER_THRESHOLD,
            monte_carlo_samples: DEFAULT_MONTE_CARLO_SAMPLES,
        }
    }
}

impl EngineConfig {
    /// 99% confidence with a larger minimum sample.
    pub fn strict() -> Self {
        Self {
            confidence_level: 0.99,
            minimum_sample_size: 1000,
            power_threshold: 0.9,
            ..Self::default()
        }
    }

    /// 90% confidence for early, directional reads.
    pub fn permissive() -> Self {
        Self {
            confidence_level: 0.90,
            minimum_sample_size: 50,
            ..Self::default()
        }
    }

    /// Significance threshold (alpha) implied by the confidence level.
    pub fn alpha(&self) -> f64 {
        1.0 - self.confidence_level
    }

    pub fn set_confidence_level(&mut self, level: f64) -> Result<()> {
        check_open_unit("confidenceLevel", level)?;
        self.confidence_level = level;
        Ok(())
    }

    pub fn set_minimum_sample_size(&mut self, n: u64) -> Result<()> {
        check_minimum_sample_size(n)?;
        self.minimum_sample_size = n;
        Ok(())
    }

    /// Checks only the fields an interim look reads: the confidence level
    /// and the per-arm plan.
    pub fn validate_sequential_plan(&self) -> Result<()> {
        check_open_unit("confidenceLevel", self.confidence_level)?;
        check_minimum_sample_size(self.minimum_sample_size)
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_sequential_plan()?;
        check_open_unit("powerThreshold", self.power_threshold)?;
        if !(self.minimum_detectable_effect.is_finite() && self.minimum_detectable_effect > 0.0) {
            return Err(StatsError::InvalidConfig(format!(
                "minimumDetectableEffect must be > 0, got {}",
                self.minimum_detectable_effect
            )));
        }
        if self.monte_carlo_samples == 0 {
            return Err(StatsError::InvalidConfig(
                "monteCarloSamples must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_minimum_sample_size(n: u64) -> Result<()> {
    if n == 0 {
        return Err(StatsError::InvalidConfig(
            "minimumSampleSize must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn check_open_unit(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(StatsError::InvalidConfig(format!(
            "{} must be in (0.0, 1.0) exclusive, got {}",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.confidence_level, 0.95);
        assert_eq!(config.minimum_sample_size, 100);
        assert_eq!(config.power_threshold, 0.8);
        assert_eq!(config.monte_carlo_samples, 100_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn presets_are_valid() {
        assert!(EngineConfig::strict().validate().is_ok());
        assert!(EngineConfig::permissive().validate().is_ok());
        assert_eq!(EngineConfig::strict().confidence_level, 0.99);
        assert_eq!(EngineConfig::permissive().confidence_level, 0.90);
    }

    #[test]
    fn alpha_is_complement_of_confidence() {
        let config = EngineConfig::default();
        assert!((config.alpha() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn set_confidence_level_rejects_bounds() {
        let mut config = EngineConfig::default();
        assert!(config.set_confidence_level(0.0).is_err());
        assert!(config.set_confidence_level(1.0).is_err());
        assert!(config.set_confidence_level(f64::NAN).is_err());
        assert_eq!(config.confidence_level, 0.95);
        assert!(config.set_confidence_level(0.9).is_ok());
        assert_eq!(config.confidence_level, 0.9);
    }

    #[test]
    fn set_minimum_sample_size_rejects_zero() {
        let mut config = EngineConfig::default();
        assert!(config.set_minimum_sample_size(0).is_err());
        assert!(config.set_minimum_sample_size(500).is_ok());
        assert_eq!(config.minimum_sample_size, 500);
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn validate_rejects_non_positive_mde() {
        let mut config = EngineConfig::default();
        config.minimum_detectable_effect = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn validate_rejects_zero_monte_carlo_samples() {
        let mut config = EngineConfig::default();
        config.monte_carlo_samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sequential_plan_ignores_unrelated_fields() {
        let config = EngineConfig {
            monte_carlo_samples: 0,
            minimum_detectable_effect: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(config.validate_sequential_plan().is_ok());

        let no_plan = EngineConfig {
            minimum_sample_size: 0,
            ..EngineConfig::default()
        };
        assert!(no_plan.validate_sequential_plan().is_err());
    }

    #[test]
    fn config_serializes_to_camel_case() {
        let json = serde_json::to_string(&EngineConfig::default()).unwrap();
        assert!(json.contains("confidenceLevel"));
        assert!(json.contains("minimumSampleSize"));
        assert!(!json.contains("confidence_level"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"confidenceLevel": 0.9}"#).unwrap();
        assert_eq!(config.confidence_level, 0.9);
        assert_eq!(config.minimum_sample_size, DEFAULT_MINIMUM_SAMPLE_SIZE);
    }
}
