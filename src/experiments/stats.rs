use serde::{Deserialize, Serialize};

use super::config::EngineConfig;
use super::distributions::{inverse_normal_cdf, normal_cdf, normal_sf, two_tailed_critical_value};
use crate::error::{Result, StatsError};
use crate::types::VariantObservation;

/// Absolute lift (in rate units) below which a significant result is called
/// out as possibly not worth shipping: 5 percentage points.
pub const MIN_PRACTICAL_EFFECT: f64 = 0.05;

/// p-value under which a non-significant result is reported as marginal.
pub const MARGINAL_P_VALUE: f64 = 0.10;

/// Chi-squared critical value for df=1 at p=0.01.
const SRM_CHI2_CRITICAL: f64 = 6.635;

// ── Result Structs ──────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Pre-formatted percentages (two decimals) for display layers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignificanceDisplay {
    pub control_rate: String,
    pub treatment_rate: String,
    pub relative_improvement: String,
    pub absolute_improvement: String,
    pub confidence_interval: String,
    pub power: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignificanceResult {
    pub control_rate: f64,
    pub treatment_rate: f64,
    /// Computed with the pooled standard error.
    pub z_score: f64,
    /// Two-tailed.
    pub p_value: f64,
    pub confidence_level: f64,
    pub is_significant: bool,
    /// Interval on `treatment_rate - control_rate`, computed with the
    /// unpooled standard error.
    pub confidence_interval: Interval,
    pub relative_improvement: f64,
    pub absolute_improvement: f64,
    pub power: f64,
    pub recommendations: Vec<String>,
    pub display: SignificanceDisplay,
}

// ── Two-Proportion Z-Test ───────────────────────────────────────────

/// Pooled two-proportion z-test of treatment against control with default
/// thresholds for everything except the confidence level.
///
/// # Example
/// ```
/// use variantlab::{calculate_significance, VariantObservation};
///
/// let control = VariantObservation::new(1000, 100);
/// let treatment = VariantObservation::new(1000, 140);
/// let result = calculate_significance(&control, &treatment, 0.95).unwrap();
/// assert!(result.is_significant);
/// assert!((result.relative_improvement - 0.4).abs() < 1e-9);
/// ```
pub fn calculate_significance(
    control: &VariantObservation,
    treatment: &VariantObservation,
    confidence_level: f64,
) -> Result<SignificanceResult> {
    let config = EngineConfig {
        confidence_level,
        ..EngineConfig::default()
    };
    calculate_significance_with(control, treatment, &config)
}

/// Same as [`calculate_significance`], taking every threshold from `config`.
pub fn calculate_significance_with(
    control: &VariantObservation,
    treatment: &VariantObservation,
    config: &EngineConfig,
) -> Result<SignificanceResult> {
    control.validate("control")?;
    treatment.validate("treatment")?;
    if !(config.confidence_level > 0.0 && config.confidence_level < 1.0) {
        return Err(StatsError::InvalidInput(format!(
            "confidence level must be in (0, 1), got {}",
            config.confidence_level
        )));
    }

    let p1 = control.conversion_rate();
    let p2 = treatment.conversion_rate();
    let n1 = control.visitors as f64;
    let n2 = treatment.visitors as f64;

    let pooled_se = pooled_standard_error(control, treatment);
    let unpooled_se = (p1 * (1.0 - p1) / n1 + p2 * (1.0 - p2) / n2).sqrt();

    let z = if pooled_se > 0.0 {
        (p2 - p1) / pooled_se
    } else {
        0.0
    };
    let p_value = (2.0 * normal_sf(z.abs())).clamp(0.0, 1.0);
    let is_significant = p_value < config.alpha();

    let z_crit = two_tailed_critical_value(config.confidence_level)?;
    let absolute_improvement = p2 - p1;
    let relative_improvement = if p1 != 0.0 {
        absolute_improvement / p1
    } else {
        0.0
    };
    let confidence_interval = Interval {
        lower: absolute_improvement - z_crit * unpooled_se,
        upper: absolute_improvement + z_crit * unpooled_se,
    };
    let power = statistical_power(absolute_improvement, pooled_se, unpooled_se, z_crit);

    let recommendations = recommendations(
        control,
        treatment,
        p_value,
        is_significant,
        absolute_improvement,
        power,
        config,
    );

    tracing::debug!(
        control_rate = p1,
        treatment_rate = p2,
        z_score = z,
        p_value,
        power,
        "significance computed"
    );

    Ok(SignificanceResult {
        control_rate: p1,
        treatment_rate: p2,
        z_score: z,
        p_value,
        confidence_level: config.confidence_level,
        is_significant,
        confidence_interval,
        relative_improvement,
        absolute_improvement,
        power,
        recommendations,
        display: SignificanceDisplay {
            control_rate: format_percent(p1),
            treatment_rate: format_percent(p2),
            relative_improvement: format_signed_percent(relative_improvement),
            absolute_improvement: format_signed_percent(absolute_improvement),
            confidence_interval: format!(
                "[{}, {}]",
                format_signed_percent(confidence_interval.lower),
                format_signed_percent(confidence_interval.upper)
            ),
            power: format_percent(power),
        },
    })
}

/// Standard error of the rate difference under the null (pooled proportion).
fn pooled_standard_error(control: &VariantObservation, treatment: &VariantObservation) -> f64 {
    let n1 = control.visitors as f64;
    let n2 = treatment.visitors as f64;
    let pooled = (control.conversions as f64 + treatment.conversions as f64) / (n1 + n2);
    (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt()
}

/// Pooled z-score of treatment against control. Inputs must already be validated.
pub(crate) fn pooled_z_score(control: &VariantObservation, treatment: &VariantObservation) -> f64 {
    let se = pooled_standard_error(control, treatment);
    if se > 0.0 {
        (treatment.conversion_rate() - control.conversion_rate()) / se
    } else {
        0.0
    }
}

/// Approximate power: `Φ((|Δ| - z_crit·SE_pooled) / SE_unpooled)`.
fn statistical_power(delta: f64, pooled_se: f64, unpooled_se: f64, z_crit: f64) -> f64 {
    if unpooled_se == 0.0 {
        return if delta != 0.0 { 1.0 } else { 0.0 };
    }
    normal_cdf((delta.abs() - z_crit * pooled_se) / unpooled_se)
}

fn recommendations(
    control: &VariantObservation,
    treatment: &VariantObservation,
    p_value: f64,
    is_significant: bool,
    absolute_improvement: f64,
    power: f64,
    config: &EngineConfig,
) -> Vec<String> {
    let mut recs = Vec::new();

    let smallest_arm = control.visitors.min(treatment.visitors);
    if smallest_arm < config.minimum_sample_size {
        recs.push(format!(
            "Sample size is below the minimum of {} visitors per variant ({} so far). Keep the test running before drawing conclusions.",
            config.minimum_sample_size, smallest_arm
        ));
    }

    if is_significant {
        let leader = if absolute_improvement >= 0.0 {
            "Treatment"
        } else {
            "Control"
        };
        recs.push(format!(
            "{} wins with statistical significance at {} confidence (p = {:.4}).",
            leader,
            format_confidence(config.confidence_level),
            p_value
        ));
    } else if p_value < MARGINAL_P_VALUE {
        recs.push(format!(
            "Result is marginally significant (p = {:.4}). Consider running the test longer.",
            p_value
        ));
    } else {
        recs.push(format!(
            "No significant difference detected (p = {:.4}).",
            p_value
        ));
    }

    if power < config.power_threshold {
        recs.push(format!(
            "Statistical power is {}, below the {} target. The test may miss a real effect.",
            format_percent(power),
            format_percent(config.power_threshold)
        ));
    }

    if is_significant && absolute_improvement.abs() < MIN_PRACTICAL_EFFECT {
        recs.push(format!(
            "The difference of {} is below {:.0} percentage points and may not be practically meaningful.",
            format_signed_percent(absolute_improvement),
            MIN_PRACTICAL_EFFECT * 100.0
        ));
    }

    recs
}

// ── Sample Size Estimator ───────────────────────────────────────────

/// Two-proportion power analysis.
/// Returns visitors needed per variant to detect a relative lift of
/// `minimum_detectable_effect` over `baseline_conversion`.
pub fn calculate_sample_size(
    baseline_conversion: f64,
    minimum_detectable_effect: f64,
    confidence_level: f64,
    power: f64,
) -> Result<u64> {
    if !(baseline_conversion > 0.0 && baseline_conversion < 1.0) {
        return Err(StatsError::InvalidInput(format!(
            "baseline conversion must be in (0, 1), got {}",
            baseline_conversion
        )));
    }
    if !(minimum_detectable_effect.is_finite() && minimum_detectable_effect > 0.0) {
        return Err(StatsError::InvalidInput(format!(
            "minimum detectable effect must be > 0, got {}",
            minimum_detectable_effect
        )));
    }

    let p1 = baseline_conversion;
    let p2 = baseline_conversion * (1.0 + minimum_detectable_effect);
    if p2 >= 1.0 {
        return Err(StatsError::InvalidInput(format!(
            "baseline {} lifted by {} exceeds a rate of 1",
            baseline_conversion, minimum_detectable_effect
        )));
    }
    let delta = p2 - p1;

    let z_alpha = two_tailed_critical_value(confidence_level)
        .map_err(|_| StatsError::InvalidInput(format!("invalid confidence level {}", confidence_level)))?;
    let z_power = inverse_normal_cdf(power)
        .map_err(|_| StatsError::InvalidInput(format!("invalid power {}", power)))?;

    let p_bar = (p1 + p2) / 2.0;

    // n = (z_alpha * sqrt(2*p_bar*(1-p_bar)) + z_power * sqrt(p1*(1-p1) + p2*(1-p2)))^2 / delta^2
    let numerator = z_alpha * (2.0 * p_bar * (1.0 - p_bar)).sqrt()
        + z_power * (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt();
    let per_variant = (numerator.powi(2) / delta.powi(2)).ceil();

    Ok(per_variant as u64)
}

// ── SRM Detection ───────────────────────────────────────────────────

/// Chi-squared test for sample ratio mismatch.
/// Returns true if chi2 > 6.635 (p=0.01 threshold).
pub fn check_sample_ratio_mismatch(
    control_n: u64,
    treatment_n: u64,
    expected_treatment_fraction: f64,
) -> bool {
    let total = control_n as f64 + treatment_n as f64;
    if total == 0.0 {
        return false;
    }
    let expected_control = total * (1.0 - expected_treatment_fraction);
    let expected_treatment = total * expected_treatment_fraction;

    if expected_control <= 0.0 || expected_treatment <= 0.0 {
        return false;
    }

    let chi2 = (control_n as f64 - expected_control).powi(2) / expected_control
        + (treatment_n as f64 - expected_treatment).powi(2) / expected_treatment;

    chi2 > SRM_CHI2_CRITICAL
}

// ── Formatting ──────────────────────────────────────────────────────

/// `0.1234` → `"12.34%"`.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// `0.4` → `"+40.00%"`.
pub fn format_signed_percent(value: f64) -> String {
    format!("{:+.2}%", value * 100.0)
}

/// Confidence level as a percentage label: `0.95` → `"95%"`, `0.975` → `"97.5%"`.
pub fn format_confidence(level: f64) -> String {
    let pct = (level * 10_000.0).round() / 100.0;
    if pct.fract() == 0.0 {
        format!("{:.0}%", pct)
    } else {
        format!("{}%", pct)
    }
}
