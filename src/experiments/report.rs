use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::EngineConfig;
use super::stats::{
    calculate_significance_with, check_sample_ratio_mismatch, format_confidence, format_percent,
    SignificanceResult,
};
use crate::types::{ExperimentData, ExperimentStatus, VariantObservation};

const DEFAULT_TRAFFIC_SPLIT: f64 = 0.5;
const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariantSummary {
    pub key: String,
    pub visitors: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
    pub conversion_rate_display: String,
}

impl VariantSummary {
    fn from_observation(key: &str, obs: &VariantObservation) -> Self {
        let conversion_rate = obs.conversion_rate();
        Self {
            key: key.to_string(),
            visitors: obs.visitors,
            conversions: obs.conversions,
            conversion_rate,
            conversion_rate_display: format_percent(conversion_rate),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub experiment_name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration_days: Option<f64>,
    pub status: ExperimentStatus,
    pub variants: Vec<VariantSummary>,
    pub total_visitors: u64,
    pub total_conversions: u64,
    pub significance: Option<SignificanceResult>,
    /// Key of the winning variant. Only set for a completed two-variant
    /// experiment with a significant, non-zero difference.
    pub winner: Option<String>,
    /// Confidence level label (`"95%"`) backing `winner`.
    pub confidence: Option<String>,
    pub sample_ratio_mismatch: bool,
    pub recommendations: Vec<String>,
    /// Validation failure that prevented significance from being computed.
    pub error: Option<String>,
}

/// Builds a report for `data`. The first variant is the control and the
/// second the treatment.
///
/// Invalid counts do not fail the call: the message lands in
/// [`Report::error`] and no winner is declared.
pub fn create_test_report(data: &ExperimentData, config: &EngineConfig) -> Report {
    let variants: Vec<VariantSummary> = data
        .variants
        .iter()
        .map(|(key, obs)| VariantSummary::from_observation(key, obs))
        .collect();
    let total_visitors = data
        .variants
        .values()
        .fold(0u64, |acc, v| acc.saturating_add(v.visitors));
    let total_conversions = data
        .variants
        .values()
        .fold(0u64, |acc, v| acc.saturating_add(v.conversions));

    let duration_days = match (data.start_date, data.end_date) {
        (Some(start), Some(end)) => {
            Some((end - start).num_milliseconds() as f64 / MILLIS_PER_DAY)
        }
        _ => None,
    };

    let mut report = Report {
        experiment_name: data.name.clone(),
        start_date: data.start_date,
        end_date: data.end_date,
        duration_days,
        status: data.status,
        variants,
        total_visitors,
        total_conversions,
        significance: None,
        winner: None,
        confidence: None,
        sample_ratio_mismatch: false,
        recommendations: Vec::new(),
        error: None,
    };

    let mut arms = data.variants.iter();
    let (control, treatment) = match (arms.next(), arms.next()) {
        (Some(control), Some(treatment)) => (control, treatment),
        _ => {
            report.recommendations.push(format!(
                "At least two variants are needed to compare results ({} supplied).",
                data.variants.len()
            ));
            return report;
        }
    };
    let (control_key, control_obs) = control;
    let (treatment_key, treatment_obs) = treatment;

    let expected_split = data.traffic_split.unwrap_or(DEFAULT_TRAFFIC_SPLIT);
    report.sample_ratio_mismatch =
        check_sample_ratio_mismatch(control_obs.visitors, treatment_obs.visitors, expected_split);
    if report.sample_ratio_mismatch {
        tracing::warn!(
            experiment = %data.name,
            control_visitors = control_obs.visitors,
            treatment_visitors = treatment_obs.visitors,
            expected_split,
            "sample ratio mismatch detected"
        );
        report.recommendations.push(
            "Sample ratio mismatch detected. Investigate assignment before trusting the results."
                .to_string(),
        );
    }

    let significance = match calculate_significance_with(control_obs, treatment_obs, config) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(experiment = %data.name, error = %e, "report significance skipped");
            report.error = Some(e.to_string());
            return report;
        }
    };

    if data.variants.len() > 2 {
        report.recommendations.push(format!(
            "Significance compares '{}' against '{}' only; {} further variants are not evaluated.",
            treatment_key,
            control_key,
            data.variants.len() - 2
        ));
    }
    report
        .recommendations
        .extend(significance.recommendations.iter().cloned());

    if data.variants.len() == 2
        && data.status == ExperimentStatus::Complete
        && significance.is_significant
    {
        // Relative lift is reported as 0 over a 0% control, so the sign is
        // read from the absolute difference.
        report.winner = if significance.absolute_improvement > 0.0 {
            Some(treatment_key.clone())
        } else if significance.absolute_improvement < 0.0 {
            Some(control_key.clone())
        } else {
            None
        };
        if report.winner.is_some() {
            report.confidence = Some(format_confidence(config.confidence_level));
        }
    }

    report.significance = Some(significance);
    report
}

impl Report {
    /// Plain-text rendering for terminals and logs.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Experiment: {}", self.experiment_name)?;
        writeln!(f, "Status: {}", self.status)?;
        if let Some(start) = self.start_date {
            writeln!(f, "Started: {}", start.to_rfc3339())?;
        }
        if let Some(end) = self.end_date {
            writeln!(f, "Ended: {}", end.to_rfc3339())?;
        }
        if let Some(days) = self.duration_days {
            writeln!(f, "Duration: {:.1} days", days)?;
        }

        writeln!(f)?;
        writeln!(f, "Variants:")?;
        for v in &self.variants {
            writeln!(
                f,
                "  {:<16} {:>10} visitors {:>10} conversions  {}",
                v.key, v.visitors, v.conversions, v.conversion_rate_display
            )?;
        }
        writeln!(
            f,
            "  {:<16} {:>10} visitors {:>10} conversions",
            "total", self.total_visitors, self.total_conversions
        )?;

        if let Some(sig) = &self.significance {
            writeln!(f)?;
            writeln!(
                f,
                "Relative improvement: {} (absolute {})",
                sig.display.relative_improvement, sig.display.absolute_improvement
            )?;
            writeln!(f, "z = {:.4}, p = {:.4}", sig.z_score, sig.p_value)?;
            writeln!(
                f,
                "{} CI on difference: {}",
                format_confidence(sig.confidence_level),
                sig.display.confidence_interval
            )?;
            writeln!(f, "Power: {}", sig.display.power)?;
        }

        writeln!(f)?;
        match (&self.winner, &self.confidence) {
            (Some(winner), Some(confidence)) => {
                writeln!(f, "Winner: {} ({} confidence)", winner, confidence)?
            }
            _ => writeln!(f, "Winner: none")?,
        }
        if let Some(error) = &self.error {
            writeln!(f, "Error: {}", error)?;
        }

        if !self.recommendations.is_empty() {
            writeln!(f)?;
            writeln!(f, "Recommendations:")?;
            for rec in &self.recommendations {
                writeln!(f, "  - {}", rec)?;
            }
        }
        Ok(())
    }
}
