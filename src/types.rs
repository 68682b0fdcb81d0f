use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// Aggregate counts for one variant (arm) of an experiment.
///
/// Counts are unsigned, so negative or non-numeric values are rejected when
/// the observation is deserialized. Everything else is checked by
/// [`VariantObservation::validate`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VariantObservation {
    pub visitors: u64,
    pub conversions: u64,
}

impl VariantObservation {
    pub fn new(visitors: u64, conversions: u64) -> Self {
        Self {
            visitors,
            conversions,
        }
    }

    /// Observed conversion rate. Zero when the variant has no visitors.
    pub fn conversion_rate(&self) -> f64 {
        if self.visitors == 0 {
            return 0.0;
        }
        self.conversions as f64 / self.visitors as f64
    }

    /// Checks `conversions <= visitors`. Zero visitors is allowed.
    pub fn validate_counts(&self, label: &str) -> Result<()> {
        if self.conversions > self.visitors {
            return Err(StatsError::InvalidInput(format!(
                "{}: conversions ({}) exceed visitors ({})",
                label, self.conversions, self.visitors
            )));
        }
        Ok(())
    }

    /// Checks the counts and additionally requires `visitors > 0`, which any
    /// rate-based computation needs.
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.visitors == 0 {
            return Err(StatsError::InvalidInput(format!(
                "{}: visitors must be > 0",
                label
            )));
        }
        self.validate_counts(label)
    }

    /// Beta posterior parameters under a uniform Beta(1, 1) prior.
    pub(crate) fn posterior(&self) -> (f64, f64) {
        let alpha = self.conversions as f64 + 1.0;
        let beta = self.visitors.saturating_sub(self.conversions) as f64 + 1.0;
        (alpha, beta)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Draft,
    #[default]
    Running,
    Paused,
    Complete,
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Input to report generation.
///
/// `variants` keeps insertion order: the first entry is the control and the
/// second is the treatment when significance is computed.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentData {
    pub name: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ExperimentStatus,
    pub variants: IndexMap<String, VariantObservation>,
    /// Planned share of traffic sent to the treatment. Defaults to 0.5.
    #[serde(default)]
    pub traffic_split: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_rate_is_ratio() {
        let obs = VariantObservation::new(1000, 140);
        assert!((obs.conversion_rate() - 0.14).abs() < 1e-12);
    }

    #[test]
    fn conversion_rate_zero_visitors_is_zero() {
        assert_eq!(VariantObservation::new(0, 0).conversion_rate(), 0.0);
    }

    #[test]
    fn validate_rejects_zero_visitors() {
        let err = VariantObservation::new(0, 0).validate("control").unwrap_err();
        assert!(matches!(err, StatsError::InvalidInput(_)));
        assert!(err.to_string().contains("control"));
    }

    #[test]
    fn validate_rejects_conversions_above_visitors() {
        assert!(VariantObservation::new(10, 11).validate("treatment").is_err());
        assert!(VariantObservation::new(10, 11)
            .validate_counts("treatment")
            .is_err());
    }

    #[test]
    fn validate_counts_allows_empty_arm() {
        assert!(VariantObservation::new(0, 0).validate_counts("arm").is_ok());
    }

    #[test]
    fn posterior_uses_uniform_prior() {
        let (a, b) = VariantObservation::new(100, 10).posterior();
        assert_eq!(a, 11.0);
        assert_eq!(b, 91.0);
    }

    #[test]
    fn negative_counts_fail_to_deserialize() {
        let parsed: std::result::Result<VariantObservation, _> =
            serde_json::from_str(r#"{"visitors": 100, "conversions": -1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn non_numeric_counts_fail_to_deserialize() {
        let parsed: std::result::Result<VariantObservation, _> =
            serde_json::from_str(r#"{"visitors": "lots", "conversions": 1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn experiment_data_preserves_variant_order() {
        let json = r#"{
            "name": "Hero headline",
            "status": "complete",
            "variants": {
                "zeta": {"visitors": 10, "conversions": 1},
                "alpha": {"visitors": 10, "conversions": 2}
            }
        }"#;
        let data: ExperimentData = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = data.variants.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(data.status, ExperimentStatus::Complete);
        assert!(data.start_date.is_none());
    }

    #[test]
    fn experiment_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ExperimentStatus::Complete).unwrap(),
            "\"complete\""
        );
        assert_eq!(ExperimentStatus::Paused.to_string(), "paused");
    }
}
