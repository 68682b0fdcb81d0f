//! Conversion-experiment statistics: two-proportion significance, Bayesian
//! win probability, sequential stopping boundaries, Thompson sampling and
//! report assembly over aggregate `{visitors, conversions}` counts.

pub mod engine;
pub mod error;
pub mod experiments;
pub mod types;

pub use engine::StatsEngine;
pub use error::{Result, StatsError};
pub use experiments::bandit::{thompson_sampling, BanditRecommendation};
pub use experiments::bayesian::{
    calculate_bayesian_probability, calculate_bayesian_probability_random, BayesianResult,
};
#[cfg(feature = "async")]
pub use experiments::bayesian::spawn_bayesian_probability;
pub use experiments::config::EngineConfig;
pub use experiments::report::{create_test_report, Report, VariantSummary};
pub use experiments::sequential::{sequential_test, SequentialTestDecision, SpendingFunction};
pub use experiments::stats::{
    calculate_sample_size, calculate_significance, calculate_significance_with,
    check_sample_ratio_mismatch, Interval, SignificanceResult,
};
pub use types::{ExperimentData, ExperimentStatus, VariantObservation};
