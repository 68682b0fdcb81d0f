pub mod bandit;
pub mod bayesian;
pub mod config;
pub mod distributions;
pub mod report;
pub mod sequential;
pub mod stats;
