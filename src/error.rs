use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Domain error: {0}")]
    Domain(String),

    #[error("No variants supplied")]
    NoVariants,

    #[error("Gamma sampler rejected {attempts} proposals for shape {shape}")]
    SamplingExhausted { shape: f64, attempts: usize },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Background worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

impl From<std::io::Error> for StatsError {
    fn from(e: std::io::Error) -> Self {
        StatsError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(e: serde_json::Error) -> Self {
        StatsError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_message_includes_reason() {
        let err = StatsError::InvalidInput("control: visitors must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid input: control: visitors must be > 0"
        );
    }

    #[test]
    fn json_error_converts_via_from() {
        let parse_err = serde_json::from_str::<u64>("not a number").unwrap_err();
        let err: StatsError = parse_err.into();
        assert!(matches!(err, StatsError::Json(_)));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: StatsError = io.into();
        assert_eq!(err, StatsError::Io("missing.json".to_string()));
    }
}
