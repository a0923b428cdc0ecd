//! Error types for the liftsense study

use thiserror::Error;

/// Result type alias for study operations
pub type Result<T> = std::result::Result<T, LiftError>;

/// Main error type for the study
#[derive(Error, Debug)]
pub enum LiftError {
    #[error("Download error: {0}")]
    Download(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Quiz table is missing training columns: {}", missing.join(", "))]
    ColumnMismatch { missing: Vec<String> },

    #[error("No predictor passed the correlation thresholds")]
    NoFeaturesSelected,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polars::error::PolarsError> for LiftError {
    fn from(err: polars::error::PolarsError) -> Self {
        LiftError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for LiftError {
    fn from(err: serde_json::Error) -> Self {
        LiftError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LiftError {
    fn from(err: toml::de::Error) -> Self {
        LiftError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for LiftError {
    fn from(err: reqwest::Error) -> Self {
        LiftError::Download(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LiftError {
    fn from(err: ndarray::ShapeError) -> Self {
        LiftError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LiftError::Data("bad row".to_string());
        assert_eq!(err.to_string(), "Data error: bad row");
    }

    #[test]
    fn test_column_mismatch_lists_columns() {
        let err = LiftError::ColumnMismatch {
            missing: vec!["roll_belt".to_string(), "yaw_arm".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Quiz table is missing training columns: roll_belt, yaw_arm"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LiftError = io_err.into();
        assert!(matches!(err, LiftError::Io(_)));
    }
}
