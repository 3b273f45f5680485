//! Error types for the Quillon library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`QuillonError`] enum. Constructor helpers keep call sites short.
//!
//! # Examples
//!
//! ```
//! use quillon::error::{QuillonError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(QuillonError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Quillon operations.
#[derive(Error, Debug)]
pub enum QuillonError {
    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Schema-related errors (missing columns, wrong column kinds)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Training failures
    #[error("Training error: {0}")]
    Training(String),

    /// Not enough rows to fit an estimator
    #[error("Training data insufficient: need at least {min_samples} samples, got {actual}")]
    InsufficientTrainingData { min_samples: usize, actual: usize },

    /// Corrupt or incompatible model files
    #[error("Model format error: {0}")]
    ModelFormat(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with QuillonError.
pub type Result<T> = std::result::Result<T, QuillonError>;

impl QuillonError {
    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        QuillonError::Serialization(msg.into())
    }

    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        QuillonError::Schema(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        QuillonError::Analysis(msg.into())
    }

    /// Create a new training error.
    pub fn training<S: Into<String>>(msg: S) -> Self {
        QuillonError::Training(msg.into())
    }

    /// Create a new insufficient training data error.
    pub fn insufficient_data(min_samples: usize, actual: usize) -> Self {
        QuillonError::InsufficientTrainingData {
            min_samples,
            actual,
        }
    }

    /// Create a new model format error.
    pub fn model_format<S: Into<String>>(msg: S) -> Self {
        QuillonError::ModelFormat(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        QuillonError::InvalidConfig(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        QuillonError::InvalidArgument(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        QuillonError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = QuillonError::schema("Test schema error");
        assert_eq!(error.to_string(), "Schema error: Test schema error");

        let error = QuillonError::analysis("Test analysis error");
        assert_eq!(error.to_string(), "Analysis error: Test analysis error");

        let error = QuillonError::insufficient_data(2, 1);
        assert_eq!(
            error.to_string(),
            "Training data insufficient: need at least 2 samples, got 1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let quillon_error = QuillonError::from(io_error);

        match quillon_error {
            QuillonError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }
}
