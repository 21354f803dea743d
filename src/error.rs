//! Error types for state-space assembly and analysis

use thiserror::Error;

/// Main error type for LTI operations
#[derive(Error, Debug)]
pub enum LtiError {
    #[error("Variable '{0}' not found")]
    VariableNotFound(String),

    #[error("Variable '{0}' already exists")]
    DuplicateVariable(String),

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("Sample interval mismatch: {left:?} vs {right:?}")]
    TimestepMismatch {
        left: Option<f64>,
        right: Option<f64>,
    },

    #[error("Singular matrix in {0}")]
    SingularMatrix(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for LTI operations
pub type LtiResult<T> = Result<T, LtiError>;

impl LtiError {
    /// Shorthand for a shape error with formatted dimensions
    pub fn shape(context: &str, expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            context: context.to_string(),
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", found.0, found.1),
        }
    }
}
