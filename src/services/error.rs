// src/services/error.rs
use thiserror::Error;

/// Failures the allocation core can surface. Every variant is raised at the
/// point of detection and propagates unmodified to the API boundary; the core
/// never substitutes a default result for a genuine computation failure.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("degenerate capitalization weights: {0}")]
    DegenerateWeights(String),

    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    #[error("infeasible optimization: {0}")]
    InfeasibleOptimization(String),

    #[error("invalid view: {0}")]
    InvalidView(String),
}

impl ModelError {
    /// Symbolic kind exposed to clients in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::DataUnavailable(_) => "DataUnavailable",
            ModelError::InsufficientHistory(_) => "InsufficientHistory",
            ModelError::DegenerateWeights(_) => "DegenerateWeights",
            ModelError::SingularMatrix(_) => "SingularMatrix",
            ModelError::InfeasibleOptimization(_) => "InfeasibleOptimization",
            ModelError::InvalidView(_) => "InvalidView",
        }
    }
}
