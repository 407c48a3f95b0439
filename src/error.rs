//! src/error.rs
//! This module defines the error type shared by every solver, model and I/O routine in the
//! crate. Parameter problems are surfaced eagerly, solver failures are propagated to the
//! caller instead of panicking.

use ndarray::Array1;
use thiserror::Error;

/// The primary error type for all fallible operations in this library.
#[derive(Error, Debug)]
pub enum BdgError {
    // --- I/O and Parsing Errors ---
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML input")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to (de)serialize JSON record")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write CSV table")]
    Csv(#[from] csv::Error),

    // --- Invalid Parameters and Inputs ---
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("k-point {index} has non-finite coordinates: {k:?}")]
    InvalidKPoint { index: usize, k: Array1<f64> },

    #[error("Dimension mismatch for '{context}': expected {expected}, got {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Band index {band} is out of range for a model with {number_of_bands} bands")]
    InvalidBand { band: usize, number_of_bands: usize },

    #[error("Invalid k-point grid: {0}")]
    InvalidGrid(String),

    #[error("Unknown model name '{0}'")]
    UnknownModel(String),

    #[error("Calculation '{0}' not found, expected one of 'scf', 'crit-temp', 'q-loop'")]
    UnknownCalculation(String),

    // --- Linear Algebra and Solver Errors ---
    #[error("Hermitian eigendecomposition of a {size}x{size} matrix did not converge")]
    EigenDecomposition { size: usize },

    #[error("Self-consistency loop did not converge after {iterations} iterations (max_iter = {max_iter})")]
    NotConverged { iterations: usize, max_iter: usize },
}

impl BdgError {
    pub(crate) fn invalid_parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BdgError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for this library's operations.
pub type Result<T> = std::result::Result<T, BdgError>;
