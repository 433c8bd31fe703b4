//! Error types for gridcalc

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a calculation pass
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Document access failed
    #[error(transparent)]
    Core(#[from] gridcalc_core::Error),

    /// The engine was driven outside its contract
    #[error(transparent)]
    Formula(#[from] gridcalc_formula::FormulaError),
}
