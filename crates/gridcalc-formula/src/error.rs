//! Formula error types
//!
//! These are hard failures of the engine. Spreadsheet errors such as `#DIV/0!`
//! are values ([`gridcalc_core::CellError`]) and never appear here.

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// Formula text could not be tokenized or parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The engine was driven in a way its callers promised never to do
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Reference outside the worksheet or to a missing cell store
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A defined name refers back to itself while being evaluated
    #[error("Circular reference through defined name '{0}'")]
    CircularReference(String),
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(e: gridcalc_core::Error) -> Self {
        FormulaError::InvalidReference(e.to_string())
    }
}
