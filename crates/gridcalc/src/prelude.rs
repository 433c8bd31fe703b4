//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    Calculator,
    CancellationToken,

    CellAddress,
    CellError,
    CellId,
    CellRange,
    // Cell types
    CellValue,
    // Data access
    DataProvider,

    // Error types
    Error,
    FormulaValue,
    Result,

    // Main types
    Workbook,
    // Extension traits
    WorkbookCalculationExt,
    Worksheet,
};
