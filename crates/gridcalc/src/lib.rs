//! # gridcalc
//!
//! A spreadsheet formula calculation engine.
//!
//! gridcalc orders the formula cells of a document by their dependencies,
//! detects circular references, and evaluates every formula with spreadsheet
//! semantics: errors travel as values, lookups search worksheet ranges, and
//! date arithmetic skips weekends and holidays.
//!
//! ## Features
//!
//! - Deterministic calculation order, stable across rebuilds
//! - Circular references flagged, or resolved iteratively when enabled
//! - Incremental recalculation of the cells downstream of an edit
//! - Cancellation between cell evaluations
//! - Any document can be calculated by implementing [`DataProvider`]
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*2").unwrap();
//! sheet.set_cell_formula("C1", "=IFERROR(B1/0, -1)").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 2);
//!
//! let sheet = workbook.worksheet(0).unwrap();
//! assert_eq!(sheet.get_calculated_value_at(0, 1), CellValue::Number(20.0));
//! assert_eq!(sheet.get_calculated_value_at(0, 2), CellValue::Number(-1.0));
//! ```

pub mod calculation;
pub mod error;
pub mod prelude;

pub use calculation::{
    CalculationOptions, CalculationStats, Calculator, CancellationToken, WorkbookCalculationExt,
};
pub use error::{Error, Result};

// Re-export core types
pub use gridcalc_core::{
    CellAddress, CellError, CellId, CellRange, CellValue, DateSystem, ListValues, NameScope,
    NamedRange, RangeAddress, Workbook, WorkbookSettings, Worksheet, MAX_COLS, MAX_ROWS,
};

// Re-export formula types
pub use gridcalc_formula::{
    evaluate, evaluate_tokens, parse_formula, tokenize, CellInfo, DataProvider, DependencyChain,
    EvaluationContext, EvaluationOptions, FormulaCell, FormulaError, FormulaExpr, FormulaResult,
    FormulaValue, NameInfo, RangeInfo, Weekend, WorkdayCalculator, WorkdayCalculatorResult,
    WorkdayDirection,
};
