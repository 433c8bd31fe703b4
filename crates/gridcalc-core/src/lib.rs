//! # gridcalc-core
//!
//! Core data structures for the gridcalc calculation engine.
//!
//! This crate provides the fundamental types the formula engine works over:
//! - [`CellId`] - Packed `(sheet, row, column)` key with a total order
//! - [`CellAddress`], [`CellRange`] and [`RangeAddress`] - Cell addressing and ranges
//! - [`CellValue`] and [`CellError`] - Cell values and the closed set of error values
//! - [`Workbook`], [`Worksheet`] - An in-memory document holding values and formulas
//! - [`ListValues`] - A validated list of choices for list-style data validation
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 42.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*2").unwrap();
//!
//! assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Number(42.0));
//! assert!(sheet.get_value("B1").unwrap().is_formula());
//! ```

pub mod cell;
pub mod date;
pub mod error;
pub mod named_range;
pub mod validation;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellError, CellId, CellRange, CellValue, RangeAddress, SharedString};
pub use date::DateSystem;
pub use error::{Error, Result};
pub use named_range::{NameScope, NamedRange, NamedRangeCollection};
pub use validation::{ListValues, MAX_LIST_LENGTH};
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
