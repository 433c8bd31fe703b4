//! Cell-related types
//!
//! This module contains:
//! - [`CellId`] - The packed identity of a cell used as a graph key
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangle of cells (e.g., "A1:B10")
//! - [`RangeAddress`] - A range qualified by its sheet
//! - [`CellValue`] / [`CellError`] - What a cell holds

mod address;
mod id;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator, RangeAddress};
pub use id::CellId;
pub use value::{CellError, CellValue, SharedString};
