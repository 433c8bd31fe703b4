//! Data access for the engine
//!
//! The evaluator, the lookup functions and the dependency chain never touch a
//! document directly. They go through [`DataProvider`], which hands out cell
//! values, formulas, ranges and defined names, and takes calculated results
//! back. [`Workbook`] implements it over the in-memory document.

use crate::error::{FormulaError, FormulaResult};
use crate::token::{tokenize, Token};
use crate::value::FormulaValue;
use gridcalc_core::{
    CellAddress, CellRange, CellValue, DateSystem, NameScope, NamedRange, RangeAddress, Workbook,
    Worksheet, MAX_COLS, MAX_ROWS,
};
use ahash::RandomState;

/// Fixed seeds keep name ids identical across runs
static NAME_IDS: RandomState = RandomState::with_seeds(
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// Everything the engine needs to know about a populated cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellInfo {
    pub address: CellAddress,
    pub row: u32,
    pub col: u16,
    /// Formula text including the leading `=`, for formula cells
    pub formula: Option<String>,
    /// Stored value, the last calculated result for formula cells
    pub value: CellValue,
    pub hidden_row: bool,
}

impl CellInfo {
    /// Numeric value, `None` for text, booleans, errors and blanks
    pub fn value_double(&self) -> Option<f64> {
        match &self.value {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value counting booleans as 1/0
    pub fn value_double_logical(&self) -> Option<f64> {
        match &self.value {
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => self.value_double(),
        }
    }

    /// Tokens of the formula, empty for value cells
    pub fn tokens(&self) -> FormulaResult<Vec<Token>> {
        self.formula.as_deref().map_or(Ok(Vec::new()), tokenize)
    }
}

/// A defined name as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct NameInfo {
    /// Stable key derived from the scope and the case-folded name
    pub id: u64,
    pub name: String,
    /// Owning sheet for sheet-scoped names
    pub worksheet: Option<usize>,
    /// Referenced expression without a leading `=`
    pub formula: String,
    /// Constant value when the name refers to a literal
    pub value: Option<FormulaValue>,
}

impl NameInfo {
    pub fn tokens(&self) -> FormulaResult<Vec<Token>> {
        tokenize(&self.formula)
    }

    fn from_named_range(range: &NamedRange) -> Self {
        let worksheet = match range.scope {
            NameScope::Workbook => None,
            NameScope::Sheet(sheet) => Some(sheet),
        };
        let id = NAME_IDS.hash_one((worksheet, range.name.to_lowercase()));

        let formula = range.expression().to_string();
        Self {
            id,
            name: range.name.clone(),
            worksheet,
            value: literal_value(&formula),
            formula,
        }
    }
}

fn literal_value(expression: &str) -> Option<FormulaValue> {
    match tokenize(expression).ok()?.as_slice() {
        [Token::Number(n)] => Some(FormulaValue::Number(*n)),
        [Token::Minus, Token::Number(n)] => Some(FormulaValue::Number(-n)),
        [Token::String(s)] => Some(FormulaValue::String(s.clone())),
        [Token::Boolean(b)] => Some(FormulaValue::Boolean(*b)),
        [Token::Error(e)] => Some(FormulaValue::Error(*e)),
        _ => None,
    }
}

/// A rectangle of cells fetched from a provider
pub trait RangeInfo {
    fn address(&self) -> RangeAddress;

    /// Populated cells in row-major order; every call starts over
    fn cells(&self) -> Box<dyn Iterator<Item = CellInfo> + '_>;

    /// Value at an absolute position, blank outside the range
    fn value(&self, row: u32, col: u16) -> CellValue;

    /// Value relative to the top-left corner
    fn offset(&self, row_offset: u32, col_offset: u16) -> CellValue {
        let start = self.address().range.start;
        match (
            start.row.checked_add(row_offset),
            start.col.checked_add(col_offset),
        ) {
            (Some(row), Some(col)) => self.value(row, col),
            _ => CellValue::Empty,
        }
    }

    /// Cells in the rectangle, populated or not
    fn cell_count(&self) -> u64 {
        self.address().range.cell_count()
    }

    /// No populated cell
    fn is_empty(&self) -> bool {
        self.cells().next().is_none()
    }

    /// More than one cell
    fn is_multi(&self) -> bool {
        self.address().range.is_multi()
    }
}

/// Pluggable access to the document being calculated.
///
/// Sheet indices are positions in the document; an unknown index is reported
/// as [`FormulaError::InvalidReference`], which the evaluator turns into
/// `#REF!`.
pub trait DataProvider {
    fn max_rows(&self) -> u32 {
        MAX_ROWS
    }

    fn max_columns(&self) -> u16 {
        MAX_COLS
    }

    fn sheet_count(&self) -> usize;

    fn sheet_index(&self, name: &str) -> Option<usize>;

    fn sheet_name(&self, sheet: usize) -> Option<String>;

    /// Stored value; for formula cells the last calculated result
    fn cell_value(&self, sheet: usize, row: u32, col: u16) -> CellValue;

    fn range(&self, sheet: usize, range: CellRange) -> FormulaResult<Box<dyn RangeInfo + '_>>;

    /// Range from an address such as `"A1:B3"` or `"Data!A1:B3"`; an explicit
    /// sheet in the address overrides `sheet`
    fn range_by_address(
        &self,
        sheet: usize,
        address: &str,
    ) -> FormulaResult<Box<dyn RangeInfo + '_>> {
        let (sheet_name, reference) = RangeAddress::split_sheet(address);
        let sheet = match sheet_name {
            Some(name) => self
                .sheet_index(&name)
                .ok_or_else(|| FormulaError::InvalidReference(format!("unknown sheet '{}'", name)))?,
            None => sheet,
        };
        let range = CellRange::parse(reference)?;
        self.range(sheet, range)
    }

    /// Formula text of a cell, `None` for value cells
    fn range_formula(&self, sheet: usize, row: u32, col: u16) -> Option<String>;

    fn range_formula_tokens(
        &self,
        sheet: usize,
        row: u32,
        col: u16,
    ) -> FormulaResult<Option<Vec<Token>>> {
        self.range_formula(sheet, row, col)
            .map(|formula| tokenize(&formula))
            .transpose()
    }

    /// Every formula cell of a sheet in row-major order
    fn formula_cells(&self, sheet: usize) -> Vec<(u32, u16, String)>;

    /// Resolve a name from a sheet: sheet scope first, then workbook scope
    fn name(&self, sheet: usize, name: &str) -> Option<NameInfo>;

    fn workbook_names(&self) -> Vec<NameInfo>;

    fn worksheet_names(&self, sheet: usize) -> Vec<NameInfo>;

    fn is_row_hidden(&self, sheet: usize, row: u32) -> bool;

    /// Bottom-right corner of the populated area
    fn dimension_end(&self, sheet: usize) -> Option<CellAddress>;

    fn date_system(&self) -> DateSystem {
        DateSystem::default()
    }

    /// Store a calculated result
    fn set_formula_result(
        &mut self,
        sheet: usize,
        row: u32,
        col: u16,
        value: CellValue,
    ) -> FormulaResult<()>;

    /// Drop any cached state before a calculation pass
    fn reset(&mut self) {}
}

/// [`RangeInfo`] over one worksheet of a [`Workbook`]
struct WorksheetRange<'a> {
    sheet: usize,
    worksheet: &'a Worksheet,
    range: CellRange,
}

impl RangeInfo for WorksheetRange<'_> {
    fn address(&self) -> RangeAddress {
        RangeAddress::new(self.sheet, self.range)
    }

    fn cells(&self) -> Box<dyn Iterator<Item = CellInfo> + '_> {
        Box::new(
            self.worksheet
                .cells_in(self.range)
                .map(move |(row, col, value)| CellInfo {
                    address: CellAddress::new(row, col),
                    row,
                    col,
                    formula: value.formula_text().map(str::to_string),
                    value: value.effective_value().clone(),
                    hidden_row: self.worksheet.is_row_hidden(row),
                }),
        )
    }

    fn value(&self, row: u32, col: u16) -> CellValue {
        if self.range.contains(row, col) {
            self.worksheet.get_calculated_value_at(row, col)
        } else {
            CellValue::Empty
        }
    }
}

fn worksheet_of(workbook: &Workbook, sheet: usize) -> FormulaResult<&Worksheet> {
    workbook.worksheet(sheet).ok_or_else(|| {
        FormulaError::InvalidReference(format!(
            "sheet index {} (count {})",
            sheet,
            workbook.sheet_count()
        ))
    })
}

impl DataProvider for Workbook {
    fn sheet_count(&self) -> usize {
        Workbook::sheet_count(self)
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        Workbook::sheet_index(self, name)
    }

    fn sheet_name(&self, sheet: usize) -> Option<String> {
        self.worksheet(sheet).map(|ws| ws.name().to_string())
    }

    fn cell_value(&self, sheet: usize, row: u32, col: u16) -> CellValue {
        self.worksheet(sheet)
            .map(|ws| ws.get_calculated_value_at(row, col))
            .unwrap_or_default()
    }

    fn range(&self, sheet: usize, range: CellRange) -> FormulaResult<Box<dyn RangeInfo + '_>> {
        let worksheet = worksheet_of(self, sheet)?;
        Ok(Box::new(WorksheetRange {
            sheet,
            worksheet,
            range,
        }))
    }

    fn range_formula(&self, sheet: usize, row: u32, col: u16) -> Option<String> {
        self.worksheet(sheet)?
            .get_formula_at(row, col)
            .map(str::to_string)
    }

    fn formula_cells(&self, sheet: usize) -> Vec<(u32, u16, String)> {
        self.worksheet(sheet)
            .map(|ws| {
                ws.formula_cells()
                    .map(|(row, col, text)| (row, col, text.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn name(&self, sheet: usize, name: &str) -> Option<NameInfo> {
        self.named_ranges()
            .get(name, sheet)
            .map(NameInfo::from_named_range)
    }

    fn workbook_names(&self) -> Vec<NameInfo> {
        self.named_ranges()
            .workbook_names()
            .into_iter()
            .map(NameInfo::from_named_range)
            .collect()
    }

    fn worksheet_names(&self, sheet: usize) -> Vec<NameInfo> {
        self.named_ranges()
            .sheet_names(sheet)
            .into_iter()
            .map(NameInfo::from_named_range)
            .collect()
    }

    fn is_row_hidden(&self, sheet: usize, row: u32) -> bool {
        self.worksheet(sheet)
            .is_some_and(|ws| ws.is_row_hidden(row))
    }

    fn dimension_end(&self, sheet: usize) -> Option<CellAddress> {
        self.worksheet(sheet)?.used_range().map(|r| r.end)
    }

    fn date_system(&self) -> DateSystem {
        self.settings().date_system()
    }

    fn set_formula_result(
        &mut self,
        sheet: usize,
        row: u32,
        col: u16,
        value: CellValue,
    ) -> FormulaResult<()> {
        let count = Workbook::sheet_count(self);
        self.worksheet_mut(sheet)
            .ok_or_else(|| {
                FormulaError::InvalidReference(format!("sheet index {} (count {})", sheet, count))
            })?
            .set_formula_result(row, col, value)
            .map_err(|e| FormulaError::Contract(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::CellError;
    use pretty_assertions::assert_eq;

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("B1", true).unwrap();
        ws.set_cell_formula("A2", "=A1*2").unwrap();
        ws.set_cell_value("C3", "text").unwrap();
        ws.set_row_hidden(1, true);
        wb.define_name("Rate", "0.05").unwrap();
        wb.define_name_for_sheet("Local", "=Sheet1!$A$1", 0).unwrap();
        wb
    }

    #[test]
    fn test_range_iteration_is_restartable() {
        let wb = sample();
        let range = DataProvider::range(&wb, 0, CellRange::parse("A1:C3").unwrap()).unwrap();
        let first: Vec<_> = range.cells().map(|c| c.address).collect();
        let second: Vec<_> = range.cells().map(|c| c.address).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(range.cell_count(), 9);
        assert!(range.is_multi());
        assert!(!range.is_empty());

        let blank = DataProvider::range(&wb, 1, CellRange::parse("A1:B2").unwrap()).unwrap();
        assert!(blank.is_empty());
    }

    #[test]
    fn test_cell_info_views() {
        let wb = sample();
        let range = DataProvider::range(&wb, 0, CellRange::parse("A1:B2").unwrap()).unwrap();
        let cells: Vec<_> = range.cells().collect();
        assert_eq!(cells[0].value_double(), Some(1.0));
        assert_eq!(cells[1].value_double(), None);
        assert_eq!(cells[1].value_double_logical(), Some(1.0));
        assert_eq!(cells[2].formula.as_deref(), Some("=A1*2"));
        assert!(cells[2].hidden_row);
        assert_eq!(cells[2].tokens().unwrap().len(), 3);
    }

    #[test]
    fn test_offset_and_value() {
        let wb = sample();
        let range = wb.range_by_address(1, "Sheet1!B2:C3").unwrap();
        assert_eq!(range.address().sheet, 0);
        assert_eq!(range.offset(1, 1), CellValue::string("text"));
        assert_eq!(range.value(0, 0), CellValue::Empty);
        assert!(wb.range_by_address(0, "Nope!A1").is_err());
    }

    #[test]
    fn test_names() {
        let wb = sample();
        let rate = wb.name(1, "RATE").unwrap();
        assert_eq!(rate.worksheet, None);
        assert_eq!(rate.value, Some(FormulaValue::Number(0.05)));
        assert_eq!(wb.name(0, "local").unwrap().formula, "Sheet1!$A$1");
        assert!(wb.name(1, "Local").is_none());
        assert_eq!(wb.workbook_names().len(), 1);
        assert_eq!(wb.worksheet_names(0).len(), 1);
        assert_eq!(wb.name(0, "Rate").unwrap().id, wb.name(1, "rate").unwrap().id);
    }

    #[test]
    fn test_name_ids() {
        let mut wb = sample();
        wb.define_name_for_sheet("Rate", "0.07", 1).unwrap();

        let global = wb.name(0, "RATE").unwrap();
        let scoped = wb.name(1, "rate").unwrap();
        assert_eq!(scoped.worksheet, Some(1));
        assert_ne!(global.id, scoped.id);
        assert_eq!(scoped.id, wb.name(1, "Rate").unwrap().id);

        // Ids depend only on scope and name, not on the workbook
        let other = sample();
        assert_eq!(other.name(0, "rate").unwrap().id, global.id);
        assert_eq!(other.name(0, "Local").unwrap().id, wb.name(0, "LOCAL").unwrap().id);
    }

    #[test]
    fn test_formula_access_and_write_back() {
        let mut wb = sample();
        assert_eq!(wb.formula_cells(0), vec![(1, 0, "=A1*2".to_string())]);
        assert_eq!(wb.range_formula_tokens(0, 0, 0).unwrap(), None);
        assert!(wb.range_formula_tokens(0, 1, 0).unwrap().is_some());
        assert_eq!(wb.dimension_end(0), Some(CellAddress::new(2, 2)));

        wb.set_formula_result(0, 1, 0, CellValue::Number(2.0)).unwrap();
        assert_eq!(wb.cell_value(0, 1, 0), CellValue::Number(2.0));
        assert!(matches!(
            wb.set_formula_result(0, 0, 0, CellValue::Error(CellError::Na)),
            Err(FormulaError::Contract(_))
        ));
        assert!(wb.set_formula_result(7, 0, 0, CellValue::Empty).is_err());
    }
}
