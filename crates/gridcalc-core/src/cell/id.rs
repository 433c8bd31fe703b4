//! Packed cell identity

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;

const COL_BITS: u32 = 14;
const ROW_BITS: u32 = 20;
const COL_MASK: u64 = (1 << COL_BITS) - 1;
const ROW_MASK: u64 = (1 << ROW_BITS) - 1;
const SHEET_SHIFT: u32 = COL_BITS + ROW_BITS;

/// Largest sheet index that fits in the packed layout.
pub const MAX_SHEET_INDEX: usize = (1 << (64 - SHEET_SHIFT)) - 1;

/// Unique key for a cell across the whole workbook.
///
/// Layout (64 bits):
/// ```text
/// [63:34] sheet  (30 bits)
/// [33:14] row    (20 bits) - 0 to 1,048,575
/// [13:0]  column (14 bits) - 0 to 16,383
/// ```
///
/// Because the sheet occupies the high bits and the column the low bits, the
/// derived ordering compares sheet first, then row, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellId(u64);

impl CellId {
    /// Pack a `(sheet, row, col)` triple.
    ///
    /// Fails when any part lies outside the worksheet bounds.
    pub fn new(sheet: usize, row: u32, col: u16) -> Result<Self> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        if sheet > MAX_SHEET_INDEX {
            return Err(Error::SheetOutOfBounds(sheet, MAX_SHEET_INDEX + 1));
        }
        Ok(Self(
            (sheet as u64) << SHEET_SHIFT | (row as u64) << COL_BITS | col as u64,
        ))
    }

    #[inline]
    pub fn sheet(self) -> usize {
        (self.0 >> SHEET_SHIFT) as usize
    }

    #[inline]
    pub fn row(self) -> u32 {
        ((self.0 >> COL_BITS) & ROW_MASK) as u32
    }

    #[inline]
    pub fn col(self) -> u16 {
        (self.0 & COL_MASK) as u16
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]{}{}",
            self.sheet(),
            super::CellAddress::column_to_letters(self.col()),
            self.row() + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_id_unpacks() {
        let id = CellId::new(3, 1_048_575, 16_383).unwrap();
        assert_eq!(id.sheet(), 3);
        assert_eq!(id.row(), 1_048_575);
        assert_eq!(id.col(), 16_383);

        let zero = CellId::new(0, 0, 0).unwrap();
        assert_eq!(zero.as_u64(), 0);
    }

    #[test]
    fn test_cell_id_ordering() {
        let a = CellId::new(0, 5, 9).unwrap();
        let b = CellId::new(0, 6, 0).unwrap();
        let c = CellId::new(1, 0, 0).unwrap();
        let d = CellId::new(0, 5, 10).unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(a < d);
        assert!(d < b);
    }

    #[test]
    fn test_cell_id_distinct() {
        let ids = [
            CellId::new(0, 0, 1).unwrap(),
            CellId::new(0, 1, 0).unwrap(),
            CellId::new(1, 0, 0).unwrap(),
        ];
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[test]
    fn test_cell_id_out_of_bounds() {
        assert!(matches!(
            CellId::new(0, MAX_ROWS, 0),
            Err(Error::RowOutOfBounds(..))
        ));
        assert!(matches!(
            CellId::new(0, 0, MAX_COLS),
            Err(Error::ColumnOutOfBounds(..))
        ));
    }

    #[test]
    fn test_cell_id_display() {
        assert_eq!(CellId::new(0, 0, 0).unwrap().to_string(), "[0]A1");
        assert_eq!(CellId::new(2, 9, 27).unwrap().to_string(), "[2]AB10");
    }
}
