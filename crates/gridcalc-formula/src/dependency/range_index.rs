use ahash::AHashMap;
use gridcalc_core::CellRange;
use std::collections::BTreeMap;

/// Formula cells keyed by `(sheet, column)`, rows sorted, so a range
/// reference finds the formula cells inside it without visiting empty cells.
#[derive(Debug, Default)]
pub(crate) struct RangeIndex {
    columns: AHashMap<(usize, u16), BTreeMap<u32, usize>>,
}

impl RangeIndex {
    pub(crate) fn insert(&mut self, sheet: usize, row: u32, col: u16, position: usize) {
        self.columns
            .entry((sheet, col))
            .or_default()
            .insert(row, position);
    }

    pub(crate) fn get(&self, sheet: usize, row: u32, col: u16) -> Option<usize> {
        self.columns.get(&(sheet, col))?.get(&row).copied()
    }

    /// Push the positions of formula cells inside `range` onto `out`
    pub(crate) fn extend_with_range(&self, sheet: usize, range: CellRange, out: &mut Vec<usize>) {
        let rows = range.start.row..=range.end.row;

        // Wide ranges (whole rows) walk the indexed columns instead, in
        // column order like the narrow walk below
        if usize::from(range.col_count()) > self.columns.len() {
            let mut columns: Vec<_> = self
                .columns
                .iter()
                .filter(|((s, col), _)| {
                    *s == sheet && range.start.col <= *col && *col <= range.end.col
                })
                .map(|((_, col), cells)| (*col, cells))
                .collect();
            columns.sort_unstable_by_key(|(col, _)| *col);
            for (_, cells) in columns {
                out.extend(cells.range(rows.clone()).map(|(_, position)| *position));
            }
            return;
        }

        for col in range.start.col..=range.end.col {
            if let Some(cells) = self.columns.get(&(sheet, col)) {
                out.extend(cells.range(rows.clone()).map(|(_, position)| *position));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> RangeIndex {
        let mut index = RangeIndex::default();
        index.insert(0, 0, 0, 0);
        index.insert(0, 5, 0, 1);
        index.insert(0, 2, 3, 2);
        index.insert(1, 0, 0, 3);
        index
    }

    #[test]
    fn test_single_cells() {
        let index = index();
        assert_eq!(index.get(0, 5, 0), Some(1));
        assert_eq!(index.get(1, 0, 0), Some(3));
        assert_eq!(index.get(0, 1, 0), None);
    }

    #[test]
    fn test_range_lookup() {
        let index = index();
        let mut out = Vec::new();
        index.extend_with_range(0, CellRange::from_indices(0, 0, 3, 3), &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 2]);
    }

    #[test]
    fn test_wide_range_lookup() {
        let index = index();
        let mut out = Vec::new();
        index.extend_with_range(0, CellRange::from_indices(4, 0, 6, 16_383), &mut out);
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn test_wide_range_is_column_ordered() {
        let mut index = RangeIndex::default();
        for (position, col) in [40u16, 3, 900, 17, 250, 5, 61].into_iter().enumerate() {
            index.insert(0, 1, col, position);
            index.insert(0, 0, col, position + 10);
        }
        index.insert(1, 0, 2, 99);

        let mut wide = Vec::new();
        index.extend_with_range(0, CellRange::from_indices(0, 0, 1, 16_383), &mut wide);
        assert_eq!(wide, vec![11, 1, 15, 5, 13, 3, 10, 0, 16, 6, 14, 4, 12, 2]);

        // Same order as the column-by-column walk
        let mut narrow = Vec::new();
        index.extend_with_range(0, CellRange::from_indices(0, 3, 1, 5), &mut narrow);
        assert_eq!(narrow, wide[..4].to_vec());
    }
}
