use crate::functions::registry;
use crate::provider::{DataProvider, NameInfo};
use crate::token::Token;
use ahash::AHashSet;
use gridcalc_core::{CellAddress, CellRange};

/// What a formula reads, directly or through defined names
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct References {
    pub(crate) cells: Vec<(usize, CellAddress)>,
    pub(crate) ranges: Vec<(usize, CellRange)>,
    pub(crate) volatile: bool,
}

impl References {
    /// Whether a cell on `sheet` is read
    pub(crate) fn reads(&self, sheet: usize, row: u32, col: u16) -> bool {
        self.cells
            .iter()
            .any(|(s, a)| *s == sheet && a.row == row && a.col == col)
            || self
                .ranges
                .iter()
                .any(|(s, r)| *s == sheet && r.contains(row, col))
    }
}

/// Collect the references of a token stream written on `sheet`.
///
/// Defined names are expanded; each name is expanded at most once.
pub(crate) fn scan_references(
    tokens: &[Token],
    sheet: usize,
    provider: &dyn DataProvider,
) -> References {
    let mut scanner = Scanner {
        provider,
        sheet,
        references: References::default(),
        seen_names: AHashSet::new(),
        pending_names: Vec::new(),
    };
    scanner.scan(tokens);
    while let Some(info) = scanner.pending_names.pop() {
        if let Ok(tokens) = info.tokens() {
            scanner.scan(&tokens);
        }
    }
    scanner.references
}

struct Scanner<'a> {
    provider: &'a dyn DataProvider,
    sheet: usize,
    references: References,
    seen_names: AHashSet<u64>,
    pending_names: Vec<NameInfo>,
}

impl Scanner<'_> {
    fn scan(&mut self, tokens: &[Token]) {
        // Sheet named by a preceding prefix; `Some(None)` is an unknown sheet
        let mut prefix: Option<Option<usize>> = None;
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::SheetPrefix(name) => {
                    prefix = Some(self.provider.sheet_index(name));
                    i += 1;
                    continue;
                }
                Token::CellRef(start) => {
                    let sheet = prefix.unwrap_or(Some(self.sheet));
                    match (tokens.get(i + 1), tokens.get(i + 2)) {
                        (Some(Token::Colon), Some(Token::CellRef(end))) => {
                            if let Some(sheet) = sheet {
                                let range = CellRange::new(start.position(), end.position());
                                self.references.ranges.push((sheet, range));
                            }
                            i += 3;
                        }
                        _ => {
                            if let Some(sheet) = sheet {
                                self.references.cells.push((sheet, start.position()));
                            }
                            i += 1;
                        }
                    }
                    prefix = None;
                    continue;
                }
                Token::Identifier(name) => {
                    if tokens.get(i + 1) == Some(&Token::LeftParen) {
                        if registry().is_volatile(name) {
                            self.references.volatile = true;
                        }
                    } else if let Some(sheet) = prefix.unwrap_or(Some(self.sheet)) {
                        self.queue_name(sheet, name);
                    }
                }
                _ => {}
            }
            prefix = None;
            i += 1;
        }
    }

    fn queue_name(&mut self, sheet: usize, name: &str) {
        if let Some(info) = self.provider.name(sheet, name) {
            if self.seen_names.insert(info.id) {
                self.pending_names.push(info);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;
    use gridcalc_core::Workbook;

    fn scan(wb: &Workbook, formula: &str) -> References {
        scan_references(&tokenize(formula).unwrap(), 0, wb)
    }

    #[test]
    fn test_cells_and_ranges() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();

        let refs = scan(&wb, "=A1+SUM(B1:B3)+Data!C2+Data!D1:E2");
        assert_eq!(
            refs.cells,
            vec![(0, CellAddress::new(0, 0)), (1, CellAddress::new(1, 2))]
        );
        assert_eq!(
            refs.ranges,
            vec![
                (0, CellRange::from_indices(0, 1, 2, 1)),
                (1, CellRange::from_indices(0, 3, 1, 4)),
            ]
        );
        assert!(!refs.volatile);
        assert!(refs.reads(0, 1, 1));
        assert!(!refs.reads(1, 1, 1));
    }

    #[test]
    fn test_unknown_sheet_is_ignored() {
        let wb = Workbook::new();
        let refs = scan(&wb, "=Missing!A1+B2");
        assert_eq!(refs.cells, vec![(0, CellAddress::new(1, 1))]);
    }

    #[test]
    fn test_volatile_calls() {
        let wb = Workbook::new();
        assert!(scan(&wb, "=NOW()+1").volatile);
        assert!(scan(&wb, "=IF(A1,RAND(),0)").volatile);
        assert!(!scan(&wb, "=SUM(A1)").volatile);
    }

    #[test]
    fn test_names_are_expanded_once() {
        let mut wb = Workbook::new();
        wb.define_name("Rate", "Sheet1!$B$1").unwrap();
        wb.define_name("Total", "Rate*Sheet1!C1:C4+Rate").unwrap();
        wb.define_name("Loop", "Loop+1").unwrap();

        let refs = scan(&wb, "=Total+Loop");
        assert_eq!(refs.cells, vec![(0, CellAddress::new(0, 1))]);
        assert_eq!(refs.ranges, vec![(0, CellRange::from_indices(0, 2, 3, 2))]);
    }

    #[test]
    fn test_sheet_prefix_selects_name_scope() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Sheet2").unwrap();
        wb.define_name("Rate", "Sheet1!$B$1").unwrap();
        wb.define_name_for_sheet("Rate", "=Sheet2!$A$1", 1).unwrap();

        let refs = scan(&wb, "=Sheet2!Rate");
        assert_eq!(refs.cells, vec![(1, CellAddress::new(0, 0))]);

        let mut refs = scan(&wb, "=Rate+Sheet2!Rate");
        refs.cells.sort_unstable_by_key(|(sheet, _)| *sheet);
        assert_eq!(
            refs.cells,
            vec![(0, CellAddress::new(0, 1)), (1, CellAddress::new(0, 0))]
        );

        assert_eq!(scan(&wb, "=Missing!Rate"), References::default());
    }
}
