use super::{LookupArguments, LookupDirection, LookupError, LookupNavigator, LookupSource};
use crate::evaluator::EvaluationContext;
use crate::provider::RangeInfo;
use crate::value::FormulaValue;
use gridcalc_core::CellError;

/// Navigator over a worksheet range.
///
/// Vertical lookups step down rows, horizontal lookups step across columns.
pub struct RangeLookupNavigator<'a> {
    range: Box<dyn RangeInfo + 'a>,
    direction: LookupDirection,
    lookup_index: usize,
    /// Number of keys along the scan axis
    length: usize,
    position: usize,
}

impl<'a> RangeLookupNavigator<'a> {
    pub fn new(
        direction: LookupDirection,
        args: &'a LookupArguments,
        ctx: &'a EvaluationContext<'a>,
    ) -> Result<Self, LookupError> {
        let LookupSource::Range(address) = args.source() else {
            return Err(LookupError::Contract(
                "range navigator needs a range source".into(),
            ));
        };
        let provider = ctx.provider.ok_or(LookupError::Cell(CellError::Ref))?;
        let range = provider
            .range(address.sheet, address.range)
            .map_err(|_| LookupError::Cell(CellError::Ref))?;

        let rows = address.range.row_count() as usize;
        let cols = address.range.col_count() as usize;
        let (length, width) = match direction {
            LookupDirection::Vertical => (rows, cols),
            LookupDirection::Horizontal => (cols, rows),
        };
        if args.lookup_index() >= width {
            return Err(LookupError::Cell(CellError::Ref));
        }

        Ok(Self {
            range,
            direction,
            lookup_index: args.lookup_index(),
            length,
            position: 0,
        })
    }

    fn read(&self, offset: usize) -> FormulaValue {
        let (row, col) = match self.direction {
            LookupDirection::Vertical => (self.position, offset),
            LookupDirection::Horizontal => (offset, self.position),
        };
        match (u32::try_from(row), u16::try_from(col)) {
            (Ok(row), Ok(col)) => FormulaValue::from(self.range.offset(row, col)),
            _ => FormulaValue::Empty,
        }
    }
}

impl LookupNavigator for RangeLookupNavigator<'_> {
    fn current_value(&self) -> FormulaValue {
        self.read(0)
    }

    fn lookup_value(&self) -> FormulaValue {
        self.read(self.lookup_index)
    }

    fn move_next(&mut self) -> bool {
        if self.position + 1 >= self.length {
            return false;
        }
        self.position += 1;
        true
    }

    fn index(&self) -> usize {
        self.position
    }
}
