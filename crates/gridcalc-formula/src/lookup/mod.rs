//! Lookup navigation
//!
//! Search functions walk their source one key at a time through a
//! [`LookupNavigator`]. Literal arrays and worksheet ranges get one
//! implementation each; [`create_navigator`] picks the right one from the
//! argument source, and the algorithms in [`search`] work against either.

mod array;
mod range;
pub mod search;

pub use array::ArrayLookupNavigator;
pub use range::RangeLookupNavigator;

use crate::evaluator::EvaluationContext;
use crate::value::FormulaValue;
use gridcalc_core::{CellError, RangeAddress};
use thiserror::Error;

/// Failure to set up or drive a lookup
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    /// Spreadsheet error the lookup function should return as its value
    #[error("{0}")]
    Cell(CellError),
    /// Navigator used with the wrong kind of source
    #[error("lookup contract violation: {0}")]
    Contract(String),
}

impl From<CellError> for LookupError {
    fn from(e: CellError) -> Self {
        LookupError::Cell(e)
    }
}

/// Axis the keys are laid out along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupDirection {
    /// Keys run down the first column; results come from a column to the right
    Vertical,
    /// Keys run along the first row; results come from a row below
    Horizontal,
}

/// Where the keys come from
#[derive(Debug, Clone, PartialEq)]
pub enum LookupSource {
    /// Literal data, one element per step; a row is a 1xN [`FormulaValue::Array`]
    Array(Vec<FormulaValue>),
    /// Worksheet range read through the provider
    Range(RangeAddress),
}

/// Validated inputs of a lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LookupArguments {
    lookup_value: FormulaValue,
    lookup_index: usize,
    source: LookupSource,
    range_lookup: bool,
}

impl LookupArguments {
    /// `lookup_index` is the zero-based offset of the result in the return
    /// dimension. The lookup value must be a scalar.
    pub fn new(
        lookup_value: FormulaValue,
        lookup_index: usize,
        source: LookupSource,
        range_lookup: bool,
    ) -> Result<Self, LookupError> {
        match lookup_value {
            FormulaValue::Error(e) => Err(LookupError::Cell(e)),
            FormulaValue::Array(_) => Err(LookupError::Cell(CellError::Value)),
            lookup_value => Ok(Self {
                lookup_value,
                lookup_index,
                source,
                range_lookup,
            }),
        }
    }

    pub fn lookup_value(&self) -> &FormulaValue {
        &self.lookup_value
    }

    pub fn lookup_index(&self) -> usize {
        self.lookup_index
    }

    pub fn source(&self) -> &LookupSource {
        &self.source
    }

    pub fn range_lookup(&self) -> bool {
        self.range_lookup
    }
}

/// Cursor over the keys of a lookup source
pub trait LookupNavigator {
    /// Key at the scan position
    fn current_value(&self) -> FormulaValue;

    /// Value `lookup_index` steps away from the key in the return dimension
    fn lookup_value(&self) -> FormulaValue;

    /// Advance one key; `false` once the end is reached, without wrapping
    fn move_next(&mut self) -> bool;

    /// Zero-based scan position
    fn index(&self) -> usize;
}

/// Navigator matching the argument source
pub fn create_navigator<'a>(
    direction: LookupDirection,
    args: &'a LookupArguments,
    ctx: &'a EvaluationContext<'a>,
) -> Result<Box<dyn LookupNavigator + 'a>, LookupError> {
    match args.source() {
        LookupSource::Array(_) => Ok(Box::new(ArrayLookupNavigator::new(direction, args)?)),
        LookupSource::Range(_) => Ok(Box::new(RangeLookupNavigator::new(direction, args, ctx)?)),
    }
}
