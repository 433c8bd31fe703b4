//! Dependency tracking for formula calculation
//!
//! A [`DependencyChain`] holds every formula cell of a document. Once
//! [`DependencyChain::build_calc_order`] has run, position in the chain is
//! calculation order: each cell comes after the cells it reads, except for
//! cells caught in a cycle, which are moved to the end and flagged.

mod chain;
mod range_index;
mod scan;

pub use chain::DependencyChain;

use crate::error::FormulaResult;
use crate::token::{tokenize, Token};
use gridcalc_core::CellId;

/// A formula-bearing cell registered in a chain
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCell {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
    pub tokens: Vec<Token>,
    /// Position in the chain, rewritten when the order is built
    pub index: usize,
    id: CellId,
    /// Registration sequence number
    seq: usize,
}

impl FormulaCell {
    /// Fails when the position lies outside the worksheet bounds
    pub fn new(sheet: usize, row: u32, col: u16, tokens: Vec<Token>) -> FormulaResult<Self> {
        Ok(Self {
            sheet,
            row,
            col,
            tokens,
            index: 0,
            id: CellId::new(sheet, row, col)?,
            seq: 0,
        })
    }

    /// Cell with the tokens of `formula`
    pub fn from_formula(sheet: usize, row: u32, col: u16, formula: &str) -> FormulaResult<Self> {
        Self::new(sheet, row, col, tokenize(formula)?)
    }

    pub fn id(&self) -> CellId {
        self.id
    }
}
