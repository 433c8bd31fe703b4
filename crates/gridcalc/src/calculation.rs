//! Workbook calculation engine
//!
//! Provides document-level formula calculation with dependency ordering,
//! circular reference detection, iterative resolution of cycles, incremental
//! recalculation and cancellation.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 20.0).unwrap();
//! sheet.set_cell_formula("A3", "=A1+A2").unwrap();
//!
//! // Calculate all formulas
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! ```

use crate::{Error, Result};
use gridcalc_core::{CellError, CellId, CellValue, Workbook};
use gridcalc_formula::{
    evaluate, parse_tokens, tokenize, DataProvider, DependencyChain, EvaluationContext,
    FormulaCell, FormulaError, FormulaExpr,
};
use log::{debug, trace, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Options for workbook calculation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalculationOptions {
    /// Enable iterative calculation for circular references
    pub iterative: bool,
    /// Maximum iterations for circular references (default: 100)
    pub max_iterations: u32,
    /// Maximum change threshold for convergence (default: 0.001)
    pub max_change: f64,
    /// Re-run volatile functions (NOW, TODAY, RAND, ...) in incremental passes
    pub calculate_volatile: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            iterative: false,
            max_iterations: 100,
            max_change: 0.001,
            calculate_volatile: true,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells calculated
    pub cells_calculated: usize,
    /// Number of iterations performed (for circular references)
    pub iterations: u32,
    /// Number of circular references detected
    pub circular_references: usize,
    /// Number of volatile cells
    pub volatile_cells: usize,
    /// Number of errors encountered during calculation
    pub errors: usize,
    /// Whether calculation converged (for iterative calculation)
    pub converged: bool,
    /// False when the pass was cancelled
    pub completed: bool,
}

/// Shared flag that stops a running pass between two cell evaluations
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Calculate all formulas in the workbook with default options
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;

    /// Calculate all formulas, stopping early once `token` is cancelled
    fn calculate_with_cancellation(
        &mut self,
        options: &CalculationOptions,
        token: &CancellationToken,
    ) -> Result<CalculationStats>;
}

impl WorkbookCalculationExt for Workbook {
    fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        Calculator::new(options.clone()).calculate(self)
    }

    fn calculate_with_cancellation(
        &mut self,
        options: &CalculationOptions,
        token: &CancellationToken,
    ) -> Result<CalculationStats> {
        Calculator::new(options.clone())
            .with_cancellation(token.clone())
            .calculate(self)
    }
}

/// The calculation engine.
///
/// Holds the dependency chain between passes so that
/// [`recalculate`](Calculator::recalculate) can re-run only the cells
/// downstream of an edit.
#[derive(Debug, Default)]
pub struct Calculator {
    options: CalculationOptions,
    chain: DependencyChain,
    /// Parsed formulas of the registered cells
    parsed_formulas: HashMap<CellId, FormulaExpr>,
    cancellation: Option<CancellationToken>,
}

impl Calculator {
    pub fn new(options: CalculationOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    /// Chain built by the last full pass
    pub fn chain(&self) -> &DependencyChain {
        &self.chain
    }

    /// Rebuild the chain from the provider's formulas and calculate every cell
    pub fn calculate(&mut self, provider: &mut dyn DataProvider) -> Result<CalculationStats> {
        provider.reset();
        let mut stats = CalculationStats {
            converged: true,
            completed: true,
            ..CalculationStats::default()
        };

        self.collect_formulas(provider, &mut stats)?;
        self.chain.build_calc_order(&*provider);

        stats.formula_count = self.chain.len();
        stats.circular_references = self.chain.circular_cells().len();
        stats.volatile_cells = self.chain.volatile_cells().len();
        debug!(
            "calculating {} formula cells ({} circular, {} volatile)",
            stats.formula_count, stats.circular_references, stats.volatile_cells
        );

        let order: Vec<usize> = (0..self.chain.len()).collect();
        self.run(provider, &order, &mut stats)?;

        debug!(
            "calculated {} cells in {} iterations, {} errors",
            stats.cells_calculated, stats.iterations, stats.errors
        );
        Ok(stats)
    }

    /// Re-run the cells affected by edits to the values at `changed`.
    ///
    /// Formula text edits are not picked up; those need a full
    /// [`calculate`](Calculator::calculate). Without a previous full pass this
    /// falls back to one.
    pub fn recalculate(
        &mut self,
        provider: &mut dyn DataProvider,
        changed: &[CellId],
    ) -> Result<CalculationStats> {
        if self.chain.is_empty() {
            return self.calculate(provider);
        }

        let mut stats = CalculationStats {
            formula_count: self.chain.len(),
            circular_references: self.chain.circular_cells().len(),
            volatile_cells: self.chain.volatile_cells().len(),
            converged: true,
            completed: true,
            ..CalculationStats::default()
        };
        let order = self
            .chain
            .recalc_order(changed, self.options.calculate_volatile);
        debug!(
            "recalculating {} of {} formula cells after {} edits",
            order.len(),
            stats.formula_count,
            changed.len()
        );
        self.run(provider, &order, &mut stats)?;
        Ok(stats)
    }

    /// Register every formula cell; unparseable ones get `#NAME?` and stay
    /// out of the chain
    fn collect_formulas(
        &mut self,
        provider: &mut dyn DataProvider,
        stats: &mut CalculationStats,
    ) -> Result<()> {
        self.chain = DependencyChain::new();
        self.parsed_formulas.clear();

        for sheet in 0..provider.sheet_count() {
            for (row, col, formula) in provider.formula_cells(sheet) {
                let parsed = tokenize(&formula)
                    .and_then(|tokens| parse_tokens(&tokens).map(|ast| (tokens, ast)));
                let (tokens, ast) = match parsed {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(
                            "failed to parse formula at sheet {} ({}, {}): {}",
                            sheet, row, col, e
                        );
                        stats.errors += 1;
                        provider.set_formula_result(
                            sheet,
                            row,
                            col,
                            CellValue::Error(CellError::Name),
                        )?;
                        continue;
                    }
                };

                let cell = FormulaCell::new(sheet, row, col, tokens)?;
                self.parsed_formulas.insert(cell.id(), ast);
                self.chain.add(cell)?;
            }
        }
        Ok(())
    }

    /// Evaluate the cells at `positions`, given in chain order
    fn run(
        &self,
        provider: &mut dyn DataProvider,
        positions: &[usize],
        stats: &mut CalculationStats,
    ) -> Result<()> {
        let (circular, ordered): (Vec<usize>, Vec<usize>) = positions
            .iter()
            .partition(|&&position| self.chain.is_circular(position));

        if !self.options.iterative {
            for &position in &circular {
                if let Some(cell) = self.chain.get(position) {
                    warn!(
                        "circular reference at sheet {} ({}, {})",
                        cell.sheet, cell.row, cell.col
                    );
                    provider.set_formula_result(
                        cell.sheet,
                        cell.row,
                        cell.col,
                        CellValue::Error(CellError::Ref),
                    )?;
                    stats.errors += 1;
                }
            }
            stats.iterations = 1;
            self.run_ordered(provider, &ordered, stats)?;
            return Ok(());
        }

        if !self.run_ordered(provider, &ordered, stats)? || circular.is_empty() {
            stats.iterations = 1;
            return Ok(());
        }
        if !self.iterate(provider, &circular, stats)? {
            return Ok(());
        }

        let downstream = self.downstream_of(&circular, &ordered);
        if !downstream.is_empty() {
            trace!("re-running {} cells after iteration", downstream.len());
            let calculated = stats.cells_calculated;
            self.run_ordered(provider, &downstream, stats)?;
            stats.cells_calculated = calculated;
        }
        Ok(())
    }

    /// Evaluate cells once each; `false` when cancelled
    fn run_ordered(
        &self,
        provider: &mut dyn DataProvider,
        positions: &[usize],
        stats: &mut CalculationStats,
    ) -> Result<bool> {
        for &position in positions {
            if self.is_cancelled() {
                debug!("calculation cancelled after {} cells", stats.cells_calculated);
                stats.completed = false;
                return Ok(false);
            }
            let value = self.evaluate_cell(&*provider, position, stats)?;
            self.store(provider, position, value)?;
            stats.cells_calculated += 1;
        }
        Ok(true)
    }

    /// Re-run the circular cells until the largest numeric change is within
    /// `max_change` or the iteration cap is reached; `false` when cancelled
    fn iterate(
        &self,
        provider: &mut dyn DataProvider,
        circular: &[usize],
        stats: &mut CalculationStats,
    ) -> Result<bool> {
        stats.converged = false;

        for iteration in 0..self.options.max_iterations {
            stats.iterations = iteration + 1;
            let mut max_change: f64 = 0.0;

            for &position in circular {
                if self.is_cancelled() {
                    stats.completed = false;
                    return Ok(false);
                }
                let Some(cell) = self.chain.get(position) else {
                    continue;
                };
                let previous = provider.cell_value(cell.sheet, cell.row, cell.col);
                let value = self.evaluate_cell(&*provider, position, stats)?;
                if let (Some(old), CellValue::Number(new)) = (numeric(&previous), &value) {
                    max_change = max_change.max((new - old).abs());
                }
                self.store(provider, position, value)?;
                if iteration == 0 {
                    stats.cells_calculated += 1;
                }
            }

            if max_change <= self.options.max_change {
                stats.converged = true;
                break;
            }
        }

        if !stats.converged {
            warn!(
                "iterative calculation did not converge after {} iterations",
                stats.iterations
            );
        }
        Ok(true)
    }

    /// Cells among `candidates` that read a circular cell, directly or not
    fn downstream_of(&self, circular: &[usize], candidates: &[usize]) -> Vec<usize> {
        let mut reached = vec![false; self.chain.len()];
        let mut queue: VecDeque<usize> = circular.iter().copied().collect();
        while let Some(position) = queue.pop_front() {
            for &dependent in self.chain.dependents_of(position) {
                if !reached[dependent] {
                    reached[dependent] = true;
                    queue.push_back(dependent);
                }
            }
        }
        candidates
            .iter()
            .copied()
            .filter(|&position| reached[position])
            .collect()
    }

    /// Evaluate one chain cell.
    ///
    /// Engine failures other than contract violations degrade into an error
    /// value for the cell.
    fn evaluate_cell(
        &self,
        provider: &dyn DataProvider,
        position: usize,
        stats: &mut CalculationStats,
    ) -> Result<CellValue> {
        let Some(cell) = self.chain.get(position) else {
            return Ok(CellValue::Empty);
        };
        let Some(ast) = self.parsed_formulas.get(&cell.id()) else {
            return Ok(CellValue::Error(CellError::Name));
        };

        let ctx = EvaluationContext::new(provider, cell.sheet, cell.row, cell.col);
        let value = match evaluate(ast, &ctx) {
            Ok(value) => value.into(),
            Err(FormulaError::Contract(message)) => {
                return Err(Error::Formula(FormulaError::Contract(message)))
            }
            Err(e) => {
                warn!(
                    "evaluation error at sheet {} ({}, {}): {}",
                    cell.sheet, cell.row, cell.col, e
                );
                stats.errors += 1;
                CellValue::Error(match e {
                    FormulaError::Parse(_) => CellError::Name,
                    FormulaError::InvalidReference(_) | FormulaError::CircularReference(_) => {
                        CellError::Ref
                    }
                    FormulaError::Contract(_) => CellError::Value,
                })
            }
        };
        trace!(
            "sheet {} ({}, {}) = {:?}",
            cell.sheet,
            cell.row,
            cell.col,
            value
        );
        Ok(value)
    }

    fn store(
        &self,
        provider: &mut dyn DataProvider,
        position: usize,
        value: CellValue,
    ) -> Result<()> {
        if let Some(cell) = self.chain.get(position) {
            provider.set_formula_result(cell.sheet, cell.row, cell.col, value)?;
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Numeric reading of a stored result; blanks count as zero
fn numeric(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Empty => Some(0.0),
        _ => None,
    }
}
