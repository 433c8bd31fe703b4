//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. Spreadsheet errors travel as
//! [`FormulaValue::Error`]; only engine failures come back as `Err`.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{registry, ErrorPolicy, FunctionImpl};
use crate::parser::parse_tokens;
use crate::provider::{DataProvider, NameInfo};
use crate::token::Token;
use crate::value::{compare_values, FormulaValue, FunctionArgument};
use gridcalc_core::{CellAddress, CellError, CellRange, DateSystem, RangeAddress};
use std::cell::RefCell;

/// Settings that change how values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluationOptions {
    /// Base of serial date numbers
    pub date_system: DateSystem,
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Where cell values, ranges and names come from
    pub provider: Option<&'a dyn DataProvider>,
    /// Current worksheet index
    pub current_sheet: usize,
    /// Current cell row (for relative references)
    pub current_row: u32,
    /// Current cell column (for relative references)
    pub current_col: u16,
    pub options: EvaluationOptions,
    /// Names being evaluated, innermost last
    names_in_progress: RefCell<Vec<String>>,
}

impl<'a> EvaluationContext<'a> {
    /// Context anchored at a cell, with options taken from the provider
    pub fn new(provider: &'a dyn DataProvider, sheet: usize, row: u32, col: u16) -> Self {
        Self {
            provider: Some(provider),
            current_sheet: sheet,
            current_row: row,
            current_col: col,
            options: EvaluationOptions {
                date_system: provider.date_system(),
            },
            names_in_progress: RefCell::new(Vec::new()),
        }
    }

    /// Create a simple context without data (for testing)
    pub fn simple() -> Self {
        Self {
            provider: None,
            current_sheet: 0,
            current_row: 0,
            current_col: 0,
            options: EvaluationOptions::default(),
            names_in_progress: RefCell::new(Vec::new()),
        }
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn date_system(&self) -> DateSystem {
        self.options.date_system
    }

    /// Resolve an optional sheet name; unknown sheets are `#REF!`
    pub fn sheet_index(&self, sheet: Option<&str>) -> Result<usize, CellError> {
        let Some(provider) = self.provider else {
            return match sheet {
                Some(_) => Err(CellError::Ref),
                None => Ok(self.current_sheet),
            };
        };
        let index = match sheet {
            Some(name) => provider.sheet_index(name).ok_or(CellError::Ref)?,
            None => self.current_sheet,
        };
        if index < provider.sheet_count() {
            Ok(index)
        } else {
            Err(CellError::Ref)
        }
    }

    /// Get a cell value
    pub fn cell_value(&self, sheet: Option<&str>, address: CellAddress) -> FormulaValue {
        let sheet = match self.sheet_index(sheet) {
            Ok(sheet) => sheet,
            Err(e) => return FormulaValue::Error(e),
        };
        match self.provider {
            Some(provider) => provider.cell_value(sheet, address.row, address.col).into(),
            None => FormulaValue::Empty,
        }
    }

    pub fn range_address(
        &self,
        sheet: Option<&str>,
        range: CellRange,
    ) -> Result<RangeAddress, CellError> {
        self.sheet_index(sheet)
            .map(|sheet| RangeAddress::new(sheet, range))
    }

    /// Values of a range as an array, row by row
    pub fn range_values(&self, address: &RangeAddress) -> FormulaValue {
        let Some(provider) = self.provider else {
            return FormulaValue::Array(vec![]);
        };
        let range = match provider.range(address.sheet, address.range) {
            Ok(range) => range,
            Err(_) => return FormulaValue::Error(CellError::Ref),
        };

        let bounds = address.range;
        let rows = (bounds.start.row..=bounds.end.row)
            .map(|row| {
                (bounds.start.col..=bounds.end.col)
                    .map(|col| FormulaValue::from(range.value(row, col)))
                    .collect()
            })
            .collect();
        FormulaValue::Array(rows)
    }

    /// Materialize a function argument: single cells become scalars,
    /// larger ranges arrays
    pub fn argument_value(&self, argument: &FunctionArgument) -> FormulaValue {
        match argument {
            FunctionArgument::Value(value) => value.clone(),
            FunctionArgument::Range(address) if !address.range.is_multi() => {
                let start = address.range.start;
                match self.provider {
                    Some(provider) if address.sheet < provider.sheet_count() => {
                        provider.cell_value(address.sheet, start.row, start.col).into()
                    }
                    Some(_) => FormulaValue::Error(CellError::Ref),
                    None => FormulaValue::Empty,
                }
            }
            FunctionArgument::Range(address) => self.range_values(address),
        }
    }

    /// Value of a defined name as seen from the current sheet
    ///
    /// Unknown names are `#NAME?`. A name that reaches itself while being
    /// evaluated is a [`FormulaError::CircularReference`].
    pub fn resolve_name(&self, sheet: Option<&str>, name: &str) -> FormulaResult<FormulaValue> {
        let info = match self.name_info(sheet, name) {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(FormulaValue::Error(CellError::Name)),
            Err(e) => return Ok(FormulaValue::Error(e)),
        };
        if let Some(value) = &info.value {
            return Ok(value.clone());
        }

        let key = format!("{:?}!{}", info.worksheet, info.name.to_lowercase());
        if self.names_in_progress.borrow().contains(&key) {
            return Err(FormulaError::CircularReference(info.name));
        }
        let expr = match info.tokens().and_then(|tokens| parse_tokens(&tokens)) {
            Ok(expr) => expr,
            Err(_) => return Ok(FormulaValue::Error(CellError::Name)),
        };

        self.names_in_progress.borrow_mut().push(key);
        let result = evaluate(&expr, self);
        self.names_in_progress.borrow_mut().pop();
        result
    }

    /// Cell or range a defined name refers to, if it is a plain reference
    pub fn name_reference(&self, sheet: Option<&str>, name: &str) -> Option<RangeAddress> {
        let info = self.name_info(sheet, name).ok()??;
        let expr = info.tokens().and_then(|tokens| parse_tokens(&tokens)).ok()?;
        match expr {
            FormulaExpr::CellRef(r) => self
                .range_address(r.sheet.as_deref(), CellRange::single(r.address))
                .ok(),
            FormulaExpr::RangeRef(r) => self.range_address(r.sheet.as_deref(), r.range).ok(),
            _ => None,
        }
    }

    /// Name visible from `sheet`, the current sheet when unqualified.
    /// An unknown sheet is `#REF!`.
    fn name_info(&self, sheet: Option<&str>, name: &str) -> Result<Option<NameInfo>, CellError> {
        let index = self.sheet_index(sheet)?;
        Ok(self.provider.and_then(|provider| provider.name(index, name)))
    }
}

/// Parse a token stream and evaluate it
pub fn evaluate_tokens(tokens: &[Token], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let expr = parse_tokens(tokens)?;
    evaluate(&expr, ctx)
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => {
            Ok(ctx.cell_value(cell_ref.sheet.as_deref(), cell_ref.address))
        }

        FormulaExpr::RangeRef(range_ref) => {
            match ctx.range_address(range_ref.sheet.as_deref(), range_ref.range) {
                Ok(address) => Ok(ctx.range_values(&address)),
                Err(e) => Ok(FormulaValue::Error(e)),
            }
        }

        FormulaExpr::NameRef(r) => ctx.resolve_name(r.sheet.as_deref(), &r.name),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, ctx)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

fn number_result(n: f64) -> FormulaValue {
    if n.is_finite() {
        FormulaValue::Number(n)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = evaluate(left, ctx)?.scalar();
    let right_val = evaluate(right, ctx)?.scalar();

    // Propagate errors, left operand first
    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    if op.is_comparison() {
        let ord = compare_values(&left_val, &right_val);
        let result = match op {
            BinaryOperator::Equal => ord.is_eq(),
            BinaryOperator::NotEqual => ord.is_ne(),
            BinaryOperator::LessThan => ord.is_lt(),
            BinaryOperator::LessEqual => ord.is_le(),
            BinaryOperator::GreaterThan => ord.is_gt(),
            _ => ord.is_ge(),
        };
        return Ok(FormulaValue::Boolean(result));
    }

    if op == BinaryOperator::Concat {
        return Ok(match (left_val.to_text(), right_val.to_text()) {
            (Ok(l), Ok(r)) => FormulaValue::String(l + &r),
            (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
        });
    }

    let (l, r) = match (left_val.to_number(), right_val.to_number()) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => return Ok(FormulaValue::Error(e)),
    };
    Ok(match op {
        BinaryOperator::Add => number_result(l + r),
        BinaryOperator::Subtract => number_result(l - r),
        BinaryOperator::Multiply => number_result(l * r),
        BinaryOperator::Divide if r == 0.0 => FormulaValue::Error(CellError::Div0),
        BinaryOperator::Divide => number_result(l / r),
        BinaryOperator::Power if l == 0.0 && r < 0.0 => FormulaValue::Error(CellError::Div0),
        BinaryOperator::Power => number_result(l.powf(r)),
        _ => FormulaValue::Error(CellError::Value),
    })
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let n = match evaluate(operand, ctx)?.to_number() {
        Ok(n) => n,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

/// Operand handed to a by-reference function
fn reference_argument(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FunctionArgument> {
    let address = match expr {
        FormulaExpr::CellRef(r) => {
            ctx.range_address(r.sheet.as_deref(), CellRange::single(r.address))
        }
        FormulaExpr::RangeRef(r) => ctx.range_address(r.sheet.as_deref(), r.range),
        FormulaExpr::NameRef(r) => match ctx.name_reference(r.sheet.as_deref(), &r.name) {
            Some(address) => Ok(address),
            None => {
                let value = ctx.resolve_name(r.sheet.as_deref(), &r.name)?;
                return Ok(FunctionArgument::Value(value));
            }
        },
        other => return Ok(FunctionArgument::Value(evaluate(other, ctx)?)),
    };
    Ok(match address {
        Ok(address) => FunctionArgument::Range(address),
        Err(e) => FunctionArgument::Value(FormulaValue::Error(e)),
    })
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let Some(func) = registry().get(name) else {
        return Ok(FormulaValue::Error(CellError::Name));
    };

    if args.len() < func.min_args || func.max_args.is_some_and(|max| args.len() > max) {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let propagate = func.error_policy == ErrorPolicy::Propagate;

    match func.implementation {
        FunctionImpl::Eager(implementation) => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                let value = evaluate(arg, ctx)?;
                if let (true, Some(e)) = (propagate, value.get_error()) {
                    return Ok(FormulaValue::Error(e));
                }
                evaluated_args.push(value);
            }
            implementation(&evaluated_args, ctx)
        }
        FunctionImpl::ByReference(implementation) => {
            let mut reference_args = Vec::with_capacity(args.len());
            for arg in args {
                let argument = reference_argument(arg, ctx)?;
                if let (true, Some(e)) = (
                    propagate,
                    argument.as_value().and_then(FormulaValue::get_error),
                ) {
                    return Ok(FormulaValue::Error(e));
                }
                reference_args.push(argument);
            }
            implementation(&reference_args, ctx)
        }
    }
}
