//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::{cell_result, integer, text};
use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::value::FormulaValue;
use gridcalc_core::CellError;

/// Longest string a function may produce
const MAX_TEXT_LENGTH: usize = 32767;

/// CONCATENATE / CONCAT function
pub fn fn_concatenate(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut result = String::new();
    for arg in args {
        for value in arg.flatten() {
            match value.to_text() {
                Ok(s) => result.push_str(&s),
                Err(e) => return Ok(FormulaValue::Error(e)),
            }
        }
    }
    Ok(FormulaValue::String(result))
}

/// LEN function
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).map(|s| FormulaValue::Number(s.chars().count() as f64)))
}

/// Optional character count, 1 when omitted, `#VALUE!` when negative
fn count(args: &[FormulaValue], index: usize) -> Result<usize, CellError> {
    if args.len() <= index {
        return Ok(1);
    }
    let n = integer(args, index)?;
    usize::try_from(n).map_err(|_| CellError::Value)
}

/// LEFT function
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).and_then(|s| {
        let n = count(args, 1)?;
        Ok(FormulaValue::String(s.chars().take(n).collect()))
    }))
}

/// RIGHT function
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).and_then(|s| {
        let n = count(args, 1)?;
        let len = s.chars().count();
        Ok(FormulaValue::String(s.chars().skip(len.saturating_sub(n)).collect()))
    }))
}

/// MID function: start is 1-based and must be at least 1
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).and_then(|s| {
        let start = integer(args, 1)?;
        let length = integer(args, 2)?;
        if start < 1 || length < 0 {
            return Err(CellError::Value);
        }
        Ok(FormulaValue::String(
            s.chars()
                .skip((start - 1) as usize)
                .take(length as usize)
                .collect(),
        ))
    }))
}

/// UPPER function
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).map(|s| FormulaValue::String(s.to_uppercase())))
}

/// LOWER function
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).map(|s| FormulaValue::String(s.to_lowercase())))
}

/// TRIM function: strips the ends and collapses inner runs of spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).map(|s| {
        FormulaValue::String(s.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
    }))
}

/// EXACT function, case-sensitive
pub fn fn_exact(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).and_then(|a| Ok(FormulaValue::Boolean(a == text(args, 1)?))))
}

/// REPT function
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(text(args, 0).and_then(|s| {
        let times = usize::try_from(integer(args, 1)?).map_err(|_| CellError::Value)?;
        if s.chars().count().saturating_mul(times) > MAX_TEXT_LENGTH {
            return Err(CellError::Value);
        }
        Ok(FormulaValue::String(s.repeat(times)))
    }))
}
