//! Information functions

use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::value::FormulaValue;
use gridcalc_core::CellError;

fn test_value(
    args: &[FormulaValue],
    predicate: impl Fn(&FormulaValue) -> bool,
) -> FormulaResult<FormulaValue> {
    let value = args.first().map(FormulaValue::scalar).unwrap_or_default();
    Ok(FormulaValue::Boolean(predicate(&value)))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    test_value(args, |v| matches!(v, FormulaValue::Empty))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    test_value(args, |v| matches!(v, FormulaValue::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    test_value(args, |v| matches!(v, FormulaValue::String(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    test_value(args, |v| matches!(v, FormulaValue::Boolean(_)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    test_value(args, FormulaValue::is_error)
}

/// ISERR(value): any error but `#N/A`
pub fn fn_iserr(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    test_value(args, |v| {
        matches!(v, FormulaValue::Error(e) if *e != CellError::Na)
    })
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    test_value(args, |v| matches!(v, FormulaValue::Error(CellError::Na)))
}

/// ERROR.TYPE(value): 1 for `#NULL!` through 8 for `#GETTING_DATA`, `#N/A`
/// for anything that is not an error
pub fn fn_error_type(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match args.first().map(FormulaValue::scalar) {
        Some(FormulaValue::Error(e)) => Ok(FormulaValue::Number(f64::from(e.type_number()))),
        _ => Ok(FormulaValue::Error(CellError::Na)),
    }
}

/// NA()
pub fn fn_na(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Error(CellError::Na))
}
