//! Logical functions

use super::{cell_result, first_error};
use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::value::FormulaValue;
use gridcalc_core::CellError;

/// IF function
///
/// Receives error operands; only an error in the condition is returned
/// unless the chosen branch is itself an error.
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = args.first().map_or(Ok(false), FormulaValue::to_bool);
    cell_result(condition.map(|condition| {
        if condition {
            args.get(1).cloned().unwrap_or_default()
        } else {
            args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false))
        }
    }))
}

/// IFERROR function
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match args.first() {
        Some(FormulaValue::Error(_)) => Ok(args.get(1).cloned().unwrap_or_default()),
        Some(value) => Ok(value.clone()),
        None => Ok(FormulaValue::Empty),
    }
}

/// IFNA function
pub fn fn_ifna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match args.first() {
        Some(FormulaValue::Error(CellError::Na)) => Ok(args.get(1).cloned().unwrap_or_default()),
        Some(value) => Ok(value.clone()),
        None => Ok(FormulaValue::Empty),
    }
}

/// Logical operands: direct ones are coerced, inside arrays only booleans
/// and numbers count
fn collect_logicals(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    if let Some(FormulaValue::Error(e)) = first_error(args) {
        return Err(e);
    }
    let mut values = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Boolean(b) => values.push(*b),
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => values.push(other.to_bool()?),
        }
    }
    if values.is_empty() {
        return Err(CellError::Value);
    }
    Ok(values)
}

/// AND function
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_logicals(args).map(|vs| vs.iter().all(|b| *b).into()))
}

/// OR function
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_logicals(args).map(|vs| vs.iter().any(|b| *b).into()))
}

/// XOR function, true when an odd number of operands are true
pub fn fn_xor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_logicals(args).map(|vs| (vs.iter().filter(|b| **b).count() % 2 == 1).into()))
}

/// NOT function
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = args.first().map_or(Ok(false), FormulaValue::to_bool);
    cell_result(value.map(|b| (!b).into()))
}

/// TRUE function
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE function
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}

#[cfg(test)]
mod tests {
    use crate::evaluator::{evaluate, EvaluationContext};
    use crate::parser::parse_formula;
    use crate::value::FormulaValue;
    use gridcalc_core::CellError;

    fn eval(formula: &str) -> FormulaValue {
        let ast = parse_formula(formula).unwrap();
        evaluate(&ast, &EvaluationContext::simple()).unwrap()
    }

    #[test]
    fn test_if() {
        assert_eq!(eval("=IF(TRUE,1,2)"), FormulaValue::Number(1.0));
        assert_eq!(eval("=IF(0,1,2)"), FormulaValue::Number(2.0));
        assert_eq!(eval("=IF(FALSE,1)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=IF(TRUE,1,1/0)"), FormulaValue::Number(1.0));
        assert_eq!(eval("=IF(1/0,1,2)"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=IF(\"maybe\",1,2)"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_iferror_and_ifna() {
        assert_eq!(eval("=IFERROR(#REF!,\"x\")"), FormulaValue::from("x"));
        assert_eq!(eval("=IFERROR(3,\"x\")"), FormulaValue::Number(3.0));
        assert_eq!(eval("=IFNA(#N/A,0)"), FormulaValue::Number(0.0));
        assert_eq!(eval("=IFNA(#DIV/0!,0)"), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_and_or_not_xor() {
        assert_eq!(eval("=AND(TRUE,1)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=AND(TRUE,{1,0})"), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE,0)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE,{\"a\",TRUE})"), FormulaValue::Boolean(true));
        assert_eq!(eval("=NOT(0)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=XOR(TRUE,TRUE,TRUE)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=AND({\"a\"})"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=OR(TRUE,#N/A)"), FormulaValue::Error(CellError::Na));
        assert_eq!(eval("=TRUE()"), FormulaValue::Boolean(true));
    }
}
