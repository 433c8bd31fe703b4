//! Math functions

use super::{cell_result, integer, number};
use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::value::FormulaValue;
use gridcalc_core::CellError;
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Numbers among the operands.
///
/// Direct operands are coerced; inside arrays only numbers count and text,
/// booleans and blanks are skipped. The first error wins.
fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => numbers.push(other.to_number()?),
        }
    }
    Ok(numbers)
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_numbers(args).map(|ns| ns.iter().sum::<f64>().into()))
}

/// PRODUCT function
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_numbers(args).map(|ns| {
        if ns.is_empty() {
            0.0.into()
        } else {
            ns.iter().product::<f64>().into()
        }
    }))
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_numbers(args).and_then(|ns| {
        if ns.is_empty() {
            Err(CellError::Div0)
        } else {
            Ok((ns.iter().sum::<f64>() / ns.len() as f64).into())
        }
    }))
}

/// MIN function
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_numbers(args).map(|ns| {
        ns.into_iter()
            .reduce(f64::min)
            .unwrap_or(0.0)
            .into()
    }))
}

/// MAX function
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(collect_numbers(args).map(|ns| {
        ns.into_iter()
            .reduce(f64::max)
            .unwrap_or(0.0)
            .into()
    }))
}

/// COUNT function
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(FormulaValue::flatten)
        .filter(|v| matches!(v, FormulaValue::Number(_)))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA function
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(FormulaValue::flatten)
        .filter(|v| !matches!(v, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// ABS function
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(number(args, 0).map(|n| n.abs().into()))
}

/// SIGN function
pub fn fn_sign(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(number(args, 0).map(|n| {
        if n == 0.0 {
            0.0.into()
        } else {
            n.signum().into()
        }
    }))
}

/// INT function, rounding down
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(number(args, 0).map(|n| n.floor().into()))
}

/// MOD function; the result takes the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(number(args, 0).and_then(|n| modulo(n, number(args, 1)?)))
}

fn modulo(n: f64, d: f64) -> Result<FormulaValue, CellError> {
    if d == 0.0 {
        return Err(CellError::Div0);
    }
    Ok((n - d * (n / d).floor()).into())
}

/// POWER function
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(number(args, 0).and_then(|base| power(base, number(args, 1)?)))
}

fn power(base: f64, exponent: f64) -> Result<FormulaValue, CellError> {
    if base == 0.0 && exponent < 0.0 {
        return Err(CellError::Div0);
    }
    let result = base.powf(exponent);
    if result.is_finite() {
        Ok(result.into())
    } else {
        Err(CellError::Num)
    }
}

/// SQRT function
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(number(args, 0).and_then(|n| {
        if n < 0.0 {
            Err(CellError::Num)
        } else {
            Ok(n.sqrt().into())
        }
    }))
}

/// PI function
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

/// Round in decimal so 0.5 steps are not skewed by binary representation
fn round_decimal(n: f64, digits: i64, strategy: RoundingStrategy) -> f64 {
    let Some(value) = Decimal::from_f64(n) else {
        return n;
    };
    let rounded = if digits >= 0 {
        Some(value.round_dp_with_strategy(digits.min(28) as u32, strategy))
    } else {
        let exponent = digits.unsigned_abs().min(28) as u32;
        let factor = Decimal::from_i128_with_scale(10i128.pow(exponent), 0);
        value
            .checked_div(factor)
            .map(|q| q.round_dp_with_strategy(0, strategy))
            .and_then(|q| q.checked_mul(factor))
    };
    rounded.and_then(|r| r.to_f64()).unwrap_or(n)
}

fn round_with(args: &[FormulaValue], strategy: RoundingStrategy) -> FormulaResult<FormulaValue> {
    let rounded = number(args, 0).and_then(|n| {
        integer(args, 1).map(|digits| round_decimal(n, digits, strategy).into())
    });
    cell_result(rounded)
}

/// ROUND function, halves away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_with(args, RoundingStrategy::MidpointAwayFromZero)
}

/// ROUNDUP function
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_with(args, RoundingStrategy::AwayFromZero)
}

/// ROUNDDOWN function
pub fn fn_rounddown(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    round_with(args, RoundingStrategy::ToZero)
}

/// RAND function (volatile)
pub fn fn_rand(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut rng = rand::thread_rng();
    Ok(FormulaValue::Number(rng.gen::<f64>()))
}

/// RANDBETWEEN function (volatile)
pub fn fn_randbetween(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let bounds = number(args, 0).and_then(|b| number(args, 1).map(|t| (b.ceil(), t.floor())));
    cell_result(bounds.and_then(|(bottom, top)| {
        if bottom > top {
            return Err(CellError::Num);
        }
        let mut rng = rand::thread_rng();
        Ok((rng.gen_range(bottom as i64..=top as i64) as f64).into())
    }))
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
    fn test_aggregates() {
        assert_eq!(eval("=SUM(1,2,3)"), FormulaValue::Number(6.0));
        assert_eq!(eval("=SUM({1,\"a\";TRUE,4})"), FormulaValue::Number(5.0));
        assert_eq!(eval("=SUM(\"2\",TRUE)"), FormulaValue::Number(3.0));
        assert_eq!(eval("=SUM(\"x\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=AVERAGE(2,4)"), FormulaValue::Number(3.0));
        assert_eq!(eval("=AVERAGE({\"a\"})"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=MIN(3,1,2)"), FormulaValue::Number(1.0));
        assert_eq!(eval("=MAX({3,9},2)"), FormulaValue::Number(9.0));
        assert_eq!(eval("=PRODUCT(2,3,4)"), FormulaValue::Number(24.0));
        assert_eq!(eval("=COUNT(1,\"a\",{2,TRUE})"), FormulaValue::Number(2.0));
        assert_eq!(eval("=COUNTA(1,\"a\",{2,TRUE})"), FormulaValue::Number(4.0));
    }

    #[test]
    fn test_errors_inside_arrays_propagate() {
        assert_eq!(eval("=SUM({1,#N/A})"), FormulaValue::Error(CellError::Na));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(eval("=ROUND(2.5,0)"), FormulaValue::Number(3.0));
        assert_eq!(eval("=ROUND(-2.5,0)"), FormulaValue::Number(-3.0));
        assert_eq!(eval("=ROUND(3.14159,2)"), FormulaValue::Number(3.14));
        assert_eq!(eval("=ROUND(1234.5678,-2)"), FormulaValue::Number(1200.0));
        assert_eq!(eval("=ROUNDUP(3.2,0)"), FormulaValue::Number(4.0));
        assert_eq!(eval("=ROUNDDOWN(-3.9,0)"), FormulaValue::Number(-3.0));
        assert_eq!(eval("=ROUND(7)"), FormulaValue::Number(7.0));
    }

    #[test]
    fn test_scalar_math() {
        assert_eq!(eval("=ABS(-4)"), FormulaValue::Number(4.0));
        assert_eq!(eval("=SIGN(-0.5)"), FormulaValue::Number(-1.0));
        assert_eq!(eval("=INT(-1.5)"), FormulaValue::Number(-2.0));
        assert_eq!(eval("=MOD(-3,2)"), FormulaValue::Number(1.0));
        assert_eq!(eval("=MOD(3,0)"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=POWER(2,10)"), FormulaValue::Number(1024.0));
        assert_eq!(eval("=SQRT(-1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=SQRT(16)"), FormulaValue::Number(4.0));
    }

    #[test]
    fn test_random() {
        for _ in 0..20 {
            let FormulaValue::Number(n) = eval("=RAND()") else {
                panic!("RAND must return a number");
            };
            assert!((0.0..1.0).contains(&n));
            let FormulaValue::Number(n) = eval("=RANDBETWEEN(3,5)") else {
                panic!("RANDBETWEEN must return a number");
            };
            assert!([3.0, 4.0, 5.0].contains(&n));
        }
        assert_eq!(eval("=RANDBETWEEN(5,3)"), FormulaValue::Error(CellError::Num));
    }
}
