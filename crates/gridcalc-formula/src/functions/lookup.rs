//! Lookup and reference functions
//!
//! The search functions take their table unmaterialized so a worksheet range
//! is walked through the provider one key at a time. Literal arrays are
//! reshaped into one element per key and walked the same way.

use super::{cell_result, integer};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::lookup::search::{find, MatchMode, SearchHit};
use crate::lookup::{
    create_navigator, LookupArguments, LookupDirection, LookupError, LookupSource,
};
use crate::value::{FormulaValue, FunctionArgument};
use gridcalc_core::CellError;

/// Fold a lookup failure into the function result
fn lookup_result(result: Result<FormulaValue, LookupError>) -> FormulaResult<FormulaValue> {
    match result {
        Ok(value) => Ok(value),
        Err(LookupError::Cell(e)) => Ok(FormulaValue::Error(e)),
        Err(LookupError::Contract(msg)) => Err(FormulaError::Contract(msg)),
    }
}

fn search(
    direction: LookupDirection,
    args: &LookupArguments,
    mode: MatchMode,
    ctx: &EvaluationContext,
) -> Result<Option<SearchHit>, LookupError> {
    let mut navigator = create_navigator(direction, args, ctx)?;
    Ok(find(&mut *navigator, args.lookup_value(), mode))
}

fn value_at(args: &[FunctionArgument], index: usize, ctx: &EvaluationContext) -> Option<FormulaValue> {
    args.get(index).map(|argument| ctx.argument_value(argument))
}

fn rows_of(value: &FormulaValue) -> Vec<Vec<FormulaValue>> {
    match value {
        FormulaValue::Array(rows) => rows.clone(),
        other => vec![vec![other.clone()]],
    }
}

fn transpose(rows: &[Vec<FormulaValue>]) -> Vec<Vec<FormulaValue>> {
    let width = rows.first().map_or(0, Vec::len);
    (0..width)
        .map(|col| {
            rows.iter()
                .map(|row| row.get(col).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Height and width of a table operand
fn dimensions(argument: &FunctionArgument) -> (usize, usize) {
    match argument {
        FunctionArgument::Range(address) => (
            address.range.row_count() as usize,
            address.range.col_count() as usize,
        ),
        FunctionArgument::Value(value) => {
            let rows = rows_of(value);
            (rows.len(), rows.first().map_or(0, Vec::len))
        }
    }
}

/// Keys laid out along `axis`, with the direction the navigator walks them
fn table(argument: &FunctionArgument, axis: LookupDirection) -> (LookupSource, LookupDirection) {
    match argument {
        FunctionArgument::Range(address) => (LookupSource::Range(*address), axis),
        FunctionArgument::Value(value) => {
            let rows = rows_of(value);
            let lines = match axis {
                LookupDirection::Vertical => rows,
                LookupDirection::Horizontal => transpose(&rows),
            };
            let data = lines
                .into_iter()
                .map(|line| FormulaValue::Array(vec![line]))
                .collect();
            (LookupSource::Array(data), LookupDirection::Vertical)
        }
    }
}

/// Blank results read as 0
fn returned(value: FormulaValue) -> FormulaValue {
    match value {
        FormulaValue::Empty => FormulaValue::Number(0.0),
        other => other,
    }
}

fn table_lookup(
    args: &[FunctionArgument],
    axis: LookupDirection,
    ctx: &EvaluationContext,
) -> Result<FormulaValue, LookupError> {
    let lookup_value = value_at(args, 0, ctx).unwrap_or_default();
    let source = args.get(1).ok_or(LookupError::Cell(CellError::Value))?;
    let index = value_at(args, 2, ctx).unwrap_or_default().to_number()?.trunc();
    if index < 1.0 {
        return Err(CellError::Value.into());
    }
    let range_lookup = match value_at(args, 3, ctx) {
        Some(value) => value.to_bool()?,
        None => true,
    };

    let (source, direction) = table(source, axis);
    let arguments = LookupArguments::new(lookup_value, index as usize - 1, source, range_lookup)?;
    let mode = if range_lookup {
        MatchMode::ApproximateAscending
    } else {
        MatchMode::Exact
    };
    search(direction, &arguments, mode, ctx)?
        .map(|hit| returned(hit.value))
        .ok_or(LookupError::Cell(CellError::Na))
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[FunctionArgument], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lookup_result(table_lookup(args, LookupDirection::Vertical, ctx))
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[FunctionArgument], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lookup_result(table_lookup(args, LookupDirection::Horizontal, ctx))
}

fn match_position(args: &[FunctionArgument], ctx: &EvaluationContext) -> Result<FormulaValue, LookupError> {
    let lookup_value = value_at(args, 0, ctx).unwrap_or_default();
    let match_type = match value_at(args, 2, ctx) {
        Some(value) => value.to_number()?.trunc() as i64,
        None => 1,
    };

    // Only a single row or column can be searched
    let (source, direction) = match args.get(1) {
        Some(FunctionArgument::Range(address)) => {
            let direction = if address.range.row_count() == 1 {
                LookupDirection::Horizontal
            } else if address.range.col_count() == 1 {
                LookupDirection::Vertical
            } else {
                return Err(CellError::Na.into());
            };
            (LookupSource::Range(*address), direction)
        }
        Some(FunctionArgument::Value(value)) => {
            let rows = rows_of(value);
            if rows.len() > 1 && rows.iter().any(|row| row.len() > 1) {
                return Err(CellError::Na.into());
            }
            let data = rows.into_iter().flatten().collect();
            (LookupSource::Array(data), LookupDirection::Vertical)
        }
        None => return Err(CellError::Value.into()),
    };

    let arguments = LookupArguments::new(lookup_value, 0, source, match_type != 0)?;
    search(direction, &arguments, MatchMode::from_match_type(match_type), ctx)?
        .map(|hit| FormulaValue::Number((hit.position + 1) as f64))
        .ok_or(LookupError::Cell(CellError::Na))
}

/// MATCH(lookup_value, lookup_array, [match_type]): one-based position
pub fn fn_match(args: &[FunctionArgument], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lookup_result(match_position(args, ctx))
}

fn vector_lookup(args: &[FunctionArgument], ctx: &EvaluationContext) -> Result<FormulaValue, LookupError> {
    let lookup_value = value_at(args, 0, ctx).unwrap_or_default();
    let keys = args.get(1).ok_or(LookupError::Cell(CellError::Value))?;
    let result_vector = args.get(2);

    // Keys run along the longer side; without a result vector the answer
    // comes from the last row or column
    let (rows, cols) = dimensions(keys);
    let axis = if rows >= cols {
        LookupDirection::Vertical
    } else {
        LookupDirection::Horizontal
    };
    let lookup_index = match (result_vector, axis) {
        (Some(_), _) => 0,
        (None, LookupDirection::Vertical) => cols.saturating_sub(1),
        (None, LookupDirection::Horizontal) => rows.saturating_sub(1),
    };

    let (source, direction) = table(keys, axis);
    let arguments = LookupArguments::new(lookup_value, lookup_index, source, true)?;
    let hit = search(direction, &arguments, MatchMode::ApproximateAscending, ctx)?
        .ok_or(LookupError::Cell(CellError::Na))?;

    match result_vector {
        Some(vector) => ctx
            .argument_value(vector)
            .flatten()
            .into_iter()
            .nth(hit.position)
            .cloned()
            .map(returned)
            .ok_or(LookupError::Cell(CellError::Na)),
        None => Ok(returned(hit.value)),
    }
}

/// LOOKUP(lookup_value, lookup_vector, [result_vector])
pub fn fn_lookup(args: &[FunctionArgument], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lookup_result(vector_lookup(args, ctx))
}

/// ROW([reference]): one-based row of the reference or of the formula cell
pub fn fn_row(args: &[FunctionArgument], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args.first() {
        None => FormulaValue::Number(f64::from(ctx.current_row) + 1.0),
        Some(FunctionArgument::Range(address)) => {
            FormulaValue::Number(f64::from(address.range.start.row) + 1.0)
        }
        Some(FunctionArgument::Value(_)) => FormulaValue::Error(CellError::Value),
    })
}

/// COLUMN([reference])
pub fn fn_column(args: &[FunctionArgument], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args.first() {
        None => FormulaValue::Number(f64::from(ctx.current_col) + 1.0),
        Some(FunctionArgument::Range(address)) => {
            FormulaValue::Number(f64::from(address.range.start.col) + 1.0)
        }
        Some(FunctionArgument::Value(_)) => FormulaValue::Error(CellError::Value),
    })
}

/// ROWS(array)
pub fn fn_rows(args: &[FunctionArgument], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args.first() {
        Some(argument) => FormulaValue::Number(dimensions(argument).0 as f64),
        None => FormulaValue::Error(CellError::Value),
    })
}

/// COLUMNS(array)
pub fn fn_columns(args: &[FunctionArgument], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args.first() {
        Some(argument) => FormulaValue::Number(dimensions(argument).1 as f64),
        None => FormulaValue::Error(CellError::Value),
    })
}

/// INDEX(array, row_num, [column_num])
///
/// A zero row or column selects the whole column or row. With a single
/// row and no column number, the second argument indexes the columns.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(index_value(args))
}

fn index_value(args: &[FormulaValue]) -> Result<FormulaValue, CellError> {
    let rows = args.first().map(rows_of).ok_or(CellError::Value)?;
    let mut row = integer(args, 1)?;
    let mut col = if args.len() > 2 { integer(args, 2)? } else { 0 };
    if row < 0 || col < 0 {
        return Err(CellError::Value);
    }

    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if args.len() == 2 && height == 1 {
        col = row;
        row = 1;
    } else if width == 1 && col == 0 {
        col = 1;
    }
    let (row, col) = (row as usize, col as usize);
    if row > height || col > width {
        return Err(CellError::Ref);
    }

    match (row, col) {
        (0, 0) => Ok(FormulaValue::Array(rows)),
        (0, col) => Ok(FormulaValue::Array(
            rows.iter()
                .map(|r| vec![r.get(col - 1).cloned().unwrap_or_default()])
                .collect(),
        )),
        (row, 0) => rows
            .get(row - 1)
            .map(|r| FormulaValue::Array(vec![r.clone()]))
            .ok_or(CellError::Ref),
        (row, col) => rows
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .cloned()
            .ok_or(CellError::Ref),
    }
}

/// CHOOSE(index_num, value1, [value2], ...)
///
/// Only the chosen operand's error reaches the result.
pub fn fn_choose(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let index = match args.first().map(FormulaValue::to_number) {
        Some(Ok(n)) => n.trunc(),
        Some(Err(e)) => return Ok(FormulaValue::Error(e)),
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };
    if !(1.0..args.len() as f64).contains(&index) {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    Ok(args[index as usize].clone())
}

#[cfg(test)]
mod tests {
    use crate::evaluator::{evaluate, EvaluationContext};
    use crate::parser::parse_formula;
    use crate::value::FormulaValue;
    use gridcalc_core::{CellError, Workbook};
    use pretty_assertions::assert_eq;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (i, name) in ["apple", "banana", "cherry"].iter().enumerate() {
            ws.set_cell_value_at(i as u32, 0, *name).unwrap();
            ws.set_cell_value_at(i as u32, 1, (i as f64 + 1.0) * 10.0).unwrap();
        }
        for (i, (bound, grade)) in [(0.0, "F"), (10.0, "D"), (20.0, "C"), (30.0, "B")]
            .iter()
            .enumerate()
        {
            ws.set_cell_value_at(i as u32, 3, *bound).unwrap();
            ws.set_cell_value_at(i as u32, 4, *grade).unwrap();
        }
        // G1:I2 laid out horizontally
        for (i, key) in ["x", "y", "z"].iter().enumerate() {
            ws.set_cell_value_at(0, 6 + i as u16, *key).unwrap();
            ws.set_cell_value_at(1, 6 + i as u16, i as f64 + 1.0).unwrap();
        }
        wb
    }

    fn eval(wb: &Workbook, formula: &str) -> FormulaValue {
        let ast = parse_formula(formula).unwrap();
        evaluate(&ast, &EvaluationContext::new(wb, 0, 10, 10)).unwrap()
    }

    #[test]
    fn test_vlookup_exact() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=VLOOKUP(\"banana\",A1:B3,2,FALSE)"), FormulaValue::Number(20.0));
        assert_eq!(eval(&wb, "=VLOOKUP(\"CHERRY\",A1:B3,2,FALSE)"), FormulaValue::Number(30.0));
        assert_eq!(eval(&wb, "=VLOOKUP(\"b*\",A1:B3,2,FALSE)"), FormulaValue::Number(20.0));
        assert_eq!(
            eval(&wb, "=VLOOKUP(\"kiwi\",A1:B3,2,FALSE)"),
            FormulaValue::Error(CellError::Na)
        );
    }

    #[test]
    fn test_vlookup_bad_index() {
        let wb = workbook();
        assert_eq!(
            eval(&wb, "=VLOOKUP(\"apple\",A1:B3,3,FALSE)"),
            FormulaValue::Error(CellError::Ref)
        );
        assert_eq!(
            eval(&wb, "=VLOOKUP(\"apple\",A1:B3,0,FALSE)"),
            FormulaValue::Error(CellError::Value)
        );
        assert_eq!(
            eval(&wb, "=VLOOKUP(#N/A,A1:B3,2,FALSE)"),
            FormulaValue::Error(CellError::Na)
        );
    }

    #[test]
    fn test_vlookup_approximate() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=VLOOKUP(25,D1:E4,2)"), FormulaValue::from("C"));
        assert_eq!(eval(&wb, "=VLOOKUP(30,D1:E4,2,TRUE)"), FormulaValue::from("B"));
        assert_eq!(eval(&wb, "=VLOOKUP(99,D1:E4,2)"), FormulaValue::from("B"));
        assert_eq!(eval(&wb, "=VLOOKUP(-1,D1:E4,2)"), FormulaValue::Error(CellError::Na));
    }

    #[test]
    fn test_vlookup_array_literal() {
        let wb = workbook();
        assert_eq!(
            eval(&wb, "=VLOOKUP(2,{1,\"one\";2,\"two\";3,\"three\"},2,FALSE)"),
            FormulaValue::from("two")
        );
    }

    #[test]
    fn test_hlookup() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=HLOOKUP(\"y\",G1:I2,2,FALSE)"), FormulaValue::Number(2.0));
        assert_eq!(
            eval(&wb, "=HLOOKUP(\"b\",{\"a\",\"b\",\"c\";1,2,3},2,FALSE)"),
            FormulaValue::Number(2.0)
        );
        assert_eq!(
            eval(&wb, "=HLOOKUP(\"b\",{\"a\",\"b\",\"c\";1,2,3},3,FALSE)"),
            FormulaValue::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_match() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=MATCH(20,B1:B3,0)"), FormulaValue::Number(2.0));
        assert_eq!(eval(&wb, "=MATCH(\"cherry\",A1:A3,0)"), FormulaValue::Number(3.0));
        assert_eq!(eval(&wb, "=MATCH(\"z\",G1:I1,0)"), FormulaValue::Number(3.0));
        assert_eq!(eval(&wb, "=MATCH(25,{10,20,30})"), FormulaValue::Number(2.0));
        assert_eq!(eval(&wb, "=MATCH(25,{30,20,10},-1)"), FormulaValue::Number(1.0));
        assert_eq!(eval(&wb, "=MATCH(1,A1:B3,0)"), FormulaValue::Error(CellError::Na));
    }

    #[test]
    fn test_lookup() {
        let wb = workbook();
        assert_eq!(
            eval(&wb, "=LOOKUP(2.5,{1,2,3},{\"a\",\"b\",\"c\"})"),
            FormulaValue::from("b")
        );
        assert_eq!(eval(&wb, "=LOOKUP(15,D1:E4)"), FormulaValue::from("D"));
        assert_eq!(eval(&wb, "=LOOKUP(15,D1:D4,E1:E4)"), FormulaValue::from("D"));
        assert_eq!(eval(&wb, "=LOOKUP(0.5,{1,2,3})"), FormulaValue::Error(CellError::Na));
    }

    #[test]
    fn test_row_column_rows_columns() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=ROW(B3)"), FormulaValue::Number(3.0));
        assert_eq!(eval(&wb, "=ROW()"), FormulaValue::Number(11.0));
        assert_eq!(eval(&wb, "=COLUMN(D1:E4)"), FormulaValue::Number(4.0));
        assert_eq!(eval(&wb, "=ROWS(A1:B3)"), FormulaValue::Number(3.0));
        assert_eq!(eval(&wb, "=COLUMNS(A1:B3)"), FormulaValue::Number(2.0));
        assert_eq!(eval(&wb, "=ROWS({1;2;3;4})"), FormulaValue::Number(4.0));
        assert_eq!(eval(&wb, "=ROW(Nowhere!A1)"), FormulaValue::Error(CellError::Ref));
    }

    #[test]
    fn test_index() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=INDEX(A1:B3,2,2)"), FormulaValue::Number(20.0));
        assert_eq!(eval(&wb, "=INDEX(A1:A3,3)"), FormulaValue::from("cherry"));
        assert_eq!(eval(&wb, "=INDEX({1,2,3},2)"), FormulaValue::Number(2.0));
        assert_eq!(eval(&wb, "=INDEX(A1:B3,4,1)"), FormulaValue::Error(CellError::Ref));
        assert_eq!(eval(&wb, "=SUM(INDEX(A1:B3,0,2))"), FormulaValue::Number(60.0));
    }

    #[test]
    fn test_choose() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=CHOOSE(2,\"a\",\"b\")"), FormulaValue::from("b"));
        assert_eq!(eval(&wb, "=CHOOSE(1,\"a\",1/0)"), FormulaValue::from("a"));
        assert_eq!(eval(&wb, "=CHOOSE(2,\"a\",1/0)"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval(&wb, "=CHOOSE(3,\"a\",\"b\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval(&wb, "=CHOOSE(\"nan\",\"a\",\"b\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval(&wb, "=CHOOSE(1E300,\"a\",\"b\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval(&wb, "=CHOOSE(0.5,\"a\",\"b\")"), FormulaValue::Error(CellError::Value));
    }
}
