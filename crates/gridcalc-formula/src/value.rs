//! Values flowing through evaluation

use gridcalc_core::{CellError, CellValue, RangeAddress};
use std::cmp::Ordering;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Rows of values, as produced by ranges and array constants
    Array(Vec<Vec<FormulaValue>>),
    #[default]
    Empty,
}

impl FormulaValue {
    /// Loose numeric view: blanks are 0, booleans 1/0, numeric text parses.
    /// Text spelling an infinity or NaN is not numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Numeric coercion for operators and numeric arguments.
    ///
    /// Errors pass through; text that is not a number gives `#VALUE!`.
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => self.scalar().to_number(),
            other => other.as_number().ok_or(CellError::Value),
        }
    }

    /// Text coercion: blanks become `""`, numbers render without trailing zeros
    pub fn to_text(&self) -> Result<String, CellError> {
        match self {
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => self.scalar().to_text(),
            other => Ok(other.as_string()),
        }
    }

    /// Logical coercion: numbers are true when non-zero, "TRUE"/"FALSE" text
    /// is accepted, other text gives `#VALUE!`
    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self {
            FormulaValue::Boolean(b) => Ok(*b),
            FormulaValue::Number(n) => Ok(*n != 0.0),
            FormulaValue::Empty => Ok(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            FormulaValue::String(_) => Err(CellError::Value),
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => self.scalar().to_bool(),
        }
    }

    /// Display string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => self.scalar().as_string(),
        }
    }

    /// Top-left element of an array, the value itself otherwise
    pub fn scalar(&self) -> FormulaValue {
        match self {
            FormulaValue::Array(rows) => rows
                .first()
                .and_then(|row| row.first())
                .map(FormulaValue::scalar)
                .unwrap_or(FormulaValue::Error(CellError::Value)),
            other => other.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// All values in row-major order, arrays flattened
    pub fn flatten(&self) -> Vec<&FormulaValue> {
        match self {
            FormulaValue::Array(rows) => rows.iter().flatten().flat_map(|v| v.flatten()).collect(),
            other => vec![other],
        }
    }
}

/// Number rendered the way a cell shows it in General format
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Total order used by comparison operators and lookups.
///
/// Blanks compare as 0 against numbers and as `""` against text; mixed
/// kinds order number < text < boolean; text compares case-insensitively.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    use FormulaValue as V;

    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) | FormulaValue::Empty => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            FormulaValue::Error(_) => 3,
            FormulaValue::Array(_) => 4,
        }
    }

    fn numbers(l: f64, r: f64) -> Ordering {
        l.partial_cmp(&r).unwrap_or(Ordering::Equal)
    }

    match (left, right) {
        (V::Empty, V::Empty) => Ordering::Equal,
        (V::Empty, V::String(s)) => "".cmp(s.as_str()),
        (V::String(s), V::Empty) => s.as_str().cmp(""),
        (V::Empty, V::Boolean(b)) => false.cmp(b),
        (V::Boolean(b), V::Empty) => b.cmp(&false),
        (V::Empty, V::Number(r)) => numbers(0.0, *r),
        (V::Number(l), V::Empty) => numbers(*l, 0.0),
        (V::Number(l), V::Number(r)) => numbers(*l, *r),
        (V::String(l), V::String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (V::Boolean(l), V::Boolean(r)) => l.cmp(r),
        (V::Error(l), V::Error(r)) => l.type_number().cmp(&r.type_number()),
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        FormulaValue::from(&value)
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        match value.effective_value() {
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::String(s) => FormulaValue::String(s.as_str().to_string()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
            CellValue::Empty | CellValue::Formula { .. } => FormulaValue::Empty,
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) if !n.is_finite() => CellValue::Error(CellError::Num),
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::String(s.into()),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            array @ FormulaValue::Array(_) => array.scalar().into(),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

/// Argument handed to a function registered to take references.
///
/// Range operands arrive unmaterialized so the function can walk them
/// through the data provider; every other operand arrives evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgument {
    Value(FormulaValue),
    Range(RangeAddress),
}

impl FunctionArgument {
    pub fn as_value(&self) -> Option<&FormulaValue> {
        match self {
            FunctionArgument::Value(v) => Some(v),
            FunctionArgument::Range(_) => None,
        }
    }

    pub fn as_range(&self) -> Option<&RangeAddress> {
        match self {
            FunctionArgument::Range(r) => Some(r),
            FunctionArgument::Value(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coercions() {
        assert_eq!(FormulaValue::Empty.to_number(), Ok(0.0));
        assert_eq!(FormulaValue::Boolean(true).to_number(), Ok(1.0));
        assert_eq!(FormulaValue::from(" 2.5 ").to_number(), Ok(2.5));
        assert_eq!(FormulaValue::from("abc").to_number(), Err(CellError::Value));
        assert_eq!(FormulaValue::from("nan").to_number(), Err(CellError::Value));
        assert_eq!(FormulaValue::from(" inf").to_number(), Err(CellError::Value));
        assert_eq!(FormulaValue::from("-infinity").as_number(), None);
        assert_eq!(
            FormulaValue::Error(CellError::Na).to_number(),
            Err(CellError::Na)
        );

        assert_eq!(FormulaValue::Empty.to_text(), Ok(String::new()));
        assert_eq!(FormulaValue::Number(3.0).to_text(), Ok("3".to_string()));
        assert_eq!(FormulaValue::Number(0.5).to_text(), Ok("0.5".to_string()));
        assert_eq!(FormulaValue::from("x").to_bool(), Err(CellError::Value));
        assert_eq!(FormulaValue::from("true").to_bool(), Ok(true));
    }

    #[test]
    fn test_compare_values() {
        use std::cmp::Ordering::*;
        let n = |x: f64| FormulaValue::Number(x);
        assert_eq!(compare_values(&n(1.0), &n(2.0)), Less);
        assert_eq!(compare_values(&"abc".into(), &"ABC".into()), Equal);
        assert_eq!(compare_values(&n(100.0), &"a".into()), Less);
        assert_eq!(compare_values(&"z".into(), &true.into()), Less);
        assert_eq!(compare_values(&FormulaValue::Empty, &n(0.0)), Equal);
        assert_eq!(compare_values(&FormulaValue::Empty, &"".into()), Equal);
        assert_eq!(compare_values(&FormulaValue::Empty, &false.into()), Equal);
    }

    #[test]
    fn test_array_scalar_and_flatten() {
        let array = FormulaValue::Array(vec![
            vec![FormulaValue::Number(1.0), FormulaValue::Number(2.0)],
            vec![FormulaValue::Number(3.0), FormulaValue::Empty],
        ]);
        assert_eq!(array.scalar(), FormulaValue::Number(1.0));
        assert_eq!(array.flatten().len(), 4);
        assert_eq!(CellValue::from(array), CellValue::Number(1.0));
    }

    #[test]
    fn test_cell_value_conversion() {
        let cached = CellValue::Formula {
            text: "=1".into(),
            cached_value: Some(Box::new(CellValue::Number(1.0))),
        };
        assert_eq!(FormulaValue::from(&cached), FormulaValue::Number(1.0));
        assert_eq!(
            FormulaValue::from(CellValue::formula("=1")),
            FormulaValue::Empty
        );
        assert_eq!(
            CellValue::from(FormulaValue::Number(f64::INFINITY)),
            CellValue::Error(CellError::Num)
        );
    }
}
