//! What a cell holds
//!
//! A cell is blank, holds a constant, or holds formula text together with the
//! result of the most recent calculation. Spreadsheet errors are constants
//! like any other, so a division by zero is stored rather than raised.

use std::fmt;
use std::sync::Arc;

/// Content of one cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,

    Boolean(bool),

    /// Numbers, including serial dates and times
    Number(f64),

    String(SharedString),

    /// `#DIV/0!` and friends, stored as data
    Error(CellError),

    /// Formula text plus the value it produced on the last calculation
    Formula {
        /// Always begins with `=`
        text: String,
        /// `None` until a calculation has written a result
        cached_value: Option<Box<CellValue>>,
    },
}

impl CellValue {
    pub fn string<S: Into<String>>(s: S) -> Self {
        CellValue::String(SharedString::new(s.into()))
    }

    /// Uncalculated formula; `"A1+1"` and `"=A1+1"` store the same text
    pub fn formula<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        let text = if text.starts_with('=') {
            text
        } else {
            format!("={}", text)
        };
        CellValue::Formula {
            text,
            cached_value: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. })
    }

    /// True for stored errors and for formulas whose last result was one
    pub fn is_error(&self) -> bool {
        matches!(self.effective_value(), CellValue::Error(_))
    }

    /// Numbers as-is, TRUE/FALSE as 1/0; text, errors and blanks have none
    pub fn as_number(&self) -> Option<f64> {
        match self.effective_value() {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Booleans as-is, numbers true when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match self.effective_value() {
            CellValue::Boolean(b) => Some(*b),
            CellValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Text content; numbers are not formatted
    pub fn as_string(&self) -> Option<&str> {
        if let CellValue::String(s) = self.effective_value() {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn formula_text(&self) -> Option<&str> {
        if let CellValue::Formula { text, .. } = self {
            Some(text)
        } else {
            None
        }
    }

    /// What the cell shows: the last result of a formula, blank for a
    /// formula that has not been calculated, the constant otherwise
    pub fn effective_value(&self) -> &CellValue {
        match self {
            CellValue::Formula {
                cached_value: Some(result),
                ..
            } => result.effective_value(),
            CellValue::Formula { .. } => &CellValue::Empty,
            constant => constant,
        }
    }
}

/// Renders what the cell shows, falling back to the formula text before the
/// first calculation
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Formula {
                text,
                cached_value: None,
            } => f.write_str(text),
            CellValue::Formula {
                cached_value: Some(result),
                ..
            } => write!(f, "{}", result),
            CellValue::Empty => Ok(()),
            CellValue::Boolean(true) => f.write_str("TRUE"),
            CellValue::Boolean(false) => f.write_str("FALSE"),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::String(s) => f.write_str(s.as_str()),
            CellValue::Error(e) => f.write_str(e.as_str()),
        }
    }
}

macro_rules! number_from {
    ($($source:ty),*) => {
        $(
            impl From<$source> for CellValue {
                fn from(n: $source) -> Self {
                    CellValue::Number(f64::from(n))
                }
            }
        )*
    };
}

number_from!(i32, f64);

/// Values beyond 2^53 lose precision
impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(flag: bool) -> Self {
        CellValue::Boolean(flag)
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::string(text)
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        CellValue::string(text)
    }
}

impl From<CellError> for CellValue {
    fn from(error: CellError) -> Self {
        CellValue::Error(error)
    }
}

/// Error values a formula can produce or a cell can hold.
///
/// They are results, not failures: `=1/0` calculates successfully to
/// [`CellError::Div0`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellError {
    /// `#NULL!`, ranges that do not intersect
    Null,
    /// `#DIV/0!`
    Div0,
    /// `#VALUE!`, an operand of the wrong kind
    Value,
    /// `#REF!`, a reference to a missing sheet or cell, or a cycle
    Ref,
    /// `#NAME?`, an unknown function or defined name
    Name,
    /// `#NUM!`, a number out of range such as a date past 9999
    Num,
    /// `#N/A`, a lookup with no match
    Na,
    /// `#GETTING_DATA`
    GettingData,
}

impl CellError {
    /// Ordered by `ERROR.TYPE` code
    pub const ALL: [CellError; 8] = [
        CellError::Null,
        CellError::Div0,
        CellError::Value,
        CellError::Ref,
        CellError::Name,
        CellError::Num,
        CellError::Na,
        CellError::GettingData,
    ];

    /// Literal as written in a formula
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
            CellError::GettingData => "#GETTING_DATA",
        }
    }

    /// Inverse of [`CellError::as_str`], ignoring case and surrounding space
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// `ERROR.TYPE` code, 1 for `#NULL!` through 8 for `#GETTING_DATA`
    pub fn type_number(&self) -> u8 {
        Self::ALL
            .iter()
            .zip(1u8..)
            .find_map(|(e, code)| (e == self).then_some(code))
            .unwrap_or_default()
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable text behind an `Arc`; cloning a text cell into the evaluator
/// does not copy the characters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SharedString(Arc<str>);

impl SharedString {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        SharedString(Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SharedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SharedString {
    fn from(text: &str) -> Self {
        SharedString::new(text)
    }
}

impl From<String> for SharedString {
    fn from(text: String) -> Self {
        SharedString::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_from_rust_values() {
        assert_eq!(CellValue::from(42), CellValue::Number(42.0));
        assert_eq!(CellValue::from(-3i64), CellValue::Number(-3.0));
        assert_eq!(CellValue::from(false), CellValue::Boolean(false));
        assert_eq!(CellValue::from("hello").as_string(), Some("hello"));
        assert_eq!(CellValue::from(CellError::Na), CellValue::Error(CellError::Na));
    }

    #[test]
    fn test_formula_reads_through_cache() {
        let mut v = CellValue::formula("A1+1");
        assert_eq!(v.formula_text(), Some("=A1+1"));
        assert_eq!(v.effective_value(), &CellValue::Empty);
        assert_eq!(v.as_number(), None);
        assert_eq!(v.to_string(), "=A1+1");

        if let CellValue::Formula { cached_value, .. } = &mut v {
            *cached_value = Some(Box::new(CellValue::Error(CellError::Div0)));
        }
        assert!(v.is_error());
        assert_eq!(v.to_string(), "#DIV/0!");
    }

    #[test]
    fn test_numeric_and_logical_views() {
        assert_eq!(CellValue::Number(42.0).as_number(), Some(42.0));
        assert_eq!(CellValue::Boolean(true).as_number(), Some(1.0));
        assert_eq!(CellValue::string("12").as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
        assert_eq!(CellValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(CellValue::string("TRUE").as_bool(), None);
    }

    #[test]
    fn test_error_literals() {
        for e in CellError::ALL {
            assert_eq!(CellError::parse(e.as_str()), Some(e));
        }
        assert_eq!(CellError::parse(" #n/a "), Some(CellError::Na));
        assert_eq!(CellError::parse("#SPILL!"), None);
        assert_eq!(CellError::Div0.to_string(), "#DIV/0!");
    }

    #[test]
    fn test_error_type_numbers() {
        let codes: Vec<u8> = CellError::ALL.iter().map(CellError::type_number).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
