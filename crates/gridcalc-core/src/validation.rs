//! List values for list-style data validation
//!
//! A validation list is stored as a single quoted formula, `"Yes,No,Maybe"`,
//! and the serialized form may hold at most [`MAX_LIST_LENGTH`] characters.
//! [`ListValues`] keeps the items as a vector and checks that limit on every
//! mutation, so the list can never drift into a state that cannot be written
//! back.
//!
//! ```rust
//! use gridcalc_core::ListValues;
//!
//! let mut list = ListValues::parse_formula("\"Yes,No\"").unwrap();
//! list.push("Maybe").unwrap();
//! assert_eq!(list.to_formula(), "\"Yes,No,Maybe\"");
//! ```

use crate::error::{Error, Result};
use std::fmt;

/// Longest serialized list accepted, in characters
pub const MAX_LIST_LENGTH: usize = 255;

const SEPARATOR: char = ',';

/// Ordered choices of a validation list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListValues {
    items: Vec<String>,
}

impl ListValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from items, validating the result as a whole
    pub fn from_values<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = values.into_iter().map(Into::into).collect();
        for item in &items {
            check_item(item)?;
        }
        check_length(&items)?;
        Ok(Self { items })
    }

    /// Parse the quoted formula form, with or without a leading `=`.
    ///
    /// Doubled quotes inside the string stand for one quote.
    pub fn parse_formula(formula: &str) -> Result<Self> {
        let body = formula.trim();
        let body = body.strip_prefix('=').unwrap_or(body).trim();
        let inner = body
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .filter(|_| body.len() >= 2)
            .ok_or_else(|| Error::InvalidListFormula(formula.to_string()))?;
        if inner.replace("\"\"", "").contains('"') {
            return Err(Error::InvalidListFormula(formula.to_string()));
        }
        let inner = inner.replace("\"\"", "\"");
        if inner.is_empty() {
            return Ok(Self::new());
        }
        Self::from_values(inner.split(SEPARATOR))
    }

    /// Render the quoted formula form
    pub fn to_formula(&self) -> String {
        format!("\"{}\"", self.serialized().replace('"', "\"\""))
    }

    /// Items joined by the separator, as counted against the length limit
    pub fn serialized(&self) -> String {
        self.items.join(",")
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.items.iter().any(|item| item.eq_ignore_ascii_case(value))
    }

    pub fn push(&mut self, value: impl Into<String>) -> Result<()> {
        let len = self.items.len();
        self.insert(len, value)
    }

    pub fn insert(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        if index > self.items.len() {
            return Err(Error::ListIndexOutOfBounds(index, self.items.len()));
        }
        let value = value.into();
        check_item(&value)?;
        self.try_mutate(|items| items.insert(index, value))
    }

    /// Replace the item at `index`, returning the previous one
    pub fn set(&mut self, index: usize, value: impl Into<String>) -> Result<String> {
        if index >= self.items.len() {
            return Err(Error::ListIndexOutOfBounds(index, self.items.len()));
        }
        let value = value.into();
        check_item(&value)?;
        let mut previous = String::new();
        self.try_mutate(|items| previous = std::mem::replace(&mut items[index], value))?;
        Ok(previous)
    }

    pub fn remove(&mut self, index: usize) -> Result<String> {
        if index >= self.items.len() {
            return Err(Error::ListIndexOutOfBounds(index, self.items.len()));
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Apply a change to a copy and commit it only if the result still fits
    fn try_mutate(&mut self, change: impl FnOnce(&mut Vec<String>)) -> Result<()> {
        let mut candidate = self.items.clone();
        change(&mut candidate);
        check_length(&candidate)?;
        self.items = candidate;
        Ok(())
    }
}

impl fmt::Display for ListValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_formula())
    }
}

fn check_item(item: &str) -> Result<()> {
    if item.contains(SEPARATOR) {
        return Err(Error::InvalidListFormula(format!(
            "item '{}' contains the separator",
            item
        )));
    }
    Ok(())
}

fn check_length(items: &[String]) -> Result<()> {
    let length = items.iter().map(|s| s.chars().count()).sum::<usize>()
        + items.len().saturating_sub(1);
    if length > MAX_LIST_LENGTH {
        return Err(Error::ListTooLong {
            length,
            max: MAX_LIST_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_render() {
        let list = ListValues::parse_formula("=\"Red,Green,Blue\"").unwrap();
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["Red", "Green", "Blue"]);
        assert_eq!(list.to_formula(), "\"Red,Green,Blue\"");

        let quoted = ListValues::parse_formula("\"say \"\"hi\"\",bye\"").unwrap();
        assert_eq!(quoted.get(0), Some("say \"hi\""));
        assert_eq!(quoted.to_formula(), "\"say \"\"hi\"\",bye\"");

        assert!(ListValues::parse_formula("\"\"").unwrap().is_empty());
        assert!(ListValues::parse_formula("Red,Green").is_err());
        assert!(ListValues::parse_formula("\"").is_err());
        assert!(ListValues::parse_formula("\"a\"b\"").is_err());
    }

    #[test]
    fn test_mutations_keep_order() {
        let mut list = ListValues::from_values(["a", "c"]).unwrap();
        list.insert(1, "b").unwrap();
        list.push("d").unwrap();
        assert_eq!(list.set(0, "A").unwrap(), "a");
        assert_eq!(list.remove(3).unwrap(), "d");
        assert_eq!(list.serialized(), "A,b,c");
        assert!(list.contains("B"));

        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_rejected_mutation_leaves_list_unchanged() {
        let mut list = ListValues::from_values(["x".repeat(250)]).unwrap();
        assert_eq!(list.serialized().len(), 250);

        // 250 + separator + 4 = 255 fits
        list.push("abcd").unwrap();
        assert_eq!(list.len(), 2);

        let before = list.clone();
        assert!(matches!(
            list.push("e"),
            Err(Error::ListTooLong { length: 257, max: 255 })
        ));
        assert!(matches!(list.set(1, "abcde"), Err(Error::ListTooLong { .. })));
        assert!(matches!(list.insert(0, "z"), Err(Error::ListTooLong { .. })));
        assert_eq!(list, before);
    }

    #[test]
    fn test_bad_positions_and_items() {
        let mut list = ListValues::new();
        assert!(matches!(
            list.insert(1, "a"),
            Err(Error::ListIndexOutOfBounds(1, 0))
        ));
        assert!(list.remove(0).is_err());
        assert!(list.push("a,b").is_err());
        assert!(ListValues::from_values(["y".repeat(256)]).is_err());
    }
}
