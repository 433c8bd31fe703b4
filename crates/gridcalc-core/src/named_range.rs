//! Defined names
//!
//! A defined name gives a formula-visible identifier to a cell, a range, a
//! constant, or a whole expression. Names take part in dependency tracking just
//! like cells: a formula that mentions `TaxRate` depends on whatever `TaxRate`
//! refers to.
//!
//! ```text
//! TaxRate   -> Sheet1!$B$1
//! Sales     -> Sheet1!$A$2:$A$100
//! Total     -> =SUM(Sales)*(1+TaxRate)
//! ```

use crate::error::{Error, Result};
use ahash::AHashMap;

/// Scope of a defined name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Visible only from formulas on the given sheet
    Sheet(usize),
}

/// A defined name
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// Name as written by the user; lookups ignore case
    pub name: String,
    pub scope: NameScope,
    /// Reference or expression text, with or without a leading `=`
    pub refers_to: String,
    pub comment: Option<String>,
}

impl NamedRange {
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
            comment: None,
        }
    }

    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet_index: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet_index))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The referenced expression without a leading `=`
    pub fn expression(&self) -> &str {
        self.refers_to
            .strip_prefix('=')
            .unwrap_or(&self.refers_to)
            .trim()
    }

    /// Check that a name is usable in formulas: starts with a letter, `_` or
    /// `\`, continues with letters, digits, `_` or `.`, and cannot be read as a
    /// cell address or a boolean.
    pub fn validate_name(name: &str) -> Result<()> {
        let invalid = || Error::InvalidName(name.to_string());
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' || c == '\\' => {}
            _ => return Err(invalid()),
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(invalid());
        }
        if crate::CellAddress::parse(name).is_ok()
            || name.eq_ignore_ascii_case("TRUE")
            || name.eq_ignore_ascii_case("FALSE")
        {
            return Err(invalid());
        }
        Ok(())
    }
}

/// Defined names keyed case-insensitively per scope
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    names: AHashMap<(String, NameScope), NamedRange>,
}

impl NamedRangeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_lowercase(), scope)
    }

    /// Define a new name; fails if the name is malformed or already defined in
    /// the same scope
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        NamedRange::validate_name(&range.name)?;
        let key = Self::key(&range.name, range.scope);
        if self.names.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "'{}' is already defined in this scope",
                range.name
            )));
        }
        self.names.insert(key, range);
        Ok(())
    }

    /// Define or replace a name
    pub fn define_or_update(&mut self, range: NamedRange) -> Result<()> {
        NamedRange::validate_name(&range.name)?;
        self.names.insert(Self::key(&range.name, range.scope), range);
        Ok(())
    }

    /// Resolve a name as seen from `current_sheet`: the sheet-scoped
    /// definition wins over the workbook-scoped one.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.get_exact(name, NameScope::Sheet(current_sheet))
            .or_else(|| self.get_exact(name, NameScope::Workbook))
    }

    pub fn get_exact(&self, name: &str, scope: NameScope) -> Option<&NamedRange> {
        self.names.get(&Self::key(name, scope))
    }

    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.names.remove(&Self::key(name, scope))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.names.values()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Workbook-scoped names, sorted by lowercase name
    pub fn workbook_names(&self) -> Vec<&NamedRange> {
        self.sorted(|scope| scope == NameScope::Workbook)
    }

    /// Names scoped to one sheet, sorted by lowercase name
    pub fn sheet_names(&self, sheet_index: usize) -> Vec<&NamedRange> {
        self.sorted(|scope| scope == NameScope::Sheet(sheet_index))
    }

    fn sorted(&self, keep: impl Fn(NameScope) -> bool) -> Vec<&NamedRange> {
        let mut out: Vec<_> = self
            .names
            .iter()
            .filter(|((_, scope), _)| keep(*scope))
            .collect();
        out.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));
        out.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_strips_equals() {
        let nr = NamedRange::workbook_scope("Total", "=SUM(A1:A10)");
        assert_eq!(nr.expression(), "SUM(A1:A10)");
        let nr = NamedRange::workbook_scope("TaxRate", "Sheet1!$B$1");
        assert_eq!(nr.expression(), "Sheet1!$B$1");
    }

    #[test]
    fn test_collection_scope_lookup() {
        let mut coll = NamedRangeCollection::new();
        coll.define(NamedRange::workbook_scope("Rate", "0.05")).unwrap();
        coll.define(NamedRange::sheet_scope("Rate", "0.08", 0)).unwrap();

        assert_eq!(coll.get("Rate", 0).unwrap().refers_to, "0.08");
        assert_eq!(coll.get("Rate", 1).unwrap().refers_to, "0.05");
        assert_eq!(coll.sheet_names(0).len(), 1);
        assert_eq!(coll.workbook_names().len(), 1);
    }

    #[test]
    fn test_case_insensitive() {
        let mut coll = NamedRangeCollection::new();
        coll.define(NamedRange::workbook_scope("TaxRate", "0.05")).unwrap();

        assert!(coll.get("taxrate", 0).is_some());
        assert!(coll.get("TAXRATE", 3).is_some());
        assert!(coll
            .define(NamedRange::workbook_scope("TAXRATE", "0.10"))
            .is_err());
    }

    #[test]
    fn test_rejects_bad_names() {
        for bad in ["", "1abc", "A1", "xfd100", "TRUE", "has space", "a-b"] {
            assert!(NamedRange::validate_name(bad).is_err(), "{bad}");
        }
        for good in ["Rate", "_tmp", "Sales.2024", "ABCD1"] {
            assert!(NamedRange::validate_name(good).is_ok(), "{good}");
        }
    }
}
