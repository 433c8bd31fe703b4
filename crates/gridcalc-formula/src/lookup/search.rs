//! Search algorithms shared by VLOOKUP, HLOOKUP, MATCH and LOOKUP

use super::LookupNavigator;
use crate::value::{compare_values, FormulaValue};
use regex::Regex;
use std::cmp::Ordering;

/// How keys are matched against the lookup value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Equal keys only; text is case-insensitive and honours `*` and `?`
    Exact,
    /// Largest key not greater than the value, keys sorted ascending
    ApproximateAscending,
    /// Smallest key not less than the value, keys sorted descending
    ApproximateDescending,
}

impl MatchMode {
    /// Mode for a `MATCH` match type
    pub fn from_match_type(match_type: i64) -> Self {
        match match_type {
            0 => MatchMode::Exact,
            t if t < 0 => MatchMode::ApproximateDescending,
            _ => MatchMode::ApproximateAscending,
        }
    }
}

/// A matching key
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Zero-based position of the key
    pub position: usize,
    /// Value the navigator returned for that key
    pub value: FormulaValue,
}

/// Scan the navigator from its current position
pub fn find(
    navigator: &mut dyn LookupNavigator,
    lookup_value: &FormulaValue,
    mode: MatchMode,
) -> Option<SearchHit> {
    match mode {
        MatchMode::Exact => find_exact(navigator, lookup_value),
        MatchMode::ApproximateAscending => find_approximate(navigator, lookup_value, Ordering::Less),
        MatchMode::ApproximateDescending => {
            find_approximate(navigator, lookup_value, Ordering::Greater)
        }
    }
}

fn hit(navigator: &dyn LookupNavigator) -> SearchHit {
    SearchHit {
        position: navigator.index(),
        value: navigator.lookup_value(),
    }
}

fn find_exact(navigator: &mut dyn LookupNavigator, lookup_value: &FormulaValue) -> Option<SearchHit> {
    let pattern = match lookup_value {
        FormulaValue::String(s) => wildcard_regex(s),
        _ => None,
    };
    loop {
        let key = navigator.current_value();
        let matched = match (&pattern, &key) {
            (Some(re), FormulaValue::String(text)) => re.is_match(text),
            _ => same_kind(lookup_value, &key) && compare_values(lookup_value, &key).is_eq(),
        };
        if matched {
            return Some(hit(navigator));
        }
        if !navigator.move_next() {
            return None;
        }
    }
}

/// `toward` is the ordering a key must have against the value to keep
/// scanning; the first key ordered the other way ends the scan.
fn find_approximate(
    navigator: &mut dyn LookupNavigator,
    lookup_value: &FormulaValue,
    toward: Ordering,
) -> Option<SearchHit> {
    let mut best = None;
    loop {
        let key = navigator.current_value();
        if same_kind(lookup_value, &key) {
            match compare_values(&key, lookup_value) {
                Ordering::Equal => return Some(hit(navigator)),
                ord if ord == toward => best = Some(hit(navigator)),
                _ => break,
            }
        }
        if !navigator.move_next() {
            break;
        }
    }
    best
}

/// Keys of another kind than the value never match and are skipped
fn same_kind(a: &FormulaValue, b: &FormulaValue) -> bool {
    matches!(
        (a, b),
        (FormulaValue::Number(_), FormulaValue::Number(_))
            | (FormulaValue::String(_), FormulaValue::String(_))
            | (FormulaValue::Boolean(_), FormulaValue::Boolean(_))
    )
}

/// Case-insensitive matcher for a text pattern with `*`, `?` and `~`
/// escapes, `None` when the text has no wildcard
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    if !pattern.contains(&['*', '?', '~'][..]) {
        return None;
    }
    let mut source = String::from("(?is)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '~' => {
                let escaped = chars.next().unwrap_or('~');
                source.push_str(&regex::escape(&escaped.to_string()));
            }
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}
