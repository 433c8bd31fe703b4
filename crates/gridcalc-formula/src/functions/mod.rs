//! Built-in spreadsheet functions
//!
//! Every function is a leaf in one dispatch table keyed by upper-case name.
//! A [`FunctionDef`] carries what the evaluator needs before calling it:
//! arity bounds, volatility, whether error operands short-circuit the call,
//! and whether range operands arrive as values or as references.

pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod text;
pub mod workday;

use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::value::{FormulaValue, FunctionArgument};
use gridcalc_core::CellError;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Implementation over evaluated operands
pub type EagerFn = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Implementation over unmaterialized reference operands
pub type ReferenceFn = fn(&[FunctionArgument], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function implementation signature
#[derive(Clone, Copy)]
pub enum FunctionImpl {
    Eager(EagerFn),
    ByReference(ReferenceFn),
}

/// What happens when an operand is an error value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// The first error operand becomes the result without calling the function
    Propagate,
    /// The function receives error operands and decides
    Intercept,
}

/// How range operands are passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentMode {
    /// Ranges are read into arrays before the call
    Eager,
    /// Cell and range operands arrive as [`FunctionArgument::Range`]
    ByReference,
}

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (recalculates every pass)
    pub volatile: bool,
    pub error_policy: ErrorPolicy,
}

impl FunctionDef {
    pub fn eager(name: &'static str, min_args: usize, max_args: Option<usize>, f: EagerFn) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation: FunctionImpl::Eager(f),
            volatile: false,
            error_policy: ErrorPolicy::Propagate,
        }
    }

    pub fn by_reference(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        f: ReferenceFn,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation: FunctionImpl::ByReference(f),
            volatile: false,
            error_policy: ErrorPolicy::Propagate,
        }
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub fn intercepting(mut self) -> Self {
        self.error_policy = ErrorPolicy::Intercept;
        self
    }

    pub fn argument_mode(&self) -> ArgumentMode {
        match self.implementation {
            FunctionImpl::Eager(_) => ArgumentMode::Eager,
            FunctionImpl::ByReference(_) => ArgumentMode::ByReference,
        }
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// Global registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_info_functions();
        registry.register_text_functions();
        registry.register_lookup_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function, replacing any previous definition
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    pub fn is_volatile(&self, name: &str) -> bool {
        self.get(name).is_some_and(|def| def.volatile)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef::eager("SUM", 1, None, math::fn_sum));
        self.register(FunctionDef::eager("PRODUCT", 1, None, math::fn_product));
        self.register(FunctionDef::eager("AVERAGE", 1, None, math::fn_average));
        self.register(FunctionDef::eager("MIN", 1, None, math::fn_min));
        self.register(FunctionDef::eager("MAX", 1, None, math::fn_max));
        self.register(FunctionDef::eager("COUNT", 1, None, math::fn_count));
        self.register(FunctionDef::eager("COUNTA", 1, None, math::fn_counta));
        self.register(FunctionDef::eager("ABS", 1, Some(1), math::fn_abs));
        self.register(FunctionDef::eager("SIGN", 1, Some(1), math::fn_sign));
        self.register(FunctionDef::eager("INT", 1, Some(1), math::fn_int));
        self.register(FunctionDef::eager("MOD", 2, Some(2), math::fn_mod));
        self.register(FunctionDef::eager("POWER", 2, Some(2), math::fn_power));
        self.register(FunctionDef::eager("SQRT", 1, Some(1), math::fn_sqrt));
        self.register(FunctionDef::eager("PI", 0, Some(0), math::fn_pi));
        self.register(FunctionDef::eager("ROUND", 1, Some(2), math::fn_round));
        self.register(FunctionDef::eager("ROUNDUP", 1, Some(2), math::fn_roundup));
        self.register(FunctionDef::eager("ROUNDDOWN", 1, Some(2), math::fn_rounddown));
        self.register(FunctionDef::eager("RAND", 0, Some(0), math::fn_rand).volatile());
        self.register(
            FunctionDef::eager("RANDBETWEEN", 2, Some(2), math::fn_randbetween).volatile(),
        );
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef::eager("IF", 2, Some(3), logical::fn_if).intercepting());
        self.register(
            FunctionDef::eager("IFERROR", 2, Some(2), logical::fn_iferror).intercepting(),
        );
        self.register(FunctionDef::eager("IFNA", 2, Some(2), logical::fn_ifna).intercepting());
        self.register(FunctionDef::eager("AND", 1, None, logical::fn_and));
        self.register(FunctionDef::eager("OR", 1, None, logical::fn_or));
        self.register(FunctionDef::eager("XOR", 1, None, logical::fn_xor));
        self.register(FunctionDef::eager("NOT", 1, Some(1), logical::fn_not));
        self.register(FunctionDef::eager("TRUE", 0, Some(0), logical::fn_true));
        self.register(FunctionDef::eager("FALSE", 0, Some(0), logical::fn_false));
    }

    fn register_info_functions(&mut self) {
        self.register(FunctionDef::eager("ISERROR", 1, Some(1), info::fn_iserror).intercepting());
        self.register(FunctionDef::eager("ISERR", 1, Some(1), info::fn_iserr).intercepting());
        self.register(FunctionDef::eager("ISNA", 1, Some(1), info::fn_isna).intercepting());
        self.register(
            FunctionDef::eager("ERROR.TYPE", 1, Some(1), info::fn_error_type).intercepting(),
        );
        // Type tests answer FALSE for error operands instead of failing.
        self.register(FunctionDef::eager("ISBLANK", 1, Some(1), info::fn_isblank).intercepting());
        self.register(
            FunctionDef::eager("ISNUMBER", 1, Some(1), info::fn_isnumber).intercepting(),
        );
        self.register(FunctionDef::eager("ISTEXT", 1, Some(1), info::fn_istext).intercepting());
        self.register(
            FunctionDef::eager("ISLOGICAL", 1, Some(1), info::fn_islogical).intercepting(),
        );
        self.register(FunctionDef::eager("NA", 0, Some(0), info::fn_na));
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef::eager("CONCATENATE", 1, None, text::fn_concatenate));
        self.register(FunctionDef::eager("CONCAT", 1, None, text::fn_concatenate));
        self.register(FunctionDef::eager("LEN", 1, Some(1), text::fn_len));
        self.register(FunctionDef::eager("LEFT", 1, Some(2), text::fn_left));
        self.register(FunctionDef::eager("RIGHT", 1, Some(2), text::fn_right));
        self.register(FunctionDef::eager("MID", 3, Some(3), text::fn_mid));
        self.register(FunctionDef::eager("UPPER", 1, Some(1), text::fn_upper));
        self.register(FunctionDef::eager("LOWER", 1, Some(1), text::fn_lower));
        self.register(FunctionDef::eager("TRIM", 1, Some(1), text::fn_trim));
        self.register(FunctionDef::eager("EXACT", 2, Some(2), text::fn_exact));
        self.register(FunctionDef::eager("REPT", 2, Some(2), text::fn_rept));
    }

    fn register_lookup_functions(&mut self) {
        self.register(FunctionDef::by_reference("VLOOKUP", 3, Some(4), lookup::fn_vlookup));
        self.register(FunctionDef::by_reference("HLOOKUP", 3, Some(4), lookup::fn_hlookup));
        self.register(FunctionDef::by_reference("MATCH", 2, Some(3), lookup::fn_match));
        self.register(FunctionDef::by_reference("LOOKUP", 2, Some(3), lookup::fn_lookup));
        self.register(FunctionDef::by_reference("ROW", 0, Some(1), lookup::fn_row));
        self.register(FunctionDef::by_reference("COLUMN", 0, Some(1), lookup::fn_column));
        self.register(FunctionDef::by_reference("ROWS", 1, Some(1), lookup::fn_rows));
        self.register(FunctionDef::by_reference("COLUMNS", 1, Some(1), lookup::fn_columns));
        self.register(FunctionDef::eager("INDEX", 2, Some(3), lookup::fn_index));
        self.register(FunctionDef::eager("CHOOSE", 2, None, lookup::fn_choose).intercepting());
    }

    fn register_date_functions(&mut self) {
        self.register(FunctionDef::eager("DATE", 3, Some(3), date::fn_date));
        self.register(FunctionDef::eager("YEAR", 1, Some(1), date::fn_year));
        self.register(FunctionDef::eager("MONTH", 1, Some(1), date::fn_month));
        self.register(FunctionDef::eager("DAY", 1, Some(1), date::fn_day));
        self.register(FunctionDef::eager("WEEKDAY", 1, Some(2), date::fn_weekday));
        self.register(FunctionDef::eager("TODAY", 0, Some(0), date::fn_today).volatile());
        self.register(FunctionDef::eager("NOW", 0, Some(0), date::fn_now).volatile());
        self.register(FunctionDef::eager("WORKDAY", 2, Some(3), workday::fn_workday));
        self.register(FunctionDef::eager("WORKDAY.INTL", 2, Some(4), workday::fn_workday_intl));
        self.register(FunctionDef::eager("NETWORKDAYS", 2, Some(3), workday::fn_networkdays));
        self.register(
            FunctionDef::eager("NETWORKDAYS.INTL", 2, Some(4), workday::fn_networkdays_intl),
        );
    }
}

/// First error among the operands, looking inside arrays
pub(crate) fn first_error(args: &[FormulaValue]) -> Option<FormulaValue> {
    args.iter()
        .flat_map(FormulaValue::flatten)
        .find(|v| v.is_error())
        .cloned()
}

/// Numeric operand at `index`, blank when absent
pub(crate) fn number(args: &[FormulaValue], index: usize) -> Result<f64, CellError> {
    args.get(index).map_or(Ok(0.0), FormulaValue::to_number)
}

/// Numeric operand truncated toward zero
pub(crate) fn integer(args: &[FormulaValue], index: usize) -> Result<i64, CellError> {
    number(args, index).map(|n| n.trunc() as i64)
}

/// Text operand at `index`, `""` when absent
pub(crate) fn text(args: &[FormulaValue], index: usize) -> Result<String, CellError> {
    args.get(index).map_or(Ok(String::new()), FormulaValue::to_text)
}

/// Fold a spreadsheet-error result into a value
pub(crate) fn cell_result(result: Result<FormulaValue, CellError>) -> FormulaResult<FormulaValue> {
    Ok(result.unwrap_or_else(FormulaValue::Error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let def = registry().get("vlookup").unwrap();
        assert_eq!(def.name, "VLOOKUP");
        assert_eq!(def.argument_mode(), ArgumentMode::ByReference);
        assert_eq!(def.error_policy, ErrorPolicy::Propagate);
    }

    #[test]
    fn test_volatile_functions() {
        for name in ["NOW", "TODAY", "RAND", "RANDBETWEEN"] {
            assert!(registry().is_volatile(name), "{} should be volatile", name);
        }
        assert!(!registry().is_volatile("SUM"));
        assert!(!registry().is_volatile("NOSUCH"));
    }

    #[test]
    fn test_intercepting_functions() {
        for name in [
            "IF", "IFERROR", "IFNA", "ISERROR", "ISERR", "ISNA", "ERROR.TYPE", "CHOOSE",
        ] {
            assert_eq!(
                registry().get(name).unwrap().error_policy,
                ErrorPolicy::Intercept,
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_reference_functions() {
        for name in [
            "VLOOKUP", "HLOOKUP", "MATCH", "LOOKUP", "ROW", "COLUMN", "ROWS", "COLUMNS",
        ] {
            assert_eq!(
                registry().get(name).unwrap().argument_mode(),
                ArgumentMode::ByReference,
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_names_are_sorted() {
        let names = registry().names();
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(names.contains(&"WORKDAY.INTL"));
    }
}
