//! # gridcalc-formula
//!
//! Formula engine for gridcalc.
//!
//! This crate provides:
//! - Tokenizing and parsing (text → tokens → AST)
//! - Evaluation (AST → value) with spreadsheet errors carried as values
//! - Lookup navigation shared by the search functions
//! - A catalogue of built-in functions, including workday arithmetic
//! - The dependency chain that fixes calculation order
//!
//! Cell data is reached through the [`DataProvider`] trait, which
//! [`gridcalc_core::Workbook`] implements.
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_formula::{evaluate, parse_formula, EvaluationContext, FormulaValue};
//!
//! let ast = parse_formula("=IFERROR(1/0+5, -1)").unwrap();
//! let result = evaluate(&ast, &EvaluationContext::simple()).unwrap();
//! assert_eq!(result, FormulaValue::Number(-1.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lookup;
pub mod parser;
pub mod provider;
pub mod token;
pub mod value;

pub use ast::{
    BinaryOperator, CellReference, FormulaExpr, NameReference, RangeReference, UnaryOperator,
};
pub use dependency::{DependencyChain, FormulaCell};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, evaluate_tokens, EvaluationContext, EvaluationOptions};
pub use functions::workday::{
    Weekend, WorkdayCalculator, WorkdayCalculatorResult, WorkdayDirection,
};
pub use functions::{registry, FunctionRegistry};
pub use lookup::{
    create_navigator, LookupArguments, LookupDirection, LookupError, LookupNavigator, LookupSource,
};
pub use parser::{parse_formula, parse_tokens};
pub use provider::{CellInfo, DataProvider, NameInfo, RangeInfo};
pub use token::{tokenize, Token};
pub use value::{FormulaValue, FunctionArgument};
