//! Formula parser
//!
//! A recursive descent parser over the token stream with spreadsheet operator
//! precedence.

use crate::ast::{
    BinaryOperator, CellReference, FormulaExpr, NameReference, RangeReference, UnaryOperator,
};
use crate::error::{FormulaError, FormulaResult};
use crate::token::{tokenize, Token};
use gridcalc_core::CellRange;

/// Parse formula text into an AST
///
/// # Example
/// ```rust
/// use gridcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    parse_tokens(&tokenize(formula)?)
}

/// Parse an already tokenized formula
pub fn parse_tokens(tokens: &[Token]) -> FormulaResult<FormulaExpr> {
    if tokens.is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }
    let mut parser = TokenParser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    if let Some(extra) = parser.current() {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            extra
        )));
    }
    Ok(expr)
}

struct TokenParser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> TokenParser<'t> {
    fn current(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn at(&self, expected: &Token) -> bool {
        self.current() == Some(expected)
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.at(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> FormulaResult<FormulaExpr>,
        pick: fn(&Token) -> Option<BinaryOperator>,
    ) -> FormulaResult<FormulaExpr> {
        let mut left = next(self)?;
        while let Some(op) = self.current().and_then(pick) {
            self.pos += 1;
            let right = next(self)?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        self.binary_level(Self::parse_concatenation, |t| match t {
            Token::Equal => Some(BinaryOperator::Equal),
            Token::NotEqual => Some(BinaryOperator::NotEqual),
            Token::LessThan => Some(BinaryOperator::LessThan),
            Token::LessEqual => Some(BinaryOperator::LessEqual),
            Token::GreaterThan => Some(BinaryOperator::GreaterThan),
            Token::GreaterEqual => Some(BinaryOperator::GreaterEqual),
            _ => None,
        })
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        self.binary_level(Self::parse_additive, |t| {
            matches!(t, Token::Ampersand).then_some(BinaryOperator::Concat)
        })
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        self.binary_level(Self::parse_multiplicative, |t| match t {
            Token::Plus => Some(BinaryOperator::Add),
            Token::Minus => Some(BinaryOperator::Subtract),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        self.binary_level(Self::parse_exponent, |t| match t {
            Token::Star => Some(BinaryOperator::Multiply),
            Token::Slash => Some(BinaryOperator::Divide),
            _ => None,
        })
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;
        if self.at(&Token::Caret) {
            self.pos += 1;
            let right = self.parse_exponent()?;
            return Ok(FormulaExpr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current() {
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                return Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                });
            }
            Some(Token::Plus) => {
                self.pos += 1;
                return self.parse_unary();
            }
            _ => {}
        }

        let mut expr = self.parse_range()?;
        while self.at(&Token::Percent) {
            self.pos += 1;
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;
        if !self.at(&Token::Colon) {
            return Ok(left);
        }
        self.pos += 1;
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                let sheet = match (start.sheet, end.sheet) {
                    (Some(a), Some(b)) if !a.eq_ignore_ascii_case(&b) => {
                        return Err(FormulaError::Parse(
                            "Range references must be on the same sheet".into(),
                        ))
                    }
                    (a, b) => a.or(b),
                };
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet,
                    range: CellRange::new(start.address, end.address),
                }))
            }
            _ => Err(FormulaError::Parse(
                "Range operator needs a cell reference on both sides".into(),
            )),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let token = self
            .consume()
            .ok_or_else(|| FormulaError::Parse("Unexpected end of formula".into()))?;
        match token {
            Token::Number(n) => Ok(FormulaExpr::Number(*n)),
            Token::String(s) => Ok(FormulaExpr::String(s.clone())),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(*b)),
            Token::Error(e) => Ok(FormulaExpr::Error(*e)),
            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Token::LeftBrace => self.parse_array(),
            Token::SheetPrefix(sheet) => match self.consume() {
                Some(Token::CellRef(address)) => Ok(FormulaExpr::CellRef(CellReference {
                    sheet: Some(sheet.clone()),
                    address: *address,
                })),
                Some(Token::Identifier(name)) if !self.at(&Token::LeftParen) => {
                    Ok(FormulaExpr::NameRef(NameReference {
                        sheet: Some(sheet.clone()),
                        name: name.clone(),
                    }))
                }
                other => Err(FormulaError::Parse(format!(
                    "Expected cell reference or name after '{}!', got {:?}",
                    sheet, other
                ))),
            },
            Token::CellRef(address) => Ok(FormulaExpr::CellRef(CellReference {
                sheet: None,
                address: *address,
            })),
            Token::Identifier(name) if self.at(&Token::LeftParen) => {
                self.parse_function_call(name)
            }
            Token::Identifier(name) => Ok(FormulaExpr::NameRef(NameReference {
                sheet: None,
                name: name.clone(),
            })),
            other => Err(FormulaError::Parse(format!("Unexpected token {:?}", other))),
        }
    }

    /// `{1,2;3,4}`: commas separate columns, semicolons rows
    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        if self.at(&Token::RightBrace) {
            self.pos += 1;
            return Err(FormulaError::Parse("Empty array constant".into()));
        }
        loop {
            row.push(self.parse_expression()?);
            match self.consume() {
                Some(Token::Comma) => {}
                Some(Token::Semicolon) => rows.push(std::mem::take(&mut row)),
                Some(Token::RightBrace) => break,
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Expected ',' ';' or '}}' in array, got {:?}",
                        other
                    )))
                }
            }
        }
        rows.push(row);
        if rows.iter().any(|r| r.len() != rows[0].len()) {
            return Err(FormulaError::Parse("Array rows differ in length".into()));
        }
        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: &str) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;
        let mut args = Vec::new();
        if !self.at(&Token::RightParen) {
            args.push(self.parse_expression()?);
            while self.at(&Token::Comma) {
                self.pos += 1;
                args.push(self.parse_expression()?);
            }
        }
        self.expect(&Token::RightParen)?;
        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::{CellAddress, CellError};

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
        assert_eq!(parse_formula("=FALSE").unwrap(), FormulaExpr::Boolean(false));
        assert_eq!(
            parse_formula("=#DIV/0!").unwrap(),
            FormulaExpr::Error(CellError::Div0)
        );
    }

    #[test]
    fn test_parse_precedence() {
        let ast = parse_formula("=1+2*3").unwrap();
        if let FormulaExpr::BinaryOp { op, left, right } = ast {
            assert_eq!(op, BinaryOperator::Add);
            assert_eq!(*left, FormulaExpr::Number(1.0));
            assert!(matches!(
                *right,
                FormulaExpr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    ..
                }
            ));
        } else {
            panic!("Expected BinaryOp");
        }

        let ast = parse_formula("=(1+2)*3").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Multiply,
                ..
            }
        ));

        let ast = parse_formula("=\"a\"&1+2=\"a3\"").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Equal,
                ..
            }
        ));
    }

    #[test]
    fn test_power_is_right_associative() {
        let ast = parse_formula("=2^3^2").unwrap();
        if let FormulaExpr::BinaryOp { left, right, .. } = ast {
            assert_eq!(*left, FormulaExpr::Number(2.0));
            assert!(matches!(*right, FormulaExpr::BinaryOp { .. }));
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_parse_unary() {
        assert!(matches!(
            parse_formula("=-5").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                ..
            }
        ));
        assert!(matches!(
            parse_formula("=50%").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(
            parse_formula("=Data!$B$2").unwrap(),
            FormulaExpr::CellRef(CellReference {
                sheet: Some("Data".into()),
                address: CellAddress::with_absolute(1, 1, true, true),
            })
        );

        let ast = parse_formula("=Data!A1:B10").unwrap();
        if let FormulaExpr::RangeRef(range_ref) = ast {
            assert_eq!(range_ref.sheet.as_deref(), Some("Data"));
            assert_eq!(range_ref.range, CellRange::from_indices(0, 0, 9, 1));
        } else {
            panic!("Expected RangeRef");
        }

        assert_eq!(
            parse_formula("=TaxRate").unwrap(),
            FormulaExpr::NameRef(NameReference {
                sheet: None,
                name: "TaxRate".into()
            })
        );
        assert_eq!(
            parse_formula("='Q1 Data'!TaxRate").unwrap(),
            FormulaExpr::NameRef(NameReference {
                sheet: Some("Q1 Data".into()),
                name: "TaxRate".into()
            })
        );
        assert!(parse_formula("=Data!SUM(A1)").is_err());
        assert!(parse_formula("=A1:Other!B2").is_ok());
        assert!(parse_formula("=One!A1:Two!B2").is_err());
        assert!(parse_formula("=A1:5").is_err());
    }

    #[test]
    fn test_parse_function() {
        let ast = parse_formula("=if(A1>0,SUM(B1:B10),0)").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "IF");
            assert_eq!(args.len(), 3);
            assert!(matches!(&args[1], FormulaExpr::Function { name, .. } if name == "SUM"));
        } else {
            panic!("Expected Function");
        }

        let ast = parse_formula("=NOW()").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { ref args, .. } if args.is_empty()));
    }

    #[test]
    fn test_parse_array() {
        let ast = parse_formula("={1,2;3,4}").unwrap();
        if let FormulaExpr::Array(rows) = ast {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1], vec![FormulaExpr::Number(3.0), FormulaExpr::Number(4.0)]);
        } else {
            panic!("Expected Array");
        }
        assert!(parse_formula("={1,2;3}").is_err());
        assert!(parse_formula("={}").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_formula("=").is_err());
        assert!(parse_formula("=1+").is_err());
        assert!(parse_formula("=(1").is_err());
        assert!(parse_formula("=1 2").is_err());
        assert!(parse_formula("=SUM(1,").is_err());
    }
}
