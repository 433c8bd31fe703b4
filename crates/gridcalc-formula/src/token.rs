//! Formula tokens
//!
//! [`tokenize`] turns formula text into a flat token stream. The stream is what
//! the rest of the engine consumes: the parser builds an AST from it and the
//! dependency chain scans it for references without building an AST at all.

use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::{CellAddress, CellError};

/// A formula token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    /// Function name or defined name
    Identifier(String),
    /// Cell reference like `A1` or `$B$2`
    CellRef(CellAddress),
    /// Sheet qualifier like `Sheet1!` or `'My Sheet'!`, name unquoted
    SheetPrefix(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
}

/// Split formula text into tokens. A leading `=` is optional.
///
/// # Example
/// ```rust
/// use gridcalc_formula::token::{tokenize, Token};
///
/// let tokens = tokenize("=SUM(A1,2)").unwrap();
/// assert_eq!(tokens[0], Token::Identifier("SUM".into()));
/// assert_eq!(tokens.len(), 6);
/// ```
pub fn tokenize(formula: &str) -> FormulaResult<Vec<Token>> {
    let formula = formula.trim();
    let body = formula.strip_prefix('=').unwrap_or(formula);
    Lexer { input: body, pos: 0 }.run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> FormulaResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else {
                return Ok(tokens);
            };
            let next = self.peek_char_at(1);
            let token = match c {
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '*' => self.single(Token::Star),
                '/' => self.single(Token::Slash),
                '^' => self.single(Token::Caret),
                '%' => self.single(Token::Percent),
                '&' => self.single(Token::Ampersand),
                ':' => self.single(Token::Colon),
                ',' => self.single(Token::Comma),
                ';' => self.single(Token::Semicolon),
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                '{' => self.single(Token::LeftBrace),
                '}' => self.single(Token::RightBrace),
                '=' => self.single(Token::Equal),
                '<' if next == Some('=') => self.double(Token::LessEqual),
                '<' if next == Some('>') => self.double(Token::NotEqual),
                '<' => self.single(Token::LessThan),
                '>' if next == Some('=') => self.double(Token::GreaterEqual),
                '>' => self.single(Token::GreaterThan),
                '"' => self.scan_string()?,
                '\'' => self.scan_quoted_sheet()?,
                '#' => self.scan_error()?,
                c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                    self.scan_number()?
                }
                c if c.is_alphabetic() || c == '_' || c == '$' || c == '\\' => {
                    self.scan_identifier_or_ref()
                }
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Unexpected character '{}' at offset {}",
                        other, self.pos
                    )))
                }
            };
            tokens.push(token);
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.advance();
        self.advance();
        token
    }

    /// Text between double quotes, `""` standing for one quote
    fn scan_string(&mut self) -> FormulaResult<Token> {
        self.advance();
        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated string literal".into())),
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> FormulaResult<Token> {
        self.advance();
        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated sheet name".into())),
            }
        }
        if self.peek_char() != Some('!') {
            return Err(FormulaError::Parse(format!(
                "Expected '!' after sheet name '{}'",
                name
            )));
        }
        self.advance();
        Ok(Token::SheetPrefix(name))
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance();
        while self.peek_char().is_some_and(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?' | '_')
        }) {
            self.advance();
            // Error literals end at their terminator.
            if matches!(self.input[..self.pos].chars().last(), Some('!' | '?')) {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        CellError::parse(text)
            .map(Token::Error)
            .ok_or_else(|| FormulaError::Parse(format!("Unknown error literal '{}'", text)))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E'))
            && self
                .peek_char_at(1)
                .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            self.advance();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance();
            }
            self.skip_digits();
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Token::Number)
            .ok_or_else(|| FormulaError::Parse(format!("Invalid number '{}'", text)))
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '\\'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetPrefix(text.to_string());
        }

        // A following '(' makes it a call: LOG10(100) is a function, not a cell.
        if self.peek_char() == Some('(') {
            return Token::Identifier(text.to_string());
        }
        if text.eq_ignore_ascii_case("TRUE") {
            return Token::Boolean(true);
        }
        if text.eq_ignore_ascii_case("FALSE") {
            return Token::Boolean(false);
        }
        match CellAddress::parse(text) {
            Ok(address) => Token::CellRef(address),
            Err(_) => Token::Identifier(text.to_string()),
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("=1<>2<=3>=4&\"x\"").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::NotEqual,
                Token::Number(2.0),
                Token::LessEqual,
                Token::Number(3.0),
                Token::GreaterEqual,
                Token::Number(4.0),
                Token::Ampersand,
                Token::String("x".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_references() {
        let tokens = tokenize("Sheet2!$A$1:B3+'My Sheet'!C4").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::SheetPrefix("Sheet2".into()),
                Token::CellRef(CellAddress::with_absolute(0, 0, true, true)),
                Token::Colon,
                Token::CellRef(CellAddress::new(2, 1)),
                Token::Plus,
                Token::SheetPrefix("My Sheet".into()),
                Token::CellRef(CellAddress::new(3, 2)),
            ]
        );
    }

    #[test]
    fn test_identifiers_versus_cells() {
        let tokens = tokenize("LOG10(100)+TaxRate+WORKDAY.INTL(A1,1)+ABCD1").unwrap();
        assert_eq!(tokens[0], Token::Identifier("LOG10".into()));
        assert_eq!(tokens[5], Token::Identifier("TaxRate".into()));
        assert_eq!(tokens[7], Token::Identifier("WORKDAY.INTL".into()));
        assert_eq!(tokens[9], Token::CellRef(CellAddress::new(0, 0)));
        assert_eq!(tokens.last(), Some(&Token::Identifier("ABCD1".into())));
    }

    #[test]
    fn test_tokenize_literals() {
        let tokens = tokenize("{1.5e2,TRUE;#N/A,\"a\"\"b\"}").unwrap();
        assert_eq!(tokens[1], Token::Number(150.0));
        assert_eq!(tokens[3], Token::Boolean(true));
        assert_eq!(tokens[5], Token::Error(CellError::Na));
        assert_eq!(tokens[7], Token::String("a\"b".into()));

        let tokens = tokenize("#DIV/0!+#GETTING_DATA").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Error(CellError::Div0),
                Token::Plus,
                Token::Error(CellError::GettingData)
            ]
        );
    }

    #[test]
    fn test_tokenize_failures() {
        assert!(tokenize("=\"open").is_err());
        assert!(tokenize("=1 @ 2").is_err());
        assert!(tokenize("=#BOGUS!").is_err());
        assert!(tokenize("='Sheet").is_err());
        assert!(tokenize("=1E400").is_err());
    }

    #[test]
    fn test_empty_formula() {
        assert!(tokenize("=").unwrap().is_empty());
    }
}
