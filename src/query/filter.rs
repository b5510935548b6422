//! Filter expression grammar
//!
//! A small boolean predicate language over row columns:
//!
//! ```text
//! expr       := term { OR term }
//! term       := factor { AND factor }
//! factor     := '(' expr ')' | comparison
//! comparison := column op literal | column IN '(' literal {',' literal} ')'
//! op         := '=' | '==' | '!=' | '<' | '<=' | '>' | '>='
//! literal    := number | 'text' | "text" | true | false
//! ```
//!
//! `AND` binds tighter than `OR`; keywords are case-insensitive. The parsed
//! AST is compiled against a column namespace at query compilation time and
//! evaluated per row, either inside the storage scan (pushdown) or after
//! the join; the evaluator is the same in both positions.

use super::{QueryError, Value};

/// Comparison operators of the filter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parsed predicate AST
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `column OP literal`
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    /// `column IN (literal, ...)`
    In { column: String, values: Vec<Value> },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    /// Parse a filter expression
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(QueryError::InvalidFilter(format!(
                "unexpected trailing input at token {}",
                parser.pos + 1
            )));
        }
        Ok(expr)
    }

    /// Visit every column name referenced by the expression
    pub(crate) fn for_each_column(&self, visit: &mut impl FnMut(&str)) {
        match self {
            FilterExpr::Compare { column, .. } | FilterExpr::In { column, .. } => visit(column),
            FilterExpr::And(a, b) | FilterExpr::Or(a, b) => {
                a.for_each_column(visit);
                b.for_each_column(visit);
            }
        }
    }

    /// Evaluate against a row, looking column values up by name
    pub(crate) fn evaluate(&self, lookup: &dyn Fn(&str) -> Value) -> bool {
        match self {
            FilterExpr::Compare { column, op, value } => {
                let cell = lookup(column);
                if cell.is_null() {
                    return false;
                }
                match op {
                    CompareOp::Eq => cell.equals(value),
                    CompareOp::Ne => !cell.equals(value),
                    CompareOp::Lt => matches!(cell.compare(value), Some(std::cmp::Ordering::Less)),
                    CompareOp::Le => matches!(
                        cell.compare(value),
                        Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                    ),
                    CompareOp::Gt => {
                        matches!(cell.compare(value), Some(std::cmp::Ordering::Greater))
                    }
                    CompareOp::Ge => matches!(
                        cell.compare(value),
                        Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                    ),
                }
            }
            FilterExpr::In { column, values } => {
                let cell = lookup(column);
                if cell.is_null() {
                    return false;
                }
                values.iter().any(|v| cell.equals(v))
            }
            FilterExpr::And(a, b) => a.evaluate(lookup) && b.evaluate(lookup),
            FilterExpr::Or(a, b) => a.evaluate(lookup) || b.evaluate(lookup),
        }
    }

    /// Flatten the top-level AND spine into its conjuncts
    pub(crate) fn into_conjuncts(self) -> Vec<FilterExpr> {
        match self {
            FilterExpr::And(a, b) => {
                let mut out = a.into_conjuncts();
                out.extend(b.into_conjuncts());
                out
            }
            other => vec![other],
        }
    }

    /// Rebuild a single expression from conjuncts
    pub(crate) fn conjoin(mut clauses: Vec<FilterExpr>) -> Option<FilterExpr> {
        let first = if clauses.is_empty() {
            return None;
        } else {
            clauses.remove(0)
        };
        Some(
            clauses
                .into_iter()
                .fold(first, |acc, c| FilterExpr::And(Box::new(acc), Box::new(c))),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    In,
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                }
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        tokens.push(Token::Op(CompareOp::Ne));
                    }
                    _ => {
                        return Err(QueryError::InvalidFilter(format!(
                            "expected '=' after '!' at position {start}"
                        )))
                    }
                }
            }
            '<' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Le));
                } else {
                    tokens.push(Token::Op(CompareOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Ge));
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(QueryError::InvalidFilter(format!(
                        "unterminated string literal starting at position {start}"
                    )));
                }
                tokens.push(Token::Literal(Value::Text(text)));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-'
                    {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number: f64 = text.parse().map_err(|_| {
                    QueryError::InvalidFilter(format!("malformed number '{text}'"))
                })?;
                tokens.push(Token::Literal(Value::Number(number)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.to_ascii_uppercase().as_str() {
                    "AND" => tokens.push(Token::And),
                    "OR" => tokens.push(Token::Or),
                    "IN" => tokens.push(Token::In),
                    "TRUE" => tokens.push(Token::Literal(Value::Bool(true))),
                    "FALSE" => tokens.push(Token::Literal(Value::Bool(false))),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            other => {
                return Err(QueryError::InvalidFilter(format!(
                    "unexpected character '{other}' at position {start}"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<FilterExpr, QueryError> {
        let mut left = self.term()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let right = self.term()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<FilterExpr, QueryError> {
        let mut left = self.factor()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let right = self.factor()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<FilterExpr, QueryError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(QueryError::InvalidFilter(
                        "missing closing parenthesis".to_string(),
                    )),
                }
            }
            Some(Token::Ident(column)) => self.comparison(column),
            other => Err(QueryError::InvalidFilter(format!(
                "expected column or '(' but found {other:?}"
            ))),
        }
    }

    fn comparison(&mut self, column: String) -> Result<FilterExpr, QueryError> {
        match self.next() {
            Some(Token::Op(op)) => {
                let value = self.literal()?;
                Ok(FilterExpr::Compare { column, op, value })
            }
            Some(Token::In) => {
                if !matches!(self.next(), Some(Token::LParen)) {
                    return Err(QueryError::InvalidFilter(
                        "expected '(' after IN".to_string(),
                    ));
                }
                let mut values = vec![self.literal()?];
                loop {
                    match self.next() {
                        Some(Token::Comma) => values.push(self.literal()?),
                        Some(Token::RParen) => break,
                        other => {
                            return Err(QueryError::InvalidFilter(format!(
                                "expected ',' or ')' in IN list but found {other:?}"
                            )))
                        }
                    }
                }
                Ok(FilterExpr::In { column, values })
            }
            other => Err(QueryError::InvalidFilter(format!(
                "expected operator after '{column}' but found {other:?}"
            ))),
        }
    }

    fn literal(&mut self) -> Result<Value, QueryError> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(value),
            other => Err(QueryError::InvalidFilter(format!(
                "expected literal but found {other:?}"
            ))),
        }
    }
}
