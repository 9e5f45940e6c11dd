//! Matching of region properties against a boolean expression.
//!
//! Expressions compare a property name with a literal and combine the
//! comparisons with `and` / `or` (`and` binds tighter), e.g.
//! `value == "face" and confidence >= 0.5 or area > 100`. Parentheses group.
//! A region matches when any one of its property rows satisfies the
//! expression.

use crate::common::Props;
use crate::error::PredicateError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub trait PredicateEvaluator: Send + Sync {
    fn matches(&self, props: &[Props]) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Ne => ordering != Equal,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Ge => ordering != Less,
            CompareOp::Lt => ordering == Less,
            CompareOp::Le => ordering != Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        field: String,
        op: CompareOp,
        literal: Literal,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn evaluate(&self, row: &Props) -> bool {
        match self {
            Expr::And(lhs, rhs) => lhs.evaluate(row) && rhs.evaluate(row),
            Expr::Or(lhs, rhs) => lhs.evaluate(row) || rhs.evaluate(row),
            Expr::Compare { field, op, literal } => {
                let Some(value) = row.get(field) else {
                    return false;
                };
                match (value, literal) {
                    (Value::Number(n), Literal::Number(rhs)) => n
                        .as_f64()
                        .and_then(|lhs| lhs.partial_cmp(rhs))
                        .is_some_and(|ordering| op.holds(ordering)),
                    (Value::String(s), Literal::Text(rhs)) => op.holds(s.as_str().cmp(rhs)),
                    (Value::Bool(b), Literal::Bool(rhs)) => match op {
                        CompareOp::Eq => b == rhs,
                        CompareOp::Ne => b != rhs,
                        _ => false,
                    },
                    _ => false,
                }
            }
        }
    }
}

/// A parsed expression, keeping its source text for logging.
#[derive(Debug, Clone)]
pub struct QueryPredicate {
    source: String,
    expr: Expr,
}

impl QueryPredicate {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl FromStr for QueryPredicate {
    type Err = PredicateError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some((token, at)) = parser.tokens.get(parser.pos) {
            return Err(PredicateError::UnexpectedToken(token.to_string(), *at));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }
}

impl fmt::Display for QueryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PredicateEvaluator for QueryPredicate {
    fn matches(&self, props: &[Props]) -> bool {
        props.iter().any(|row| self.expr.evaluate(row))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Op(CompareOp),
    Lit(Literal),
    And,
    Or,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => f.write_str(name),
            Token::Op(op) => write!(f, "{:?}", op),
            Token::Lit(Literal::Number(n)) => write!(f, "{}", n),
            Token::Lit(Literal::Text(s)) => write!(f, "\"{}\"", s),
            Token::Lit(Literal::Bool(b)) => write!(f, "{}", b),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, PredicateError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => {
                tokens.push((Token::LParen, start));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, start));
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let (op, len) = match two.as_str() {
                    "==" => (CompareOp::Eq, 2),
                    "!=" => (CompareOp::Ne, 2),
                    ">=" => (CompareOp::Ge, 2),
                    "<=" => (CompareOp::Le, 2),
                    _ if c == '>' => (CompareOp::Gt, 1),
                    _ if c == '<' => (CompareOp::Lt, 1),
                    _ => return Err(PredicateError::UnknownOperator(c.to_string())),
                };
                tokens.push((Token::Op(op), start));
                i += len;
            }
            '"' | '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or(PredicateError::UnexpectedEnd)?;
                let text: String = chars[i + 1..i + 1 + close].iter().collect();
                tokens.push((Token::Lit(Literal::Text(text)), start));
                i += close + 2;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '-' | '+'))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| PredicateError::InvalidLiteral(text.clone()))?;
                tokens.push((Token::Lit(Literal::Number(number)), start));
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::Lit(Literal::Bool(true)),
                    "false" => Token::Lit(Literal::Bool(false)),
                    _ => Token::Ident(word),
                };
                tokens.push((token, start));
            }
            other => return Err(PredicateError::UnexpectedToken(other.to_string(), start)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Result<(Token, usize), PredicateError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(PredicateError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn parse_or(&mut self) -> Result<Expr, PredicateError> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            expr = Expr::Or(Box::new(expr), Box::new(self.parse_and()?));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, PredicateError> {
        let mut expr = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            expr = Expr::And(Box::new(expr), Box::new(self.parse_comparison()?));
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, PredicateError> {
        match self.next()? {
            (Token::LParen, _) => {
                let expr = self.parse_or()?;
                match self.next()? {
                    (Token::RParen, _) => Ok(expr),
                    (token, at) => Err(PredicateError::UnexpectedToken(token.to_string(), at)),
                }
            }
            (Token::Ident(field), _) => {
                let op = match self.next()? {
                    (Token::Op(op), _) => op,
                    (token, at) => {
                        return Err(PredicateError::UnexpectedToken(token.to_string(), at))
                    }
                };
                let literal = match self.next()? {
                    (Token::Lit(literal), _) => literal,
                    (token, at) => {
                        return Err(PredicateError::UnexpectedToken(token.to_string(), at))
                    }
                };
                Ok(Expr::Compare { field, op, literal })
            }
            (token, at) => Err(PredicateError::UnexpectedToken(token.to_string(), at)),
        }
    }
}
