//! Parser for the serialized domain literal.
//!
//! Accepted form: `[('field', 'op', value), ...]`, terms implicitly AND-ed.
//! The prefix operators `'&'`, `'|'` and `'!'` may appear as list items and
//! apply to the terms that follow them.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::error::DomainParseError;
use super::types::{Domain, DomainValue, Operator};

/// Deepest operator or list nesting accepted in a literal.
pub const MAX_DEPTH: usize = 100;

/// Parses a serialized domain literal.
///
/// An empty string and `[]` both parse to [`Domain::True`].
///
/// # Errors
///
/// Returns `DomainParseError` if the literal is malformed.
pub fn parse_domain(input: &str) -> Result<Domain, DomainParseError> {
    if input.trim().is_empty() {
        return Ok(Domain::True);
    }
    let mut parser = Parser::new(input);
    let items = parser.parse_items()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("trailing characters after domain"));
    }

    Ok(Domain::and(build(items, &parser)?))
}

impl FromStr for Domain {
    type Err = DomainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_domain(s)
    }
}

#[derive(Debug)]
enum Item {
    And,
    Or,
    Not,
    Term(Domain),
}

/// Folds the prefix-notation items into their top-level terms, last item
/// first, keeping an upper bound of each tree's height next to it.
fn build(items: Vec<Item>, parser: &Parser) -> Result<Vec<Domain>, DomainParseError> {
    let mut stack: Vec<(Domain, usize)> = Vec::new();
    let operand = |stack: &mut Vec<(Domain, usize)>| {
        stack.pop().ok_or_else(|| parser.error("operator is missing an operand"))
    };
    for item in items.into_iter().rev() {
        let node = match item {
            Item::Term(domain) => (domain, 1),
            Item::Not => {
                let (inner, height) = operand(&mut stack)?;
                let height = if matches!(inner, Domain::Not(_)) {
                    height.saturating_sub(1)
                } else {
                    height + 1
                };
                (inner.negate(), height)
            }
            connective @ (Item::And | Item::Or) => {
                let (left, left_height) = operand(&mut stack)?;
                let (right, right_height) = operand(&mut stack)?;
                let is_and = matches!(connective, Item::And);
                // operands of the same connective are flattened into the result
                let flattened = |d: &Domain, h: usize| match d {
                    Domain::And(_) if is_and => h.saturating_sub(1),
                    Domain::Or(_) if !is_and => h.saturating_sub(1),
                    _ => h,
                };
                let height = 1 + flattened(&left, left_height).max(flattened(&right, right_height));
                let domain = if is_and {
                    Domain::and([left, right])
                } else {
                    Domain::or([left, right])
                };
                (domain, height)
            }
        };
        if node.1 > MAX_DEPTH {
            return Err(parser.error("domain nested too deeply"));
        }
        stack.push(node);
    }
    Ok(stack.into_iter().rev().map(|(domain, _)| domain).collect())
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> DomainParseError {
        DomainParseError::Syntax {
            position: self.pos,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, expected: char) -> Result<(), DomainParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn parse_items(&mut self) -> Result<Vec<Item>, DomainParseError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some('(' | '[') => items.push(Item::Term(self.parse_condition()?)),
                Some('\'' | '"') => {
                    let op = self.parse_string()?;
                    let item = match op.as_str() {
                        "&" => Item::And,
                        "|" => Item::Or,
                        "!" => Item::Not,
                        other => return Err(self.error(format!("unknown domain operator '{other}'"))),
                    };
                    items.push(item);
                }
                Some(c) => return Err(self.error(format!("unexpected '{c}' in domain"))),
                None => return Err(self.error("unterminated domain")),
            }
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {}
                Some(c) => return Err(self.error(format!("expected ',' or ']', found '{c}'"))),
                None => return Err(self.error("unterminated domain")),
            }
        }
    }

    fn parse_condition(&mut self) -> Result<Domain, DomainParseError> {
        let close = match self.peek() {
            Some('(') => ')',
            _ => ']',
        };
        self.pos += 1;
        let field = self.parse_string()?;
        self.expect(',')?;
        let op_text = self.parse_string()?;
        let operator = Operator::parse(&op_text).ok_or_else(|| DomainParseError::UnknownOperator {
            operator: op_text.clone(),
        })?;
        self.expect(',')?;
        let value = self.parse_value(0)?;
        if self.peek() == Some(',') {
            self.pos += 1;
        }
        self.expect(close)?;
        Ok(Domain::cond(field, operator, value))
    }

    fn parse_value(&mut self, depth: usize) -> Result<DomainValue, DomainParseError> {
        match self.peek() {
            Some('\'' | '"') => Ok(DomainValue::Str(self.parse_string()?)),
            Some(open @ ('(' | '[')) => {
                let close = if open == '(' { ')' } else { ']' };
                if depth >= MAX_DEPTH {
                    return Err(self.error("value nested too deeply"));
                }
                self.pos += 1;
                let mut values = Vec::new();
                loop {
                    if self.peek() == Some(close) {
                        self.pos += 1;
                        return Ok(DomainValue::List(values));
                    }
                    values.push(self.parse_value(depth + 1)?);
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some(c) if c == close => {}
                        _ => return Err(self.error("malformed list value")),
                    }
                }
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_alphabetic() => {
                let start = self.pos;
                while self.chars.get(self.pos).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
                    self.pos += 1;
                }
                let word: String = self.chars[start..self.pos].iter().collect();
                match word.as_str() {
                    "True" | "true" => Ok(DomainValue::Bool(true)),
                    "False" | "false" => Ok(DomainValue::Bool(false)),
                    "None" | "null" => Ok(DomainValue::Null),
                    other => Err(DomainParseError::UnsupportedValue {
                        value: other.to_string(),
                    }),
                }
            }
            Some(c) => Err(self.error(format!("unexpected '{c}' in value"))),
            None => Err(self.error("missing value")),
        }
    }

    fn parse_number(&mut self) -> Result<DomainValue, DomainParseError> {
        let start = self.pos;
        if matches!(self.chars.get(self.pos), Some('-' | '+')) {
            self.pos += 1;
        }
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == '.' || *c == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_' && **c != '+')
            .collect();
        Decimal::from_str(&text)
            .map(DomainValue::Number)
            .map_err(|_| DomainParseError::UnsupportedValue { value: text })
    }

    fn parse_string(&mut self) -> Result<String, DomainParseError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted string")),
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.chars.get(self.pos).copied() {
                Some('\\') => {
                    let Some(escaped) = self.chars.get(self.pos + 1).copied() else {
                        return Err(self.error("unterminated string"));
                    };
                    out.push(escaped);
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated string")),
            }
        }
    }
}
