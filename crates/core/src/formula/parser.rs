//! Pratt parser producing the formula AST.

use super::error::EvalError;
use super::lexer::{tokenize, Spanned, Token};
use super::value::Value;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
    /// `not x`
    Not,
}

/// Binary operators with eager operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// A parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant.
    Literal(Value),
    /// Variable reference.
    Name(String),
    /// `[a, b, ...]`
    List(Vec<Expr>),
    /// `target.name`
    Attribute(Box<Expr>, String),
    /// `target[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `function(args...)`
    Call(String, Vec<Expr>),
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `a and b`
    And(Box<Expr>, Box<Expr>),
    /// `a or b`
    Or(Box<Expr>, Box<Expr>),
    /// `then if condition else otherwise`
    Conditional {
        /// Value when the condition holds.
        then: Box<Expr>,
        /// Condition.
        condition: Box<Expr>,
        /// Value otherwise.
        otherwise: Box<Expr>,
    },
}

const TERNARY_BP: u8 = 1;
const CONDITION_BP: u8 = 3;
const NOT_BP: u8 = 7;
const UNARY_BP: u8 = 15;

/// Deepest formula accepted, counting both the syntax tree and the
/// bracket nesting of the text.
pub const MAX_DEPTH: usize = 100;

/// Parses `src` into an [`Expr`].
///
/// # Errors
///
/// Returns `EvalError::Syntax` on malformed input and on formulas nested
/// deeper than [`MAX_DEPTH`].
pub fn parse(src: &str) -> Result<Expr, EvalError> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        nesting: 0,
    };
    let (expr, _) = parser.expr(0)?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(EvalError::syntax(parser.position(), format!("unexpected {other:?}"))),
    }
}

/// An expression with the height of its tree.
type Node = (Expr, usize);

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |s| s.position)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), EvalError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(EvalError::syntax(
                self.position(),
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    /// Height of a node whose deepest child has height `child`.
    fn height(&self, child: usize) -> Result<usize, EvalError> {
        if child >= MAX_DEPTH {
            return Err(EvalError::syntax(self.position(), "formula nested too deeply"));
        }
        Ok(child + 1)
    }

    fn expr(&mut self, min_bp: u8) -> Result<Node, EvalError> {
        if self.nesting >= MAX_DEPTH {
            return Err(EvalError::syntax(self.position(), "formula nested too deeply"));
        }
        self.nesting += 1;
        let node = self.expr_inner(min_bp);
        self.nesting -= 1;
        node
    }

    fn expr_inner(&mut self, min_bp: u8) -> Result<Node, EvalError> {
        let (mut lhs, mut height) = self.prefix()?;

        loop {
            let token = self.peek().clone();

            match token {
                Token::LParen => {
                    let Expr::Name(name) = lhs else {
                        return Err(EvalError::syntax(self.position(), "only named functions can be called"));
                    };
                    self.advance();
                    let (args, args_height) = self.sequence(&Token::RParen)?;
                    height = self.height(height.max(args_height))?;
                    lhs = Expr::Call(name, args);
                    continue;
                }
                Token::Dot => {
                    self.advance();
                    let position = self.position();
                    let Token::Ident(name) = self.advance() else {
                        return Err(EvalError::syntax(position, "expected attribute name"));
                    };
                    height = self.height(height)?;
                    lhs = Expr::Attribute(Box::new(lhs), name);
                    continue;
                }
                Token::LBracket => {
                    self.advance();
                    let (index, index_height) = self.expr(0)?;
                    self.expect(&Token::RBracket)?;
                    height = self.height(height.max(index_height))?;
                    lhs = Expr::Index(Box::new(lhs), Box::new(index));
                    continue;
                }
                _ => {}
            }

            if token == Token::If {
                if TERNARY_BP < min_bp {
                    break;
                }
                self.advance();
                let (condition, condition_height) = self.expr(CONDITION_BP)?;
                self.expect(&Token::Else)?;
                let (otherwise, otherwise_height) = self.expr(TERNARY_BP)?;
                height = self.height(height.max(condition_height).max(otherwise_height))?;
                lhs = Expr::Conditional {
                    then: Box::new(lhs),
                    condition: Box::new(condition),
                    otherwise: Box::new(otherwise),
                };
                continue;
            }

            let Some((l_bp, r_bp)) = infix_binding_power(&token) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let (rhs, rhs_height) = self.expr(r_bp)?;
            height = self.height(height.max(rhs_height))?;
            lhs = match token {
                Token::And => Expr::And(Box::new(lhs), Box::new(rhs)),
                Token::Or => Expr::Or(Box::new(lhs), Box::new(rhs)),
                other => match binary_op(&other) {
                    Some(op) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                    None => return Err(EvalError::syntax(self.position(), "unexpected operator")),
                },
            };
        }

        Ok((lhs, height))
    }

    fn prefix(&mut self) -> Result<Node, EvalError> {
        let position = self.position();
        let leaf = |expr: Expr| -> Result<Node, EvalError> { Ok((expr, 1)) };
        match self.advance() {
            Token::Number(n) => leaf(Expr::Literal(Value::Number(n))),
            Token::Str(s) => leaf(Expr::Literal(Value::Str(s))),
            Token::None => leaf(Expr::Literal(Value::Null)),
            Token::True => leaf(Expr::Literal(Value::Bool(true))),
            Token::False => leaf(Expr::Literal(Value::Bool(false))),
            Token::Ident(name) => leaf(Expr::Name(name)),
            Token::Minus => self.unary(UnaryOp::Neg, UNARY_BP),
            Token::Plus => self.unary(UnaryOp::Pos, UNARY_BP),
            Token::Not => self.unary(UnaryOp::Not, NOT_BP),
            Token::LParen => {
                let inner = self.expr(0)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let (items, items_height) = self.sequence(&Token::RBracket)?;
                Ok((Expr::List(items), self.height(items_height)?))
            }
            Token::Eof => Err(EvalError::syntax(position, "unexpected end of formula")),
            other => Err(EvalError::syntax(position, format!("unexpected {other:?}"))),
        }
    }

    fn unary(&mut self, op: UnaryOp, bp: u8) -> Result<Node, EvalError> {
        let (operand, operand_height) = self.expr(bp)?;
        Ok((Expr::Unary(op, Box::new(operand)), self.height(operand_height)?))
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    /// Returns the items and the height of the tallest one.
    fn sequence(&mut self, close: &Token) -> Result<(Vec<Expr>, usize), EvalError> {
        let mut items = Vec::new();
        let mut height = 0;
        while self.peek() != close {
            let (item, item_height) = self.expr(0)?;
            items.push(item);
            height = height.max(item_height);
            if self.peek() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(close)?;
        Ok((items, height))
    }
}

fn infix_binding_power(token: &Token) -> Option<(u8, u8)> {
    Some(match token {
        Token::Or => (3, 4),
        Token::And => (5, 6),
        Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::EqEq | Token::Ne => (9, 10),
        Token::Plus | Token::Minus => (11, 12),
        Token::Star | Token::Slash | Token::DoubleSlash | Token::Percent => (13, 14),
        Token::DoubleStar => (18, 17),
        _ => return None,
    })
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::DoubleSlash => BinaryOp::FloorDiv,
        Token::Percent => BinaryOp::Mod,
        Token::DoubleStar => BinaryOp::Pow,
        Token::Lt => BinaryOp::Lt,
        Token::Le => BinaryOp::Le,
        Token::Gt => BinaryOp::Gt,
        Token::Ge => BinaryOp::Ge,
        Token::EqEq => BinaryOp::Eq,
        Token::Ne => BinaryOp::Ne,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn num(n: rust_decimal::Decimal) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Number(n)))
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.into()))
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                num(dec!(1)),
                Box::new(Expr::Binary(BinaryOp::Mul, num(dec!(2)), num(dec!(3))))
            )
        );
    }

    #[test]
    fn test_power_is_right_associative_and_beats_negation() {
        assert_eq!(
            parse("-2 ** 3 ** 2").unwrap(),
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(
                    BinaryOp::Pow,
                    num(dec!(2)),
                    Box::new(Expr::Binary(BinaryOp::Pow, num(dec!(3)), num(dec!(2))))
                ))
            )
        );
    }

    #[test]
    fn test_not_is_looser_than_comparison() {
        assert_eq!(
            parse("not a == b").unwrap(),
            Expr::Unary(
                UnaryOp::Not,
                Box::new(Expr::Binary(BinaryOp::Eq, name("a"), name("b")))
            )
        );
    }

    #[test]
    fn test_conditional_is_loosest_and_nests_right() {
        assert_eq!(
            parse("a if x or y else b if z else c").unwrap(),
            Expr::Conditional {
                then: name("a"),
                condition: Box::new(Expr::Or(name("x"), name("y"))),
                otherwise: Box::new(Expr::Conditional {
                    then: name("b"),
                    condition: name("z"),
                    otherwise: name("c"),
                }),
            }
        );
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(
            parse("sum(rows.amount)").unwrap(),
            Expr::Call("sum".into(), vec![Expr::Attribute(name("rows"), "amount".into())])
        );
        assert_eq!(
            parse("[1, 2,][0]").unwrap(),
            Expr::Index(
                Box::new(Expr::List(vec![
                    Expr::Literal(Value::Number(dec!(1))),
                    Expr::Literal(Value::Number(dec!(2))),
                ])),
                num(dec!(0))
            )
        );
    }

    #[rstest]
    #[case("")]
    #[case("1 +")]
    #[case("(1 + 2")]
    #[case("a b")]
    #[case("1 if a")]
    #[case("1(2)")]
    #[case("a.1")]
    fn test_rejects_malformed(#[case] src: &str) {
        assert!(matches!(parse(src), Err(EvalError::Syntax { .. })), "{src}");
    }
}
