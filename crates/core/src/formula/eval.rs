//! Tree-walking evaluator.

use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::EvalError;
use super::parser::{parse, BinaryOp, Expr, UnaryOp};
use super::value::{Context, Value};

/// Largest absolute integer exponent accepted by `**`.
const MAX_EXPONENT: u32 = 64;

/// Parses and evaluates `src` against `ctx`.
///
/// # Errors
///
/// Returns any parse or evaluation error.
pub fn evaluate(src: &str, ctx: &Context) -> Result<Value, EvalError> {
    eval(&parse(src)?, ctx)
}

/// Evaluates a parsed formula against `ctx`.
///
/// # Errors
///
/// Returns the first evaluation error met.
pub fn eval(expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnresolvedName(name.clone())),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Attribute(target, attribute) => attribute_of(eval(target, ctx)?, attribute),
        Expr::Index(target, index) => index_of(eval(target, ctx)?, &eval(index, ctx)?),
        Expr::Call(function, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(function, args)
        }
        Expr::Unary(op, operand) => unary(*op, eval(operand, ctx)?),
        Expr::Binary(op, lhs, rhs) => binary(*op, &eval(lhs, ctx)?, &eval(rhs, ctx)?),
        Expr::And(lhs, rhs) => {
            let left = eval(lhs, ctx)?;
            if left.is_truthy() { eval(rhs, ctx) } else { Ok(left) }
        }
        Expr::Or(lhs, rhs) => {
            let left = eval(lhs, ctx)?;
            if left.is_truthy() { Ok(left) } else { eval(rhs, ctx) }
        }
        Expr::Conditional {
            then,
            condition,
            otherwise,
        } => {
            if eval(condition, ctx)?.is_truthy() {
                eval(then, ctx)
            } else {
                eval(otherwise, ctx)
            }
        }
    }
}

fn attribute_of(target: Value, attribute: &str) -> Result<Value, EvalError> {
    match target {
        Value::Record(mut fields) => fields.remove(attribute).ok_or_else(|| EvalError::Attribute {
            target: "record",
            attribute: attribute.to_string(),
        }),
        Value::List(items) => items
            .into_iter()
            .map(|item| attribute_of(item, attribute))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Err(EvalError::Attribute {
            target: other.type_name(),
            attribute: attribute.to_string(),
        }),
    }
}

fn index_of(target: Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::List(mut items), Value::Number(n)) => {
            let len = i64::try_from(items.len()).map_err(|_| EvalError::Overflow)?;
            let position = integer(*n, "list index")?;
            let resolved = if position < 0 { len + position } else { position };
            usize::try_from(resolved)
                .ok()
                .filter(|i| *i < items.len())
                .map(|i| items.swap_remove(i))
                .ok_or_else(|| EvalError::Value(format!("list index {position} out of range")))
        }
        (Value::Record(mut fields), Value::Str(key)) => fields.remove(key).ok_or_else(|| EvalError::Attribute {
            target: "record",
            attribute: key.clone(),
        }),
        (target, index) => Err(EvalError::Type(format!(
            "{} indices must be valid, not {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

fn integer(n: Decimal, what: &str) -> Result<i64, EvalError> {
    if !n.fract().is_zero() {
        return Err(EvalError::Type(format!("{what} must be an integer, not {n}")));
    }
    n.to_i64().ok_or(EvalError::Overflow)
}

fn number(value: &Value, context: &str) -> Result<Decimal, EvalError> {
    value.as_number().ok_or_else(|| {
        EvalError::Type(format!("bad operand type for {context}: '{}'", value.type_name()))
    })
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => Ok(Value::Number(-number(&operand, "unary -")?)),
        UnaryOp::Pos => Ok(Value::Number(number(&operand, "unary +")?)),
    }
}

fn operands_error(symbol: &str, lhs: &Value, rhs: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {symbol}: '{}' and '{}'",
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(loose_eq(lhs, rhs))),
        BinaryOp::Ne => return Ok(Value::Bool(!loose_eq(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = order(lhs, rhs).ok_or_else(|| operands_error(symbol(op), lhs, rhs))?;
            let holds = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(holds));
        }
        _ => {}
    }

    if op == BinaryOp::Add {
        match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b).cloned().collect()));
            }
            _ => {}
        }
    }

    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(operands_error(symbol(op), lhs, rhs));
    };
    arithmetic(op, a, b).map(Value::Number)
}

fn arithmetic(op: BinaryOp, a: Decimal, b: Decimal) -> Result<Decimal, EvalError> {
    match op {
        BinaryOp::Add => a.checked_add(b).ok_or(EvalError::Overflow),
        BinaryOp::Sub => a.checked_sub(b).ok_or(EvalError::Overflow),
        BinaryOp::Mul => a.checked_mul(b).ok_or(EvalError::Overflow),
        BinaryOp::Div => divide(a, b),
        BinaryOp::FloorDiv => divide(a, b).map(|q| q.floor()),
        BinaryOp::Mod => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            let r = a.checked_rem(b).ok_or(EvalError::Overflow)?;
            // result takes the sign of the divisor
            if !r.is_zero() && r.is_sign_negative() != b.is_sign_negative() {
                r.checked_add(b).ok_or(EvalError::Overflow)
            } else {
                Ok(r)
            }
        }
        BinaryOp::Pow => power(a, b),
        _ => Err(EvalError::Type(format!("'{}' is not arithmetic", symbol(op)))),
    }
}

fn divide(a: Decimal, b: Decimal) -> Result<Decimal, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    a.checked_div(b).ok_or(EvalError::Overflow)
}

fn power(base: Decimal, exponent: Decimal) -> Result<Decimal, EvalError> {
    let exponent = integer(exponent, "exponent")?;
    let magnitude = u32::try_from(exponent.unsigned_abs())
        .ok()
        .filter(|m| *m <= MAX_EXPONENT)
        .ok_or(EvalError::Overflow)?;
    let mut result = Decimal::ONE;
    for _ in 0..magnitude {
        result = result.checked_mul(base).ok_or(EvalError::Overflow)?;
    }
    if exponent < 0 {
        divide(Decimal::ONE, result)
    } else {
        Ok(result)
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => Some(lhs.as_number()?.cmp(&rhs.as_number()?)),
    }
}

fn call(function: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match function {
        "sum" => {
            let (items, start) = match <[Value; 1]>::try_from(args) {
                Ok([items]) => (items, Decimal::ZERO),
                Err(args) => match <[Value; 2]>::try_from(args) {
                    Ok([items, start]) => (items, number(&start, "sum()")?),
                    Err(_) => return Err(arity("sum", "1 or 2")),
                },
            };
            sum(&sequence("sum", items)?, start).map(Value::Number)
        }
        "min" => extreme("min", args, Ordering::Less),
        "max" => extreme("max", args, Ordering::Greater),
        "len" => {
            let [value] = single("len", args)?;
            let len = match &value {
                Value::List(items) => items.len(),
                Value::Str(s) => s.chars().count(),
                Value::Record(fields) => fields.len(),
                other => {
                    return Err(EvalError::Type(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Number(Decimal::from(len)))
        }
        "avg" | "average" => {
            let [value] = single(function, args)?;
            let items = sequence(function, value)?;
            let total = sum(&items, Decimal::ZERO)?;
            divide(total, Decimal::from(items.len())).map(Value::Number)
        }
        "abs" => {
            let [value] = single("abs", args)?;
            Ok(Value::Number(number(&value, "abs()")?.abs()))
        }
        "round" => {
            let (value, places) = match <[Value; 1]>::try_from(args) {
                Ok([value]) => (value, 0),
                Err(args) => match <[Value; 2]>::try_from(args) {
                    Ok([value, places]) => {
                        let places = integer(number(&places, "round()")?, "ndigits")?;
                        let places = u32::try_from(places)
                            .map_err(|_| EvalError::Value("ndigits must be non-negative".into()))?;
                        (value, places)
                    }
                    Err(_) => return Err(arity("round", "1 or 2")),
                },
            };
            Ok(Value::Number(
                number(&value, "round()")?.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero),
            ))
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn arity(function: &str, expected: &str) -> EvalError {
    EvalError::Type(format!("{function}() takes {expected} argument(s)"))
}

fn single(function: &str, args: Vec<Value>) -> Result<[Value; 1], EvalError> {
    <[Value; 1]>::try_from(args).map_err(|_| arity(function, "exactly 1"))
}

fn sequence(function: &str, value: Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalError::Type(format!(
            "{function}() expects a list, not '{}'",
            other.type_name()
        ))),
    }
}

fn sum(items: &[Value], start: Decimal) -> Result<Decimal, EvalError> {
    items.iter().try_fold(start, |acc, item| {
        acc.checked_add(number(item, "sum()")?).ok_or(EvalError::Overflow)
    })
}

/// `min`/`max` over one list argument or over several arguments.
fn extreme(function: &str, args: Vec<Value>, keep: Ordering) -> Result<Value, EvalError> {
    let items = match <[Value; 1]>::try_from(args) {
        Ok([only]) => sequence(function, only)?,
        Err(args) => args,
    };
    let mut iter = items.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| EvalError::Value(format!("{function}() arg is an empty sequence")))?;
    iter.try_fold(first, |best, item| {
        let ordering = order(&item, &best).ok_or_else(|| operands_error("<", &item, &best))?;
        Ok(if ordering == keep { item } else { best })
    })
}
