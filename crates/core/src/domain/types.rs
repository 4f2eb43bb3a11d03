//! Filter predicate types.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// Anchored SQL LIKE (`%` any run, `_` any char).
    Like,
    /// Case-insensitive anchored SQL LIKE.
    ILike,
}

impl Operator {
    /// Parses the textual operator used in serialized domains.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token.trim().to_lowercase().as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "in" => Self::In,
            "not in" => Self::NotIn,
            "like" | "=like" => Self::Like,
            "ilike" | "=ilike" => Self::ILike,
            _ => return None,
        };
        Some(op)
    }

    /// Returns the textual form of the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Like => "like",
            Self::ILike => "ilike",
        }
    }
}

/// A scalar or list value on either side of a condition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DomainValue {
    /// Absent value (`None` / SQL NULL).
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Decimal),
    /// Text.
    Str(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Naive UTC timestamp.
    DateTime(NaiveDateTime),
    /// Record identifier.
    Id(Uuid),
    /// List of values (right-hand side of `in`).
    List(Vec<DomainValue>),
}

impl DomainValue {
    /// Builds a list of identifiers.
    pub fn ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Uuid>,
    {
        Self::List(ids.into_iter().map(|id| Self::Id(id.into())).collect())
    }

    /// Builds an identifier value, or `Null` when absent.
    pub fn opt_id<T: Into<Uuid>>(id: Option<T>) -> Self {
        id.map_or(Self::Null, |id| Self::Id(id.into()))
    }
}

impl From<&str> for DomainValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for DomainValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for DomainValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Decimal> for DomainValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDate> for DomainValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<Uuid> for DomainValue {
    fn from(value: Uuid) -> Self {
        Self::Id(value)
    }
}

impl fmt::Display for DomainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Date(d) => write!(f, "'{d}'"),
            Self::DateTime(dt) => write!(f, "'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Id(id) => write!(f, "'{id}'"),
            Self::List(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A single `(field, operator, value)` condition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Condition {
    /// Field name on the filtered record.
    pub field: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Right-hand side.
    pub value: DomainValue,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "('{}', '{}', {})",
            self.field,
            self.operator.as_str(),
            self.value
        )
    }
}

/// A filter predicate over records.
///
/// `And` of nothing is always true, `Or` of nothing is always false.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Matches every record.
    #[default]
    True,
    /// A single condition.
    Leaf(Condition),
    /// All operands must match.
    And(Vec<Domain>),
    /// At least one operand must match.
    Or(Vec<Domain>),
    /// Negation.
    Not(Box<Domain>),
}

impl Domain {
    /// Builds a single condition.
    pub fn cond(field: impl Into<String>, operator: Operator, value: impl Into<DomainValue>) -> Self {
        Self::Leaf(Condition {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }

    /// Builds `field = value`.
    pub fn eq(field: impl Into<String>, value: impl Into<DomainValue>) -> Self {
        Self::cond(field, Operator::Eq, value)
    }

    /// Builds `field in values`.
    pub fn is_in(field: impl Into<String>, values: DomainValue) -> Self {
        Self::cond(field, Operator::In, values)
    }

    /// Conjunction; nested conjunctions are flattened and `True` operands dropped.
    pub fn and<I: IntoIterator<Item = Domain>>(operands: I) -> Self {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Self::True => {}
                Self::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Self::True,
            1 => flat.remove(0),
            _ => Self::And(flat),
        }
    }

    /// Disjunction; nested disjunctions are flattened, a `True` operand absorbs all.
    pub fn or<I: IntoIterator<Item = Domain>>(operands: I) -> Self {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Self::True => return Self::True,
                Self::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::Or(flat)
        }
    }

    /// Negation.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Returns a conjunction of `self` and `other`.
    #[must_use]
    pub fn with(self, other: Domain) -> Self {
        Self::and([self, other])
    }

    /// Returns true if this domain matches everything.
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Visits every leaf condition.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Self::True => {}
            Self::Leaf(condition) => out.push(condition),
            Self::And(operands) | Self::Or(operands) => {
                for operand in operands {
                    operand.collect_conditions(out);
                }
            }
            Self::Not(inner) => inner.collect_conditions(out),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "[]"),
            Self::Leaf(condition) => write!(f, "[{condition}]"),
            Self::And(operands) => write_joined(f, "&", operands),
            Self::Or(operands) => write_joined(f, "|", operands),
            Self::Not(inner) => write!(f, "['!', {inner}]"),
        }
    }
}

/// Writes operands in prefix notation, e.g. `['|', [a], [b]]`.
fn write_joined(f: &mut fmt::Formatter<'_>, op: &str, operands: &[Domain]) -> fmt::Result {
    write!(f, "[")?;
    for _ in 1..operands.len() {
        write!(f, "'{op}', ")?;
    }
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{operand}")?;
    }
    write!(f, "]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_and_flattens_and_drops_true() {
        let a = Domain::eq("a", dec!(1));
        let b = Domain::eq("b", dec!(2));
        let c = Domain::eq("c", dec!(3));
        let combined = Domain::and([Domain::True, Domain::and([a.clone(), b.clone()]), c.clone()]);
        assert_eq!(combined, Domain::And(vec![a, b, c]));
    }

    #[test]
    fn test_and_of_single_operand_is_operand() {
        let a = Domain::eq("a", dec!(1));
        assert_eq!(Domain::and([Domain::True, a.clone()]), a);
        assert_eq!(Domain::and(Vec::new()), Domain::True);
    }

    #[test]
    fn test_or_with_true_is_true() {
        let a = Domain::eq("a", dec!(1));
        assert_eq!(Domain::or([a, Domain::True]), Domain::True);
    }

    #[test]
    fn test_double_negation_cancels() {
        let a = Domain::eq("a", dec!(1));
        assert_eq!(a.clone().negate().negate(), a);
    }

    #[test]
    fn test_operator_parse_round_trips() {
        for op in [
            Operator::Eq,
            Operator::Ne,
            Operator::Lt,
            Operator::Le,
            Operator::Gt,
            Operator::Ge,
            Operator::In,
            Operator::NotIn,
            Operator::Like,
            Operator::ILike,
        ] {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operator::parse("child_of"), None);
    }

    #[test]
    fn test_display_uses_prefix_notation() {
        let domain = Domain::or([Domain::eq("a", dec!(1)), Domain::eq("b", "x")]);
        assert_eq!(domain.to_string(), "['|', [('a', '=', 1)], [('b', '=', 'x')]]");
    }
}
