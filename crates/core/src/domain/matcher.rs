//! Evaluation of domains against in-memory records.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use moka::sync::Cache;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use uuid::Uuid;

use super::types::{Condition, Domain, DomainValue, Operator};

/// Compiled LIKE patterns by pattern text and case sensitivity.
static LIKE_PATTERNS: Lazy<Cache<(String, bool), Regex>> = Lazy::new(|| Cache::new(1_024));

/// A record whose fields can be read by name.
pub trait FieldSource {
    /// Returns the value of `name`, or `None` if the record has no such field.
    ///
    /// Known fields without a value return `Some(DomainValue::Null)`.
    fn field(&self, name: &str) -> Option<DomainValue>;
}

impl Domain {
    /// Returns true if `record` satisfies this domain.
    pub fn matches<R: FieldSource + ?Sized>(&self, record: &R) -> bool {
        match self {
            Self::True => true,
            Self::Leaf(condition) => condition.matches(record),
            Self::And(operands) => operands.iter().all(|d| d.matches(record)),
            Self::Or(operands) => operands.iter().any(|d| d.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

impl Condition {
    /// Returns true if `record` satisfies this condition. Unknown fields never match.
    pub fn matches<R: FieldSource + ?Sized>(&self, record: &R) -> bool {
        let Some(actual) = record.field(&self.field) else {
            return false;
        };
        match self.operator {
            Operator::Eq => loose_eq(&actual, &self.value),
            Operator::Ne => !loose_eq(&actual, &self.value),
            Operator::Lt => compare(&actual, &self.value) == Some(Ordering::Less),
            Operator::Le => matches!(
                compare(&actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare(&actual, &self.value) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                compare(&actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => contains(&self.value, &actual),
            Operator::NotIn => !contains(&self.value, &actual),
            Operator::Like => like(&actual, &self.value, false),
            Operator::ILike => like(&actual, &self.value, true),
        }
    }
}

/// Membership test; a list-valued field matches if any of its elements does.
fn contains(list: &DomainValue, actual: &DomainValue) -> bool {
    if let DomainValue::List(items) = actual {
        return items.iter().any(|item| contains(list, item));
    }
    match list {
        DomainValue::List(values) => values.iter().any(|v| loose_eq(actual, v)),
        single => loose_eq(actual, single),
    }
}

/// Equality with string coercion toward dates, timestamps and ids.
fn loose_eq(actual: &DomainValue, expected: &DomainValue) -> bool {
    match (actual, expected) {
        (DomainValue::Bool(false), DomainValue::Null) | (DomainValue::Null, DomainValue::Bool(false)) => {
            true
        }
        _ => compare(actual, expected) == Some(Ordering::Equal),
    }
}

fn compare(a: &DomainValue, b: &DomainValue) -> Option<Ordering> {
    use DomainValue as V;
    match (a, b) {
        (V::Null, V::Null) => Some(Ordering::Equal),
        (V::Bool(x), V::Bool(y)) => Some(x.cmp(y)),
        (V::Number(x), V::Number(y)) => Some(x.cmp(y)),
        (V::Str(x), V::Str(y)) => Some(x.cmp(y)),
        (V::Date(x), V::Date(y)) => Some(x.cmp(y)),
        (V::DateTime(x), V::DateTime(y)) => Some(x.cmp(y)),
        (V::Id(x), V::Id(y)) => Some(x.cmp(y)),
        (V::Date(x), V::Str(s)) => parse_date(s).map(|y| x.cmp(&y)),
        (V::Str(s), V::Date(y)) => parse_date(s).map(|x| x.cmp(y)),
        (V::DateTime(x), V::Str(s)) => parse_datetime(s).map(|y| x.cmp(&y)),
        (V::Str(s), V::DateTime(y)) => parse_datetime(s).map(|x| x.cmp(y)),
        (V::Date(x), V::DateTime(y)) => Some(x.and_time(chrono::NaiveTime::MIN).cmp(y)),
        (V::DateTime(x), V::Date(y)) => Some(x.cmp(&y.and_time(chrono::NaiveTime::MIN))),
        (V::Id(x), V::Str(s)) => Uuid::parse_str(s).ok().map(|y| x.cmp(&y)),
        (V::Str(s), V::Id(y)) => Uuid::parse_str(s).ok().map(|x| x.cmp(y)),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok()
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| parse_date(s).map(|d| d.and_time(chrono::NaiveTime::MIN)))
}

/// Anchored SQL LIKE: `%` matches any run, `_` a single character.
fn like(actual: &DomainValue, pattern: &DomainValue, case_insensitive: bool) -> bool {
    let (DomainValue::Str(text), DomainValue::Str(pattern)) = (actual, pattern) else {
        return false;
    };
    like_regex(pattern, case_insensitive).is_some_and(|re| re.is_match(text))
}

fn like_regex(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    let key = (pattern.to_string(), case_insensitive);
    if let Some(re) = LIKE_PATTERNS.get(&key) {
        return Some(re);
    }
    let mut source = String::with_capacity(pattern.len() + 2);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '%' => source.push_str("(?s:.*)"),
            '_' => source.push_str("(?s:.)"),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    let re = RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .build()
        .ok()?;
    LIKE_PATTERNS.insert(key, re.clone());
    Some(re)
}
