//! Accounting variable grammar.
//!
//! A variable reads `<field>[<mode>]<accounts>[<domain>]`:
//!
//! - field: `bal` (debit - credit), `deb` or `crd`;
//! - mode: `p` variation over the period (default), `i` initial balance,
//!   `e` (or `s`) ending balance;
//! - accounts: `_<code>` for a single numeric code, or a bracketed,
//!   comma-separated list of codes that may contain `%` wildcards; empty
//!   brackets select every account;
//! - domain: an optional serialized filter on move lines.
//!
//! Examples: `bal[70]`, `bali[70,60]`, `bale[1%]`, `deb_101`,
//! `crd[][('journal_code', '=', 'BNK')]`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::error::ExpressionError;
use crate::domain::{parse_domain, Domain};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<field>\bbal|\bcrd|\bdeb)(?P<mode>[pise])?(?P<accounts>_[0-9]+|\[.*?\])(?P<domain>\[.*?\])?",
    )
    .unwrap_or_else(|e| unreachable!("accounting variable pattern is valid: {e}"))
});

/// Which amount a variable reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Debit minus credit.
    Balance,
    /// Debit.
    Debit,
    /// Credit.
    Credit,
}

/// Which time window a variable reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Movements within the window.
    Variation,
    /// Balance before the window.
    Initial,
    /// Balance at the end of the window.
    End,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Variation => "variation",
            Self::Initial => "initial",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// A parsed accounting variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingVariable {
    /// Amount read.
    pub field: Field,
    /// Time window.
    pub mode: Mode,
    /// Account codes; empty means every account.
    pub account_codes: Vec<String>,
    /// Move line filter.
    pub domain: Domain,
}

impl AccountingVariable {
    /// Returns the batching key of this variable.
    #[must_use]
    pub fn key(&self) -> QueryKey {
        QueryKey {
            domain: self.domain.clone(),
            mode: self.mode,
        }
    }

    /// Returns true if the variable is not restricted to account codes.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.account_codes.is_empty()
    }

    fn from_captures(caps: &Captures<'_>) -> Result<Self, ExpressionError> {
        let field = match &caps["field"] {
            "bal" => Field::Balance,
            "deb" => Field::Debit,
            _ => Field::Credit,
        };
        let mode = match caps.name("mode").map(|m| m.as_str()) {
            Some("i") => Mode::Initial,
            Some("e" | "s") => Mode::End,
            _ => Mode::Variation,
        };

        let accounts = &caps["accounts"];
        let codes = accounts
            .strip_prefix('_')
            .or_else(|| accounts.strip_prefix('[').and_then(|s| s.strip_suffix(']')))
            .unwrap_or_default();
        let account_codes = codes
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        let domain = match caps.name("domain") {
            Some(text) => parse_domain(text.as_str()).map_err(|source| ExpressionError::Domain {
                token: caps[0].to_string(),
                source,
            })?,
            None => Domain::True,
        };

        Ok(Self {
            field,
            mode,
            account_codes,
            domain,
        })
    }
}

/// Unit of query batching: every variable sharing a filter and a mode is
/// served by the same aggregate query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey {
    /// Move line filter.
    pub domain: Domain,
    /// Time window.
    pub mode: Mode,
}

/// Finds every accounting variable of `expr`, left to right.
///
/// # Errors
///
/// Returns `ExpressionError::Domain` if a variable carries a malformed filter.
pub fn scan(expr: &str) -> Result<Vec<AccountingVariable>, ExpressionError> {
    TOKEN_RE
        .captures_iter(expr)
        .map(|caps| AccountingVariable::from_captures(&caps))
        .collect()
}

/// Replaces every accounting variable of `expr` with the text `value` returns.
///
/// # Errors
///
/// Propagates the first error of `value` or of parsing.
pub fn replace<F>(expr: &str, mut value: F) -> Result<String, ExpressionError>
where
    F: FnMut(&AccountingVariable) -> Result<String, ExpressionError>,
{
    let mut out = String::with_capacity(expr.len());
    let mut last = 0;
    for caps in TOKEN_RE.captures_iter(expr) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let variable = AccountingVariable::from_captures(&caps)?;
        out.push_str(&expr[last..whole.start()]);
        out.push_str(&value(&variable)?);
        last = whole.end();
    }
    out.push_str(&expr[last..]);
    Ok(out)
}

/// Returns true if `expr` contains at least one accounting variable.
#[must_use]
pub fn has_variables(expr: &str) -> bool {
    TOKEN_RE.is_match(expr)
}
