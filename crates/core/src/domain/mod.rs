//! Filter predicates over ledger records.
//!
//! A [`Domain`] is the predicate attached to accounting variables, auxiliary
//! queries and drill-down actions. It can be parsed from its serialized
//! literal form and evaluated against any [`FieldSource`].

pub mod error;
pub mod matcher;
pub mod parser;
pub mod types;

pub use error::DomainParseError;
pub use matcher::FieldSource;
pub use parser::parse_domain;
pub use types::{Condition, Domain, DomainValue, Operator};
