//! Sandboxed formula evaluation.
//!
//! KPI formulas, once their accounting variables are substituted, are plain
//! arithmetic over named values. They are parsed into an [`Expr`] tree and
//! evaluated against an explicit [`Context`]; the only callable functions are
//! `sum`, `min`, `max`, `len`, `avg` (or `average`), `abs` and `round`.

pub mod error;
pub mod eval;
mod lexer;
pub mod parser;
pub mod value;

pub use error::{EvalError, EvalErrorKind};
pub use eval::{eval, evaluate};
pub use parser::{parse, BinaryOp, Expr, UnaryOp, MAX_DEPTH};
pub use value::{Context, Value};
