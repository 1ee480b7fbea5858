//! Query-language text parsing.
//!
//! Builds [`Expr`](crate::expr::Expr) trees from query-language text using
//! chumsky combinators. Blank input is not an error here; each translator
//! decides what a missing expression means.

mod common;
mod expression;

pub use common::format_errors;
pub use expression::{parse_expression, parse_order, OrderTerm};
