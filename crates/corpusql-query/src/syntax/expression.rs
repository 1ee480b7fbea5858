//! Expression and ORDER BY parsers.
//!
//! Precedence, loosest first: `||`, `&&`, comparisons, prefix `!`, then
//! postfix member access and calls.

use super::common::{format_errors, ident, kw, number, regex_literal, string_literal, Extra};
use crate::error::CompileError;
use crate::expr::{BinaryOp, Expr};
use chumsky::prelude::*;
use serde::{Deserialize, Serialize};

/// One comma-separated term of an ORDER BY expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone)]
enum Postfix {
    Member(String),
    Call(Vec<Expr>),
}

/// Parser for a full query-language expression
pub fn expression<'src>() -> impl Parser<'src, &'src str, Expr, Extra<'src>> + Clone {
    recursive(|expr| {
        let literal = choice((
            string_literal().map(Expr::string),
            number().map(Expr::number),
            kw("true").to(Expr::boolean(true)),
            kw("false").to(Expr::boolean(false)),
            kw("null").to(Expr::null()),
        ));

        let items = expr
            .clone()
            .separated_by(just(',').padded())
            .allow_trailing()
            .collect::<Vec<_>>();

        let list = items
            .clone()
            .delimited_by(just('[').padded(), just(']').padded())
            .map(Expr::List)
            .labelled("list like ['a', 'b']");

        let atom = choice((
            literal,
            regex_literal().map(Expr::Regex),
            list,
            ident().map(Expr::Ident),
            expr.clone()
                .delimited_by(just('(').padded(), just(')').padded()),
        ))
        .padded();

        let postfix = choice((
            just('.')
                .padded()
                .ignore_then(ident())
                .map(Postfix::Member),
            items
                .delimited_by(just('(').padded(), just(')').padded())
                .map(Postfix::Call),
        ));

        let chain = atom.foldl(postfix.padded().repeated(), |object, op| match op {
            Postfix::Member(property) => object.member(property),
            Postfix::Call(args) => Expr::Call {
                callee: Box::new(object),
                args,
            },
        });

        let unary = just('!')
            .padded()
            .repeated()
            .foldr(chain, |_, operand| operand.not());

        let comparison_op = choice((
            just("===").to(BinaryOp::Eq),
            just("!==").to(BinaryOp::Ne),
            just("==").to(BinaryOp::Eq),
            just("!=").to(BinaryOp::Ne),
            just("<=").to(BinaryOp::Le),
            just(">=").to(BinaryOp::Ge),
            just("<").to(BinaryOp::Lt),
            just(">").to(BinaryOp::Gt),
        ))
        .padded();

        let comparison = unary
            .clone()
            .foldl(comparison_op.then(unary).repeated(), |left, (op, right)| {
                Expr::binary(op, left, right)
            });

        let conjunction = comparison.clone().foldl(
            just("&&").padded().ignore_then(comparison).repeated(),
            |left, right| left.and(right),
        );

        conjunction.clone().foldl(
            just("||").padded().ignore_then(conjunction).repeated(),
            |left, right| left.or(right),
        )
    })
}

/// Parse query-language text. Blank text yields `Ok(None)`.
pub fn parse_expression(text: &str) -> Result<Option<Expr>, CompileError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    expression()
        .padded()
        .then_ignore(end())
        .parse(text)
        .into_result()
        .map(Some)
        .map_err(|errs| CompileError::Parse(format_errors(&errs, text)))
}

/// Parse an ORDER BY list: `expr [ASC|DESC], ...`. Blank text yields no terms.
pub fn parse_order(text: &str) -> Result<Vec<OrderTerm>, CompileError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let direction = ident().try_map(|word: String, span| {
        match word.to_ascii_uppercase().as_str() {
            "ASC" => Ok(false),
            "DESC" => Ok(true),
            _ => Err(Rich::custom(
                span,
                format!("expected ASC or DESC, found {}", word),
            )),
        }
    });

    let term = expression()
        .then(direction.padded().or_not())
        .map(|(expr, descending)| OrderTerm {
            expr,
            descending: descending.unwrap_or(false),
        });

    term.separated_by(just(',').padded())
        .at_least(1)
        .collect::<Vec<_>>()
        .padded()
        .then_ignore(end())
        .parse(text)
        .into_result()
        .map_err(|errs| CompileError::Parse(format_errors(&errs, text)))
}
