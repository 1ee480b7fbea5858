//! Expression-to-SQL translators.
//!
//! Two translators share one expression compiler:
//! - [`TranscriptTranslator`] selects transcripts
//! - [`AnnotationTranslator`] selects annotations of one target layer

mod annotation;
pub(crate) mod common;
mod transcript;

pub use annotation::AnnotationTranslator;
pub use transcript::TranscriptTranslator;
pub(crate) use transcript::transcript_predicate;

use crate::error::{CompileError, CompileResult};
use crate::expr::Expr;
use crate::render::Query;
use crate::syntax::parse_expression;

/// Everything a translator needs besides the schema
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Parsed expression; `None` when no expression was supplied
    pub expression: Option<Expr>,
    /// Projection list; each translator has a default
    pub columns: Option<String>,
    /// Trusted raw SQL ANDed into the WHERE clause
    pub user_where: Option<String>,
    /// Query-language ORDER BY list
    pub order_by: Option<String>,
    /// Raw LIMIT clause, with or without the `LIMIT` keyword
    pub limit: Option<String>,
}

impl QueryRequest {
    pub fn new(expression: Option<Expr>) -> Self {
        Self {
            expression,
            ..Self::default()
        }
    }

    /// Request for query-language text; blank text means no expression
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        Ok(Self::new(parse_expression(text)?))
    }

    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn with_where(mut self, user_where: impl Into<String>) -> Self {
        self.user_where = Some(user_where.into());
        self
    }

    pub fn with_order(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn with_limit(mut self, limit: impl Into<String>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    fn non_blank(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub(crate) fn columns_or<'a>(&'a self, default: &'a str) -> &'a str {
        Self::non_blank(&self.columns).unwrap_or(default)
    }

    pub(crate) fn user_where(&self) -> Option<&str> {
        Self::non_blank(&self.user_where)
    }

    pub(crate) fn order_by(&self) -> Option<&str> {
        Self::non_blank(&self.order_by)
    }

    /// ` LIMIT ...`, adding the keyword when the caller left it out
    pub(crate) fn limit_clause(&self) -> String {
        match Self::non_blank(&self.limit) {
            None => String::new(),
            Some(limit) if limit.to_ascii_uppercase().starts_with("LIMIT") => {
                format!(" {}", limit)
            }
            Some(limit) => format!(" LIMIT {}", limit),
        }
    }
}

/// Trait for translating query-language expressions into SQL.
pub trait SqlTranslator: Send + Sync {
    /// Unique name for this translator
    fn name(&self) -> &str;

    /// Translate a request into SQL with parameters
    fn translate(&self, request: &QueryRequest) -> CompileResult<Query>;

    /// Parse query-language text and translate it with default options
    fn translate_text(&self, text: &str) -> CompileResult<Query> {
        let request = QueryRequest::parse(text)?;
        self.translate(&request)
    }
}

/// Assemble `WHERE` from a compiled predicate and the caller's raw fragment
pub(crate) fn where_clause(predicate: Option<String>, user_where: Option<&str>) -> String {
    match (predicate, user_where) {
        (Some(p), Some(u)) => format!(" WHERE {} AND {}", p, u),
        (Some(p), None) => format!(" WHERE {}", p),
        (None, Some(u)) => format!(" WHERE {}", u),
        (None, None) => String::new(),
    }
}
