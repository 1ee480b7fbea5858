//! Transcript-scope translator.
//!
//! Produces `SELECT <columns> FROM transcript [WHERE ...] ORDER BY ...`.
//! Every layer reference becomes a subquery correlated on
//! `transcript.ag_id`, or a column of `transcript` itself.

use super::common::{Compiler, Context, QueryScope};
use super::{where_clause, QueryRequest, SqlTranslator};
use crate::error::CompileResult;
use crate::expr::Expr;
use crate::render::literal::quote;
use crate::render::Query;
use crate::resolve::{speaker_attribute_query, SetKind, SetQuery, SpeakerKey};
use crate::schema::{Layer, Schema};
use crate::syntax::parse_order;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_COLUMNS: &str = "transcript.*";
const DEFAULT_ORDER: &str = "transcript.transcript_id";

/// Translates expressions over transcripts.
///
/// A missing or blank expression selects every transcript.
pub struct TranscriptTranslator {
    schema: Arc<Schema>,
}

impl TranscriptTranslator {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Layer references become correlated subqueries, so this scope never joins
struct TranscriptScope;

impl TranscriptScope {
    fn table_tail(layer_id: i64) -> String {
        format!(
            " FROM annotation_layer_{id} WHERE annotation_layer_{id}.ag_id = transcript.ag_id",
            id = layer_id
        )
    }
}

impl QueryScope for TranscriptScope {
    fn ag_id(&self) -> &'static str {
        "transcript.ag_id"
    }

    fn transcript_column(&self, _ctx: &mut Context<'_>, column: &str) -> String {
        format!("transcript.{}", column)
    }

    fn identifier(&self, _ctx: &mut Context<'_>, path: &str) -> Option<String> {
        match path {
            "id" | "label" | "transcript_id" => Some("transcript.transcript_id".to_string()),
            _ => None,
        }
    }

    fn table_set(
        &self,
        _ctx: &mut Context<'_>,
        _layer: &Layer,
        layer_id: i64,
        kind: SetKind,
    ) -> SetQuery {
        SetQuery::rows(kind, "label", "annotated_by", Self::table_tail(layer_id))
            .ordered_by("ordinal")
    }

    fn table_id(&self, _ctx: &mut Context<'_>, layer: &Layer, layer_id: i64) -> String {
        let column = format!(
            "CONCAT({}, annotation_id)",
            quote(&layer.annotation_id_prefix().unwrap_or_default())
        );
        SetQuery::rows(SetKind::List, &column, &column, Self::table_tail(layer_id))
            .ordered_by("ordinal")
            .first()
    }

    fn speaker_attribute(
        &self,
        _ctx: &mut Context<'_>,
        attribute: &str,
        kind: SetKind,
    ) -> SetQuery {
        speaker_attribute_query(attribute, SpeakerKey::Transcript(self.ag_id()), kind)
    }
}

/// Compile `expr` into a condition over `transcript`, for embedding in
/// other statements
pub(crate) fn transcript_predicate(schema: &Schema, expr: &Expr) -> CompileResult<String> {
    let scope = TranscriptScope;
    let mut compiler = Compiler::new(schema, &scope);
    let predicate = compiler.condition(expr).sql;
    compiler.ctx.finish()?;
    Ok(predicate)
}

impl SqlTranslator for TranscriptTranslator {
    fn name(&self) -> &str {
        "transcript"
    }

    fn translate(&self, request: &QueryRequest) -> CompileResult<Query> {
        debug!(
            translator = self.name(),
            expression = ?request.expression.as_ref().map(|e| e.to_string()),
            "Translating expression"
        );

        let scope = TranscriptScope;
        let mut compiler = Compiler::new(&self.schema, &scope);

        let predicate = request
            .expression
            .as_ref()
            .map(|expr| compiler.condition(expr).sql);

        let order = match request.order_by() {
            Some(text) => {
                let terms = parse_order(text)?;
                compiler.order(&terms)
            }
            None => String::new(),
        };
        let order = if order.is_empty() {
            DEFAULT_ORDER.to_string()
        } else {
            order
        };

        compiler.ctx.finish().map_err(|errors| {
            warn!(
                translator = self.name(),
                errors = errors.len(),
                "Translation failed"
            );
            errors
        })?;

        let sql = format!(
            "SELECT {} FROM transcript{} ORDER BY {}{}",
            request.columns_or(DEFAULT_COLUMNS),
            where_clause(predicate, request.user_where()),
            order,
            request.limit_clause()
        );

        debug!(translator = self.name(), "Translated expression");
        Ok(Query::new(sql))
    }
}
