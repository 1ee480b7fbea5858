//! Annotation-scope translator.
//!
//! Every expression selects rows of one target layer's table, aliased
//! `annotation`. The target comes from a top-level `layer.id == 'X'`
//! (or `layerId == 'X'`) conjunct, or failing that from the layer id
//! encoded in a top-level `id == 'ew_0_456'` conjunct.
//!
//! Joins used here, in render order:
//! - `graph`: the owning transcript
//! - `start`/`end`: the target's anchors
//! - `turn`: the owning turn
//! - `speaker`: the turn's speaker

use super::common::{Compiler, Context, QueryScope};
use super::{where_clause, QueryRequest, SqlTranslator};
use crate::error::{CompileError, CompileErrors, CompileResult};
use crate::expr::{BinaryOp, Expr};
use crate::render::literal::{alias_safe, quote};
use crate::render::Query;
use crate::resolve::{
    participant_query, speaker_attribute_query, SetKind, SetQuery, SpeakerKey,
};
use crate::schema::{Layer, PseudoLayer, Schema};
use crate::syntax::parse_order;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// `<prefix>_<layer_id>_<annotation_id>`
static ANNOTATION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^e[a-z]?_(-?\d+)_\w+$").unwrap());

const DEFAULT_COLUMNS: &str = "DISTINCT annotation.*";

const GRAPH_RANK: u8 = 0;
const ANCHOR_RANK: u8 = 1;
const TURN_RANK: u8 = 2;
const SPEAKER_RANK: u8 = 3;

/// Aliases already taken in the outer statement
const RESERVED_ALIASES: &[&str] = &["annotation", "graph", "start", "end", "turn", "speaker"];

/// Translates expressions over the annotations of one layer.
pub struct AnnotationTranslator {
    schema: Arc<Schema>,
}

impl AnnotationTranslator {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

// ============================================================================
// Target layer
// ============================================================================

fn is_layer_id(expr: &Expr) -> bool {
    matches!(expr.path().as_deref(), Some("layer.id") | Some("layerId"))
}

/// `layer.id == 'X'` in either operand order
fn named_target(conjunct: &Expr) -> Option<&str> {
    let Expr::Binary {
        op: BinaryOp::Eq,
        left,
        right,
    } = conjunct
    else {
        return None;
    };
    if is_layer_id(left) {
        right.as_str()
    } else if is_layer_id(right) {
        left.as_str()
    } else {
        None
    }
}

/// Layer id encoded in an annotation id string
fn layer_in_id(id: &str) -> Option<i64> {
    ANNOTATION_ID_RE
        .captures(id)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `id == 'ew_0_456'` or `['ew_0_1', ...].includes(id)`
fn id_target(conjunct: &Expr) -> Option<i64> {
    match conjunct {
        Expr::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } => {
            let value = match (left.path().as_deref(), right.path().as_deref()) {
                (Some("id"), _) => right.as_str(),
                (_, Some("id")) => left.as_str(),
                _ => None,
            }?;
            layer_in_id(value)
        }
        Expr::Call { callee, args } => {
            let Expr::Member { object, property } = callee.as_ref() else {
                return None;
            };
            let (Expr::List(items), [arg]) = (object.as_ref(), args.as_slice()) else {
                return None;
            };
            if property != "includes" || arg.path().as_deref() != Some("id") {
                return None;
            }
            items.first().and_then(Expr::as_str).and_then(layer_in_id)
        }
        _ => None,
    }
}

/// Find the target layer and the indexes of the conjuncts that only name it
fn find_target<'s>(
    schema: &'s Schema,
    conjuncts: &[&Expr],
) -> Result<(&'s Layer, Vec<usize>), CompileError> {
    let mut named: Vec<&str> = Vec::new();
    let mut consumed = Vec::new();
    for (i, conjunct) in conjuncts.iter().enumerate() {
        if let Some(name) = named_target(conjunct) {
            consumed.push(i);
            if !named.contains(&name) {
                named.push(name);
            }
        }
    }

    let layer = match named.as_slice() {
        [name] => schema
            .layer(name)
            .ok_or_else(|| CompileError::UnknownLayer(name.to_string()))?,
        [] => {
            let mut ids: Vec<i64> = Vec::new();
            for id in conjuncts.iter().filter_map(|c| id_target(c)) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            match ids.as_slice() {
                [] => return Err(CompileError::MissingTargetLayer),
                [id] => schema
                    .layer_by_numeric_id(*id)
                    .ok_or(CompileError::MissingTargetLayer)?,
                _ => {
                    return Err(CompileError::AmbiguousTargetLayer(
                        ids.iter()
                            .map(|id| {
                                schema
                                    .layer_by_numeric_id(*id)
                                    .map_or_else(|| id.to_string(), |l| l.id.clone())
                            })
                            .collect(),
                    ))
                }
            }
        }
        _ => {
            return Err(CompileError::AmbiguousTargetLayer(
                named.iter().map(|n| n.to_string()).collect(),
            ))
        }
    };

    if layer.table_id().is_none() {
        return Err(CompileError::InvalidTargetLayer(layer.id.clone()));
    }
    Ok((layer, consumed))
}

// ============================================================================
// Scope
// ============================================================================

struct AnnotationScope<'s> {
    schema: &'s Schema,
    target: &'s Layer,
}

impl<'s> AnnotationScope<'s> {
    /// Annotation id string of `layer` built from a numeric id column
    fn id_expr(layer: &Layer, column: &str) -> String {
        format!(
            "CONCAT({}, {})",
            quote(&layer.annotation_id_prefix().unwrap_or_default()),
            column
        )
    }

    fn join_graph(&self, ctx: &mut Context<'_>) {
        ctx.joins.add(
            GRAPH_RANK,
            "graph",
            "INNER JOIN transcript graph ON annotation.ag_id = graph.ag_id",
        );
    }

    fn join_anchors(&self, ctx: &mut Context<'_>) {
        ctx.joins.add(
            ANCHOR_RANK,
            "start",
            "INNER JOIN anchor start ON start.anchor_id = annotation.start_anchor_id",
        );
        ctx.joins.add(
            ANCHOR_RANK,
            "end",
            "INNER JOIN anchor end ON end.anchor_id = annotation.end_anchor_id",
        );
    }

    /// Join the owning turn if needed; returns the speaker number expression
    fn join_turn(&self, ctx: &mut Context<'_>) -> Option<&'static str> {
        if self.schema.is_turn_layer(self.target) {
            return Some("annotation.label");
        }
        if !self.schema.has_turn_key(self.target) {
            return None;
        }
        ctx.joins.add(
            TURN_RANK,
            "turn",
            format!(
                "INNER JOIN annotation_layer_{} turn ON turn.annotation_id = annotation.turn_annotation_id",
                self.schema.turn_table_id()
            ),
        );
        Some("turn.label")
    }

    fn parent_id(&self, ctx: &mut Context<'_>) -> Option<String> {
        let parent = self
            .target
            .parent_id
            .as_deref()
            .and_then(|id| self.schema.layer(id))?;
        if parent.table_id().is_some() {
            return Some(Self::id_expr(parent, "annotation.parent_id"));
        }
        match parent.pseudo_kind() {
            Some(PseudoLayer::Transcript) => {
                self.join_graph(ctx);
                Some("graph.transcript_id".to_string())
            }
            _ => None,
        }
    }

    /// Rows of another own-table layer overlapping the target in time,
    /// within the same turn where both layers are turn-keyed
    fn overlap_tail(&self, ctx: &mut Context<'_>, layer: &Layer, layer_id: i64) -> (String, String) {
        self.join_anchors(ctx);

        let mut alias = alias_safe(&layer.id);
        if RESERVED_ALIASES.contains(&alias.as_str()) {
            alias.push_str("_layer");
        }

        let correlation = if self.schema.has_turn_key(layer) && self.schema.has_turn_key(self.target)
        {
            format!(
                "{} = {}",
                self.schema.turn_key(layer, &alias),
                self.schema.turn_key(self.target, "annotation")
            )
        } else {
            format!("{}.ag_id = annotation.ag_id", alias)
        };

        let tail = format!(
            " FROM annotation_layer_{id} {a} \
             INNER JOIN anchor {a}_start ON {a}_start.anchor_id = {a}.start_anchor_id \
             INNER JOIN anchor {a}_end ON {a}_end.anchor_id = {a}.end_anchor_id \
             WHERE {corr} AND {a}_start.offset <= end.offset AND start.offset <= {a}_end.offset",
            id = layer_id,
            a = alias,
            corr = correlation
        );
        (alias, tail)
    }
}

impl QueryScope for AnnotationScope<'_> {
    fn ag_id(&self) -> &'static str {
        "annotation.ag_id"
    }

    fn transcript_column(&self, ctx: &mut Context<'_>, column: &str) -> String {
        self.join_graph(ctx);
        format!("graph.{}", column)
    }

    fn identifier(&self, ctx: &mut Context<'_>, path: &str) -> Option<String> {
        let sql = match path {
            "id" => Self::id_expr(self.target, "annotation.annotation_id"),
            "label" => "annotation.label".to_string(),
            "ordinal" => "annotation.ordinal".to_string(),
            "annotator" => "annotation.annotated_by".to_string(),
            "when" => "annotation.annotated_when".to_string(),
            "confidence" => "annotation.label_status".to_string(),
            "layerId" | "layer.id" => quote(&self.target.id),
            "graph.id" | "graph.label" => self.transcript_column(ctx, "transcript_id"),
            "start.offset" | "end.offset" => {
                self.join_anchors(ctx);
                path.to_string()
            }
            "parentId" | "parent.id" => return self.parent_id(ctx),
            _ => return None,
        };
        Some(sql)
    }

    fn table_set(
        &self,
        ctx: &mut Context<'_>,
        layer: &Layer,
        layer_id: i64,
        kind: SetKind,
    ) -> SetQuery {
        let (alias, tail) = self.overlap_tail(ctx, layer, layer_id);
        SetQuery::rows(
            kind,
            &format!("{}.label", alias),
            &format!("{}.annotated_by", alias),
            tail,
        )
        .ordered_by(format!("{}_start.offset", alias))
    }

    fn table_label(&self, ctx: &mut Context<'_>, layer: &Layer, layer_id: i64) -> String {
        if layer.id == self.target.id {
            return "annotation.label".to_string();
        }
        self.table_set(ctx, layer, layer_id, SetKind::List).first()
    }

    fn table_id(&self, ctx: &mut Context<'_>, layer: &Layer, layer_id: i64) -> String {
        if layer.id == self.target.id {
            return Self::id_expr(self.target, "annotation.annotation_id");
        }
        let (alias, tail) = self.overlap_tail(ctx, layer, layer_id);
        let column = Self::id_expr(layer, &format!("{}.annotation_id", alias));
        SetQuery::rows(SetKind::List, &column, &column, tail)
            .ordered_by(format!("{}_start.offset", alias))
            .first()
    }

    fn participant_label(&self, ctx: &mut Context<'_>) -> String {
        match self.join_turn(ctx) {
            Some(number) => {
                ctx.joins.add(
                    SPEAKER_RANK,
                    "speaker",
                    format!("INNER JOIN speaker ON speaker.speaker_number = {}", number),
                );
                "speaker.name".to_string()
            }
            None => participant_query(self.ag_id(), false, SetKind::List)
                .map(|set| set.first())
                .unwrap_or_else(|| "NULL".to_string()),
        }
    }

    fn speaker_attribute(
        &self,
        ctx: &mut Context<'_>,
        attribute: &str,
        kind: SetKind,
    ) -> SetQuery {
        let key = match self.join_turn(ctx) {
            Some(number) => SpeakerKey::Number(number),
            None => SpeakerKey::Transcript(self.ag_id()),
        };
        speaker_attribute_query(attribute, key, kind)
    }
}

/// Default ordering, which depends on the joins in use
fn default_order(has_graph: bool, has_anchors: bool) -> String {
    let lead = if has_graph {
        "graph.transcript_id"
    } else {
        "ag_id"
    };
    if has_anchors {
        format!("{}, start.offset, end.offset, parent_id, annotation_id", lead)
    } else {
        format!("{}, parent_id, annotation_id", lead)
    }
}

impl SqlTranslator for AnnotationTranslator {
    fn name(&self) -> &str {
        "annotation"
    }

    fn translate(&self, request: &QueryRequest) -> CompileResult<Query> {
        let Some(expression) = &request.expression else {
            return Err(CompileErrors::from(CompileError::NoExpression));
        };

        let conjuncts = expression.conjuncts();
        let (target, consumed) = find_target(&self.schema, &conjuncts)?;
        let layer_id = target.table_id().unwrap_or_default();

        debug!(
            translator = self.name(),
            layer = %target.id,
            expression = %expression,
            "Translating expression"
        );

        let scope = AnnotationScope {
            schema: &self.schema,
            target,
        };
        let mut compiler = Compiler::new(&self.schema, &scope);

        let conditions: Vec<String> = conjuncts
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .map(|(_, conjunct)| compiler.condition(conjunct).sql)
            .collect();
        let predicate = if conditions.is_empty() {
            None
        } else {
            Some(conditions.join(" AND "))
        };

        let order = match request.order_by() {
            Some(text) => {
                let terms = parse_order(text)?;
                compiler.order(&terms)
            }
            None => String::new(),
        };

        let joins = compiler.ctx.finish().map_err(|errors| {
            warn!(
                translator = self.name(),
                layer = %target.id,
                errors = errors.len(),
                "Translation failed"
            );
            errors
        })?;

        let order = if order.is_empty() {
            default_order(joins.contains("graph"), joins.contains("start"))
        } else {
            order
        };

        let mut parameters = Vec::new();
        let sql = format!(
            "SELECT {}, {} AS layer FROM annotation_layer_{} annotation{}{} ORDER BY {}{}",
            request.columns_or(DEFAULT_COLUMNS),
            quote(&target.id),
            layer_id,
            joins.render(&mut parameters),
            where_clause(predicate, request.user_where()),
            order,
            request.limit_clause()
        );

        debug!(
            translator = self.name(),
            layer = %target.id,
            joins = joins.len(),
            parameters = parameters.len(),
            "Translated expression"
        );
        Ok(Query::with_parameters(sql, parameters))
    }
}
