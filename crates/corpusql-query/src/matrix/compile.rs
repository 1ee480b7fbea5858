//! Search matrix compiler.
//!
//! Every column gets one word-positioned join (its *anchor*). Columns are
//! chained on `turn_annotation_id` and `ordinal_in_turn`; further matches in
//! a column join either on the anchor's word or, for span layers, on anchor
//! containment. Patterns are bound as `?` parameters in the order their
//! placeholders appear.

use super::{Column, LayerMatch, Matrix, SearchOptions, SearchRestriction};
use crate::error::{CompileError, CompileResult};
use crate::render::Query;
use crate::resolve::LayerBinding;
use crate::schema::{Layer, Schema};
use crate::syntax::parse_expression;
use crate::translate::common::Context;
use crate::translate::transcript_predicate;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const RESULT_COLUMNS: &str = "search_id, ag_id, speaker_number, start_anchor_id, \
end_anchor_id, target_annotation_id, segment_annotation_id, turn_annotation_id, \
first_matched_word_annotation_id, last_matched_word_annotation_id, complete";

/// Compiles search matrices into `INSERT ... SELECT` statements.
pub struct MatrixCompiler {
    schema: Arc<Schema>,
}

impl MatrixCompiler {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Compile `matrix` into one statement that inserts a row per match into
    /// `options.results_table`.
    pub fn compile(
        &self,
        matrix: &Matrix,
        options: &SearchOptions,
        restriction: &dyn SearchRestriction,
    ) -> CompileResult<Query> {
        debug!(
            columns = matrix.columns.len(),
            results_table = %options.results_table,
            search_id = options.search_id,
            "Compiling search matrix"
        );
        if matrix.columns.is_empty() {
            warn!("Search matrix has no columns");
            return Err(CompileError::EmptyMatrix.into());
        }

        let mut search = Search::new(&self.schema);
        let mut previous: Option<&Column> = None;
        for (index, column) in matrix.columns.iter().enumerate() {
            search.column(index, column, previous.map_or(1, |c| c.adjacency.max(1)));
            previous = Some(column);
        }
        search.restrict(matrix, options, restriction)?;

        let Search {
            ctx,
            conditions,
            mut where_parameters,
            anchors,
            target,
            segment,
        } = search;

        let (Some(first), Some(last)) = (anchors.first(), anchors.last()) else {
            return Err(CompileError::EmptyMatrix.into());
        };

        let joins = ctx.finish().map_err(|errors| {
            warn!(errors = errors.len(), "Search matrix compilation failed");
            errors
        })?;

        let mut parameters = Vec::new();
        let mut join_sql = joins.render(&mut parameters);
        if let Some(extra) = restriction
            .extra_joins()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            join_sql.push(' ');
            join_sql.push_str(&extra);
        }
        parameters.append(&mut where_parameters);

        let target = target.unwrap_or_else(|| first.clone());
        let segment = segment
            .map(|alias| format!("{}.annotation_id", alias))
            .unwrap_or_else(|| "NULL".to_string());
        let where_sql: String = conditions
            .iter()
            .map(|condition| format!(" AND {}", condition))
            .collect();

        let sql = format!(
            "INSERT INTO {table} ({columns}) SELECT {search_id}, turn.ag_id, \
CAST(turn.label AS SIGNED), {first}.start_anchor_id, {last}.end_anchor_id, \
{target}.annotation_id, {segment}, turn.annotation_id, {first}.word_annotation_id, \
{last}.word_annotation_id, 0 FROM annotation_layer_{turn} turn{joins} WHERE 1=1{conditions} \
ORDER BY {first}.turn_annotation_id, {first}.ordinal_in_turn",
            table = options.results_table,
            columns = RESULT_COLUMNS,
            search_id = options.search_id,
            first = first,
            last = last,
            target = target,
            segment = segment,
            turn = self.schema.turn_table_id(),
            joins = join_sql,
            conditions = where_sql,
        );

        debug!(
            joins = joins.len(),
            parameters = parameters.len(),
            "Compiled search matrix"
        );
        Ok(Query::with_parameters(sql, parameters))
    }
}

/// A layer match resolved to its table
#[derive(Clone, Copy)]
struct Resolved<'s, 'm> {
    layer: &'s Layer,
    layer_id: i64,
    matcher: &'m LayerMatch,
}

struct Search<'s> {
    ctx: Context<'s>,
    conditions: Vec<String>,
    where_parameters: Vec<Value>,
    /// Anchor alias of each column so far
    anchors: Vec<String>,
    target: Option<String>,
    segment: Option<String>,
}

impl<'s> Search<'s> {
    fn new(schema: &'s Schema) -> Self {
        Self {
            ctx: Context::new(schema),
            conditions: Vec::new(),
            where_parameters: Vec::new(),
            anchors: Vec::new(),
            target: None,
            segment: None,
        }
    }

    fn resolve<'m>(&mut self, matcher: &'m LayerMatch) -> Option<Resolved<'s, 'm>> {
        let binding = self.ctx.resolve(&matcher.layer_id)?;
        let LayerBinding::Table { layer, layer_id } = binding else {
            self.ctx
                .unsupported(format!("searching layer {}", matcher.layer_id));
            return None;
        };
        if let Some(pattern) = matcher.pattern() {
            self.ctx.check_regex(&anchored(pattern));
        }
        Some(Resolved {
            layer,
            layer_id,
            matcher,
        })
    }

    fn column(&mut self, index: usize, column: &Column, adjacency: u32) {
        let matches: Vec<Resolved<'s, '_>> = column
            .layers
            .iter()
            .filter_map(|matcher| self.resolve(matcher))
            .collect();

        let schema = self.ctx.schema;
        let anchor_index = matches
            .iter()
            .position(|m| schema.has_word_position(m.layer));
        let (anchor, table_id) = match anchor_index {
            Some(i) => (
                self.alias(index, matches[i].layer_id),
                matches[i].layer_id,
            ),
            None => (
                self.ctx.joins.unique_alias(&format!("word_{}", index)),
                schema.word_table_id(),
            ),
        };

        let mut on = vec![self.position(&anchor, adjacency)];
        let mut params = Vec::new();
        if let Some(i) = anchor_index {
            label_pattern(&anchor, &matches[i], &mut on, &mut params);
        }
        self.ctx.joins.add_with_params(
            0,
            anchor.clone(),
            format!(
                "INNER JOIN annotation_layer_{} {} ON {}",
                table_id,
                anchor,
                on.join(" AND ")
            ),
            params,
        );
        if let Some(i) = anchor_index {
            self.constrain(&anchor, &matches[i]);
        }

        for (i, matched) in matches.iter().enumerate() {
            if Some(i) == anchor_index || !matched.matcher.is_constraint() {
                continue;
            }
            let alias = self.alias(index, matched.layer_id);
            if schema.has_word_key(matched.layer) {
                self.word_join(&alias, &anchor, matched);
            } else {
                self.span_join(&alias, &anchor, matched);
            }
            self.constrain(&alias, matched);
        }

        self.anchors.push(anchor);
    }

    fn alias(&self, index: usize, layer_id: i64) -> String {
        self.ctx
            .joins
            .unique_alias(&format!("search_{}_{}", index, layer_id))
    }

    /// Ties a column anchor to the turn, or to the previous column's word
    fn position(&self, alias: &str, adjacency: u32) -> String {
        match self.anchors.last() {
            None => format!("{}.turn_annotation_id = turn.annotation_id", alias),
            Some(previous) if adjacency > 1 => format!(
                "{a}.turn_annotation_id = {p}.turn_annotation_id \
AND {a}.ordinal_in_turn BETWEEN {p}.ordinal_in_turn + 1 AND {p}.ordinal_in_turn + {n}",
                a = alias,
                p = previous,
                n = adjacency
            ),
            Some(previous) => format!(
                "{a}.turn_annotation_id = {p}.turn_annotation_id \
AND {a}.ordinal_in_turn = {p}.ordinal_in_turn + 1",
                a = alias,
                p = previous
            ),
        }
    }

    fn word_join(&mut self, alias: &str, anchor: &str, matched: &Resolved<'s, '_>) {
        let mut on = vec![format!(
            "{}.word_annotation_id = {}.word_annotation_id",
            alias, anchor
        )];
        let mut params = Vec::new();
        label_pattern(alias, matched, &mut on, &mut params);
        self.ctx.joins.add_with_params(
            0,
            alias,
            format!(
                "INNER JOIN annotation_layer_{} {} ON {}",
                matched.layer_id,
                alias,
                on.join(" AND ")
            ),
            params,
        );
    }

    /// Join a span layer whose annotation contains the anchor word
    fn span_join(&mut self, alias: &str, anchor: &str, matched: &Resolved<'s, '_>) {
        let schema = self.ctx.schema;
        for (edge, column) in [("start", "start_anchor_id"), ("end", "end_anchor_id")] {
            self.ctx.joins.add(
                0,
                format!("{}_{}", anchor, edge),
                format!(
                    "INNER JOIN anchor {a}_{e} ON {a}_{e}.anchor_id = {a}.{c}",
                    a = anchor,
                    e = edge,
                    c = column
                ),
            );
        }

        let key = if schema.has_turn_key(matched.layer) {
            format!(
                "{} = turn.annotation_id",
                schema.turn_key(matched.layer, alias)
            )
        } else {
            format!("{}.ag_id = turn.ag_id", alias)
        };
        let mut on = vec![key];
        let mut params = Vec::new();
        label_pattern(alias, matched, &mut on, &mut params);
        self.ctx.joins.add_with_params(
            0,
            alias,
            format!(
                "INNER JOIN annotation_layer_{} {} ON {}",
                matched.layer_id,
                alias,
                on.join(" AND ")
            ),
            params,
        );
        self.ctx.joins.add(
            0,
            format!("{}_start", alias),
            format!(
                "INNER JOIN anchor {s}_start ON {s}_start.anchor_id = {s}.start_anchor_id \
AND {s}_start.offset <= {a}_start.offset",
                s = alias,
                a = anchor
            ),
        );
        self.ctx.joins.add(
            0,
            format!("{}_end", alias),
            format!(
                "INNER JOIN anchor {s}_end ON {s}_end.anchor_id = {s}.end_anchor_id \
AND {a}_end.offset <= {s}_end.offset",
                s = alias,
                a = anchor
            ),
        );
    }

    /// WHERE conditions, target and segment bookkeeping for one match
    fn constrain(&mut self, alias: &str, matched: &Resolved<'s, '_>) {
        let matcher = matched.matcher;
        if let Some(min) = matcher.min {
            self.conditions
                .push(format!("CAST({}.label AS DECIMAL) >= ?", alias));
            self.where_parameters.push(Value::from(min));
        }
        if let Some(max) = matcher.max {
            self.conditions
                .push(format!("CAST({}.label AS DECIMAL) < ?", alias));
            self.where_parameters.push(Value::from(max));
        }
        if matcher.anchor_start {
            let border = self.border(alias, "start_anchor_id");
            self.conditions.push(border);
        }
        if matcher.anchor_end {
            let border = self.border(alias, "end_anchor_id");
            self.conditions.push(border);
        }
        if matcher.target && self.target.is_none() {
            self.target = Some(alias.to_string());
        }
        if matched.layer.is_segment_scoped() && self.segment.is_none() {
            self.segment = Some(alias.to_string());
        }
    }

    /// `alias` shares its `column` anchor with an utterance, or with the
    /// turn when the schema has no utterance layer
    fn border(&self, alias: &str, column: &str) -> String {
        let schema = self.ctx.schema;
        let utterance = schema
            .utterance_layer_id()
            .and_then(|id| schema.layer(id))
            .and_then(Layer::table_id);
        match utterance {
            Some(layer_id) => format!(
                "EXISTS (SELECT * FROM annotation_layer_{id} border \
WHERE border.turn_annotation_id = turn.annotation_id AND border.{c} = {a}.{c})",
                id = layer_id,
                c = column,
                a = alias
            ),
            None => format!("turn.{c} = {a}.{c}", c = column, a = alias),
        }
    }

    /// Transcript, participant and caller restrictions
    fn restrict(
        &mut self,
        matrix: &Matrix,
        options: &SearchOptions,
        restriction: &dyn SearchRestriction,
    ) -> Result<(), CompileError> {
        if let Some(text) = matrix.transcript_query.as_deref() {
            if let Some(expr) = parse_expression(text)? {
                match transcript_predicate(self.ctx.schema, &expr) {
                    Ok(predicate) => self.conditions.push(format!(
                        "turn.ag_id IN (SELECT transcript.ag_id FROM transcript WHERE {})",
                        predicate
                    )),
                    Err(errors) => {
                        for err in errors {
                            self.ctx.error(err);
                        }
                    }
                }
            }
        }

        if options.main_participant_only {
            self.conditions.push(
                "EXISTS (SELECT * FROM transcript_speaker \
WHERE transcript_speaker.ag_id = turn.ag_id \
AND transcript_speaker.speaker_number = CAST(turn.label AS SIGNED) \
AND transcript_speaker.main_speaker <> 0)"
                    .to_string(),
            );
        }

        if !options.participant_ids.is_empty() {
            let placeholders = vec!["?"; options.participant_ids.len()].join(", ");
            self.conditions.push(format!(
                "CAST(turn.label AS SIGNED) IN (SELECT speaker.speaker_number FROM speaker \
WHERE speaker.name IN ({}))",
                placeholders
            ));
            self.where_parameters.extend(
                options
                    .participant_ids
                    .iter()
                    .map(|id| Value::String(id.clone())),
            );
        }

        if let Some(filter) = restriction.transcript_filter("turn.ag_id") {
            self.conditions.push(filter);
        }
        if let Some(extra) = restriction.extra_where() {
            self.conditions.push(extra);
        }

        Ok(())
    }
}

/// Whole-label pattern as bound to `REGEXP`
fn anchored(pattern: &str) -> String {
    format!("^({})$", pattern)
}

/// Append the label pattern of `matched`, if any, to a join condition
fn label_pattern(
    alias: &str,
    matched: &Resolved<'_, '_>,
    on: &mut Vec<String>,
    params: &mut Vec<Value>,
) {
    let Some(pattern) = matched.matcher.pattern() else {
        return;
    };
    let not = if matched.matcher.not { "NOT " } else { "" };
    on.push(if matched.layer.is_case_sensitive() {
        format!("CAST({}.label AS BINARY) {}REGEXP BINARY ?", alias, not)
    } else {
        format!("{}.label {}REGEXP ?", alias, not)
    });
    params.push(Value::String(anchored(pattern)));
}
