//! Expression compilation shared by both translators.
//!
//! [`Compiler`] walks an [`Expr`] and produces SQL conditions and scalar
//! expressions. Everything that differs between the transcript and
//! annotation scopes (what `id` means, how other layers are correlated,
//! which joins are needed) sits behind [`QueryScope`].
//!
//! Layer and regex problems are recorded in the [`Context`] and compilation
//! carries on with a `NULL` stand-in, so one pass reports every problem.

use crate::error::{CompileError, CompileErrors};
use crate::expr::{BinaryOp, Expr, Literal, UnaryOp};
use crate::render::literal::{self, quote};
use crate::render::JoinSet;
use crate::resolve::{
    participant_query, transcript_attribute_query, transcript_fragment, LayerBinding,
    LayerResolver, SetKind, SetQuery,
};
use crate::schema::{AttributeClass, Layer, PseudoLayer, Schema};
use crate::syntax::OrderTerm;

/// Per-compilation state: joins added so far and collected errors
pub(crate) struct Context<'s> {
    pub schema: &'s Schema,
    pub joins: JoinSet,
    errors: Vec<CompileError>,
}

impl<'s> Context<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            joins: JoinSet::new(),
            errors: Vec::new(),
        }
    }

    /// Record an error once; repeats of the same error are dropped
    pub fn error(&mut self, err: CompileError) {
        if !self.errors.contains(&err) {
            self.errors.push(err);
        }
    }

    pub fn unsupported(&mut self, what: impl Into<String>) {
        self.error(CompileError::Unsupported(what.into()));
    }

    pub fn resolve(&mut self, id: &str) -> Option<LayerBinding<'s>> {
        match LayerResolver::new(self.schema).resolve(id) {
            Ok(binding) => Some(binding),
            Err(err) => {
                self.error(err);
                None
            }
        }
    }

    /// Record an error if `pattern` is not a valid regular expression
    pub fn check_regex(&mut self, pattern: &str) {
        if let Err(e) = regex::Regex::new(pattern) {
            self.error(CompileError::InvalidRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            });
        }
    }

    /// The joins, or every collected error
    pub fn finish(self) -> Result<JoinSet, CompileErrors> {
        match CompileErrors::new(self.errors) {
            Some(errors) => Err(errors),
            None => Ok(self.joins),
        }
    }
}

/// Scope-specific parts of expression compilation
pub(crate) trait QueryScope {
    /// `ag_id` of the current row's transcript
    fn ag_id(&self) -> &'static str;

    /// A column of the current row's transcript, joining it if needed
    fn transcript_column(&self, ctx: &mut Context<'_>, column: &str) -> String;

    /// SQL for a bare identifier or member path such as `id` or `start.offset`
    fn identifier(&self, ctx: &mut Context<'_>, path: &str) -> Option<String>;

    /// Values of an own-table layer related to the current row
    fn table_set(
        &self,
        ctx: &mut Context<'_>,
        layer: &Layer,
        layer_id: i64,
        kind: SetKind,
    ) -> SetQuery;

    /// `my(layer).label` for an own-table layer
    fn table_label(&self, ctx: &mut Context<'_>, layer: &Layer, layer_id: i64) -> String {
        self.table_set(ctx, layer, layer_id, SetKind::List).first()
    }

    /// `my(layer).id` for an own-table layer
    fn table_id(&self, ctx: &mut Context<'_>, layer: &Layer, layer_id: i64) -> String;

    /// `my('participant').label`
    fn participant_label(&self, _ctx: &mut Context<'_>) -> String {
        participant_query(self.ag_id(), false, SetKind::List)
            .map(|set| set.first())
            .unwrap_or_else(|| "NULL".to_string())
    }

    /// Values of a speaker attribute related to the current row
    fn speaker_attribute(
        &self,
        ctx: &mut Context<'_>,
        attribute: &str,
        kind: SetKind,
    ) -> SetQuery;
}

/// A compiled condition. `grouped` conditions are already parenthesised.
#[derive(Debug, Clone)]
pub(crate) struct Cond {
    pub sql: String,
    grouped: bool,
}

impl Cond {
    fn plain(sql: String) -> Self {
        Self { sql, grouped: false }
    }

    fn grouped(sql: String) -> Self {
        Self { sql, grouped: true }
    }

    fn negate(self) -> Self {
        if self.grouped {
            Self::plain(format!("NOT {}", self.sql))
        } else {
            Self::plain(format!("NOT ({})", self.sql))
        }
    }
}

/// Intermediate value of a sub-expression
enum Operand {
    Scalar(String),
    Null,
    Values(Vec<String>),
    Set(SetQuery),
    Regex,
    /// Already reported; consumers stay silent
    Invalid,
}

const NULL: &str = "NULL";

/// Walks expressions for one scope, accumulating joins and errors
pub(crate) struct Compiler<'a, 's, S: QueryScope> {
    pub ctx: Context<'s>,
    scope: &'a S,
}

impl<'a, 's, S: QueryScope> Compiler<'a, 's, S> {
    pub fn new(schema: &'s Schema, scope: &'a S) -> Self {
        Self {
            ctx: Context::new(schema),
            scope,
        }
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// Compile a boolean expression
    pub fn condition(&mut self, expr: &Expr) -> Cond {
        match expr {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let l = self.condition(left);
                let r = self.condition(right);
                Cond::plain(format!("{} AND {}", l.sql, r.sql))
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let l = self.condition(left);
                let r = self.condition(right);
                Cond::grouped(format!("({} OR {})", l.sql, r.sql))
            }
            Expr::Binary { op, left, right } => self.comparison(*op, left, right),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.negated(operand),
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Member { object, property } => {
                    self.method(object, property, args, false)
                }
                _ => {
                    self.ctx
                        .unsupported(format!("{} is not a condition", expr));
                    Cond::plain(NULL.to_string())
                }
            },
            Expr::Literal(Literal::Bool(b)) => {
                Cond::plain(if *b { "TRUE" } else { "FALSE" }.to_string())
            }
            other => {
                self.ctx
                    .unsupported(format!("{} is not a condition", other));
                Cond::plain(NULL.to_string())
            }
        }
    }

    /// Compile `!operand`
    fn negated(&mut self, operand: &Expr) -> Cond {
        match operand {
            Expr::Unary {
                op: UnaryOp::Not,
                operand: inner,
            } => self.condition(inner),
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Member { object, property } => self.method(object, property, args, true),
                _ => self.condition(operand).negate(),
            },
            _ => self.condition(operand).negate(),
        }
    }

    fn comparison(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Cond {
        let l = self.operand(left);
        let r = self.operand(right);
        let sql = match (l, r) {
            (Operand::Invalid, _) | (_, Operand::Invalid) => NULL.to_string(),
            (Operand::Null, Operand::Null) => {
                self.ctx.unsupported("comparison between two nulls");
                NULL.to_string()
            }
            (Operand::Scalar(value), Operand::Null) | (Operand::Null, Operand::Scalar(value)) => {
                match op {
                    BinaryOp::Eq => format!("{} IS NULL", value),
                    BinaryOp::Ne => format!("{} IS NOT NULL", value),
                    _ => {
                        self.ctx
                            .unsupported(format!("operator {} with null", op));
                        NULL.to_string()
                    }
                }
            }
            (Operand::Scalar(a), Operand::Scalar(b)) => format!("{} {} {}", a, op.sql(), b),
            _ => {
                self.ctx
                    .unsupported(format!("operands of {} must be single values", op));
                NULL.to_string()
            }
        };
        Cond::plain(sql)
    }

    /// `object.method(args)` as a condition
    fn method(&mut self, object: &Expr, method: &str, args: &[Expr], negated: bool) -> Cond {
        let not = if negated { "NOT " } else { "" };
        match (method, args) {
            ("test", [subject]) => {
                let Expr::Regex(pattern) = object else {
                    self.ctx
                        .unsupported(format!("test() on {}; expected a regular expression", object));
                    return Cond::plain(NULL.to_string());
                };
                self.ctx.check_regex(pattern);
                let subject = self.scalar(subject);
                Cond::plain(format!("{} {}REGEXP {}", subject, not, quote(pattern)))
            }
            ("includes", [needle]) => {
                let haystack = self.operand(object);
                let needle = self.scalar(needle);
                let sql = match haystack {
                    Operand::Values(items) if items.is_empty() => {
                        if negated { "TRUE" } else { "FALSE" }.to_string()
                    }
                    Operand::Values(items) => {
                        format!("{} {}IN ({})", needle, not, items.join(", "))
                    }
                    Operand::Set(set) => format!("{} {}IN ({})", needle, not, set.select()),
                    Operand::Invalid => NULL.to_string(),
                    _ => {
                        self.ctx.unsupported(format!(
                            "includes() on {}; expected a list or a layer function",
                            object
                        ));
                        NULL.to_string()
                    }
                };
                Cond::plain(sql)
            }
            _ => {
                self.ctx.unsupported(format!(
                    "method {}() with {} argument(s)",
                    method,
                    args.len()
                ));
                Cond::plain(NULL.to_string())
            }
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Compile an expression that must yield a single value
    pub fn scalar(&mut self, expr: &Expr) -> String {
        match self.operand(expr) {
            Operand::Scalar(sql) => sql,
            Operand::Null | Operand::Invalid => NULL.to_string(),
            _ => {
                self.ctx
                    .unsupported(format!("{} is not a single value", expr));
                NULL.to_string()
            }
        }
    }

    fn operand(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Literal(Literal::Null) => Operand::Null,
            Expr::Literal(lit) => Operand::Scalar(literal::render(lit)),
            Expr::Regex(_) => Operand::Regex,
            Expr::List(items) => {
                Operand::Values(items.iter().map(|item| self.scalar(item)).collect())
            }
            Expr::Ident(_) => self.path(expr),
            Expr::Member { object, property } => match object.as_ref() {
                Expr::Call { callee, args } => self.function_member(callee, args, property, expr),
                _ => self.path(expr),
            },
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Ident(name) => self.function(name, args),
                _ => {
                    let cond = self.condition(expr);
                    Operand::Scalar(format!("({})", cond.sql))
                }
            },
            Expr::Unary { .. } | Expr::Binary { .. } => {
                let cond = self.condition(expr);
                if cond.grouped {
                    Operand::Scalar(cond.sql)
                } else {
                    Operand::Scalar(format!("({})", cond.sql))
                }
            }
        }
    }

    fn path(&mut self, expr: &Expr) -> Operand {
        let Some(path) = expr.path() else {
            self.ctx.unsupported(format!("{}", expr));
            return Operand::Invalid;
        };
        match self.scope.identifier(&mut self.ctx, &path) {
            Some(sql) => Operand::Scalar(sql),
            None => {
                self.ctx
                    .unsupported(format!("unknown identifier {}", path));
                Operand::Invalid
            }
        }
    }

    /// Resolve the single layer-id argument of a layer function
    fn layer_argument(&mut self, name: &str, args: &[Expr]) -> Option<LayerBinding<'s>> {
        match args {
            [arg] => match arg.as_str() {
                Some(id) => self.ctx.resolve(id),
                None => {
                    self.ctx
                        .unsupported(format!("{}() takes a layer id string", name));
                    None
                }
            },
            _ => {
                self.ctx
                    .unsupported(format!("{}() takes exactly one argument", name));
                None
            }
        }
    }

    /// `my(..)`, `list(..)`, `labels(..)`, `annotators(..)`
    fn function(&mut self, name: &str, args: &[Expr]) -> Operand {
        let kind = match name {
            "my" => None,
            "list" => Some(SetKind::List),
            "labels" => Some(SetKind::Labels),
            "annotators" => Some(SetKind::Annotators),
            other => {
                self.ctx.unsupported(format!("function {}()", other));
                return Operand::Invalid;
            }
        };
        let Some(binding) = self.layer_argument(name, args) else {
            return Operand::Invalid;
        };
        match kind {
            None => self.my_label(binding),
            Some(kind) => match self.set(binding, kind) {
                Some(set) => Operand::Set(set),
                None => {
                    self.ctx.unsupported(format!(
                        "{}() on layer {}",
                        name,
                        binding.layer().id
                    ));
                    Operand::Invalid
                }
            },
        }
    }

    /// `my(..).label`, `my(..).id`, `list(..).length`, ...
    fn function_member(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        property: &str,
        whole: &Expr,
    ) -> Operand {
        let Expr::Ident(name) = callee else {
            self.ctx.unsupported(format!("{}", whole));
            return Operand::Invalid;
        };
        match (name.as_str(), property) {
            ("my", "label") => match self.layer_argument(name, args) {
                Some(binding) => self.my_label(binding),
                None => Operand::Invalid,
            },
            ("my", "id") => match self.layer_argument(name, args) {
                Some(binding) => self.my_id(binding),
                None => Operand::Invalid,
            },
            ("list" | "labels" | "annotators", "length") => match self.function(name, args) {
                Operand::Set(set) => Operand::Scalar(format!("({})", set.count())),
                other => other,
            },
            _ => {
                self.ctx.unsupported(format!("{}", whole));
                Operand::Invalid
            }
        }
    }

    fn my_label(&mut self, binding: LayerBinding<'s>) -> Operand {
        let sql = match binding {
            LayerBinding::Table { layer, layer_id } => {
                self.scope.table_label(&mut self.ctx, layer, layer_id)
            }
            LayerBinding::Pseudo {
                pseudo: PseudoLayer::Participant,
                ..
            } => self.scope.participant_label(&mut self.ctx),
            LayerBinding::Pseudo { .. } | LayerBinding::Attribute { .. } => {
                match self.set(binding, SetKind::List) {
                    Some(set) => set.first(),
                    None => NULL.to_string(),
                }
            }
        };
        Operand::Scalar(sql)
    }

    fn my_id(&mut self, binding: LayerBinding<'s>) -> Operand {
        match binding {
            LayerBinding::Table { layer, layer_id } => {
                Operand::Scalar(self.scope.table_id(&mut self.ctx, layer, layer_id))
            }
            LayerBinding::Pseudo {
                pseudo: PseudoLayer::Transcript,
                ..
            } => Operand::Scalar(self.scope.transcript_column(&mut self.ctx, "transcript_id")),
            _ => {
                self.ctx
                    .unsupported(format!("my('{}').id", binding.layer().id));
                Operand::Invalid
            }
        }
    }

    /// Values of a layer for `list`/`labels`/`annotators`
    fn set(&mut self, binding: LayerBinding<'s>, kind: SetKind) -> Option<SetQuery> {
        let ag_id = self.scope.ag_id();
        match binding {
            LayerBinding::Table { layer, layer_id } => {
                Some(self.scope.table_set(&mut self.ctx, layer, layer_id, kind))
            }
            LayerBinding::Attribute {
                class: AttributeClass::Transcript,
                attribute,
                ..
            } => Some(transcript_attribute_query(attribute, ag_id, kind)),
            LayerBinding::Attribute {
                class: AttributeClass::Speaker,
                attribute,
                ..
            } => Some(self.scope.speaker_attribute(&mut self.ctx, attribute, kind)),
            LayerBinding::Pseudo { pseudo, .. } => match pseudo {
                PseudoLayer::Participant => participant_query(ag_id, false, kind),
                PseudoLayer::MainParticipant => participant_query(ag_id, true, kind),
                _ if kind == SetKind::Annotators => None,
                _ => {
                    let ctx = &mut self.ctx;
                    let scope = self.scope;
                    transcript_fragment(pseudo, |column| scope.transcript_column(ctx, column))
                        .map(SetQuery::single)
                }
            },
        }
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Compile ORDER BY terms into a comma-separated list
    pub fn order(&mut self, terms: &[OrderTerm]) -> String {
        terms
            .iter()
            .map(|term| {
                let sql = self.scalar(&term.expr);
                if term.descending {
                    format!("{} DESC", sql)
                } else {
                    sql
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
