//! Search matrices.
//!
//! A [`Matrix`] is an ordered list of [`Column`]s, each matching one word
//! token; successive columns match successive words of the same turn. A
//! column holds [`LayerMatch`]es that must all hold of its word.
//! [`MatrixCompiler`] turns a matrix into one `INSERT ... SELECT` statement
//! that records every match in a results table.

mod compile;

pub use compile::MatrixCompiler;

use serde::{Deserialize, Serialize};

fn default_adjacency() -> u32 {
    1
}

fn is_default_adjacency(adjacency: &u32) -> bool {
    *adjacency == 1
}

/// Ordered word-by-word search pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    #[serde(default)]
    pub columns: Vec<Column>,

    /// Query-language expression restricting the transcripts searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_query: Option<String>,
}

impl Matrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_transcript_query(mut self, query: impl Into<String>) -> Self {
        self.transcript_query = Some(query.into());
        self
    }

    /// Every layer match, column by column
    pub fn matches(&self) -> impl Iterator<Item = (usize, &LayerMatch)> {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(i, column)| column.layers.iter().map(move |m| (i, m)))
    }
}

/// Constraints on one word token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub layers: Vec<LayerMatch>,

    /// How many words later the next column may match; 1 means the
    /// immediately following word
    #[serde(
        default = "default_adjacency",
        skip_serializing_if = "is_default_adjacency"
    )]
    pub adjacency: u32,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            adjacency: default_adjacency(),
        }
    }
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match(mut self, layer_match: LayerMatch) -> Self {
        self.layers.push(layer_match);
        self
    }

    pub fn with_adjacency(mut self, adjacency: u32) -> Self {
        self.adjacency = adjacency;
        self
    }
}

/// A pattern on one layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMatch {
    pub layer_id: String,

    /// Regular expression the whole label must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Match labels that do not match `pattern`
    #[serde(default)]
    pub not: bool,

    /// Inclusive numeric lower bound on the label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Exclusive numeric upper bound on the label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// The match must start an utterance
    #[serde(default)]
    pub anchor_start: bool,

    /// The match must end an utterance
    #[serde(default)]
    pub anchor_end: bool,

    /// Record this match as the result's target annotation
    #[serde(default)]
    pub target: bool,
}

impl LayerMatch {
    pub fn new(layer_id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// A match with no pattern
    pub fn layer(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            ..Self::default()
        }
    }

    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn anchored_start(mut self) -> Self {
        self.anchor_start = true;
        self
    }

    pub fn anchored_end(mut self) -> Self {
        self.anchor_end = true;
        self
    }

    pub fn as_target(mut self) -> Self {
        self.target = true;
        self
    }

    /// Non-empty pattern
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|p| !p.is_empty())
    }

    /// Whether this match constrains anything
    pub fn is_constraint(&self) -> bool {
        self.pattern().is_some()
            || self.min.is_some()
            || self.max.is_some()
            || self.anchor_start
            || self.anchor_end
            || self.target
    }
}

/// Caller-level search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Written into every result row
    #[serde(default)]
    pub search_id: i64,

    /// Only match turns of main participants
    #[serde(default)]
    pub main_participant_only: bool,

    /// Only match turns of these participants (by name)
    #[serde(default)]
    pub participant_ids: Vec<String>,

    /// Table that receives result rows
    #[serde(default = "default_results_table")]
    pub results_table: String,
}

fn default_results_table() -> String {
    "_result".to_string()
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_id: 0,
            main_participant_only: false,
            participant_ids: Vec::new(),
            results_table: default_results_table(),
        }
    }
}

/// Caller hooks restricting what a search may see
pub trait SearchRestriction: Send + Sync {
    /// Condition on `ag_id` limiting the searchable transcripts
    fn transcript_filter(&self, ag_id: &str) -> Option<String> {
        let _ = ag_id;
        None
    }

    /// Raw join clauses appended after the generated joins
    fn extra_joins(&self) -> Option<String> {
        None
    }

    /// Raw condition ANDed into the WHERE clause
    fn extra_where(&self) -> Option<String> {
        None
    }
}

/// No restriction at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRestriction;

impl SearchRestriction for NoRestriction {}

/// Restriction from a transcript filter callback
pub struct TranscriptFilter<F>(pub F);

impl<F> SearchRestriction for TranscriptFilter<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn transcript_filter(&self, ag_id: &str) -> Option<String> {
        (self.0)(ag_id)
    }
}
