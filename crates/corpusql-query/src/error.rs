//! Error types for query compilation.
//!
//! Layer-resolution and regex failures are collected rather than raised one at
//! a time, so every compilation either yields a complete [`Query`] or a
//! non-empty [`CompileErrors`] list, never both.
//!
//! [`Query`]: crate::render::Query

use std::fmt;
use thiserror::Error;

/// A single problem found while compiling an expression or search matrix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The expression was null or blank where one is required
    #[error("No expression was supplied")]
    NoExpression,

    /// A referenced layer does not exist in the schema
    #[error("Invalid layer: {0}")]
    UnknownLayer(String),

    /// An annotation query did not identify the layer it selects from
    #[error("Could not identify the target layer; the expression must include layer.id == 'layer-id'")]
    MissingTargetLayer,

    /// The named target layer is not stored in its own annotation table
    #[error("Layer {0} cannot be the target of an annotation query")]
    InvalidTargetLayer(String),

    /// More than one target layer was named
    #[error("Expression names more than one target layer: {}", .0.join(", "))]
    AmbiguousTargetLayer(Vec<String>),

    /// A regular expression literal or pattern failed to compile
    #[error("Invalid regular expression /{pattern}/: {message}")]
    InvalidRegex { pattern: String, message: String },

    /// A tree shape outside the fixed grammar
    #[error("Unsupported construct: {0}")]
    Unsupported(String),

    /// Query-language text could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A search matrix without any columns
    #[error("The search matrix has no columns")]
    EmptyMatrix,
}

/// The failure value of every compilation: one or more collected errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(Vec<CompileError>);

impl CompileErrors {
    /// Wrap a list of errors. Returns `None` when the list is empty.
    pub fn new(errors: Vec<CompileError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    /// The errors in the order they were found
    pub fn errors(&self) -> &[CompileError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable messages, one per error
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|e| e.to_string()).collect()
    }

    pub fn into_inner(self) -> Vec<CompileError> {
        self.0
    }
}

impl From<CompileError> for CompileErrors {
    fn from(err: CompileError) -> Self {
        Self(vec![err])
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = self.messages();
        write!(f, "{}", messages.join("\n"))
    }
}

impl std::error::Error for CompileErrors {}

impl IntoIterator for CompileErrors {
    type Item = CompileError;
    type IntoIter = std::vec::IntoIter<CompileError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Result type for compilations
pub type CompileResult<T> = Result<T, CompileErrors>;

/// Schema validation error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two layers share an id
    #[error("Duplicate layer id: {0}")]
    DuplicateLayer(String),

    /// Two own-table layers share a table id
    #[error("Layers {first} and {second} share table id {layer_id}")]
    DuplicateTable {
        layer_id: i64,
        first: String,
        second: String,
    },

    /// A designated layer (root, word, turn, ...) is not defined
    #[error("Designated {role} layer {id} is not defined")]
    MissingDesignatedLayer { role: &'static str, id: String },

    /// A designated layer that must have its own table does not
    #[error("Designated {role} layer {id} must be stored in its own table")]
    DesignatedLayerNotTable { role: &'static str, id: String },

    /// A layer names a parent that is not defined
    #[error("Layer {layer} has unknown parent {parent}")]
    UnknownParent { layer: String, parent: String },
}
