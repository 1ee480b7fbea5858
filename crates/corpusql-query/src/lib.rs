//! # corpusql-query
//!
//! Compiles queries over a linguistic annotation store into SQL.
//!
//! - [`TranscriptTranslator`]: expressions selecting transcripts
//! - [`AnnotationTranslator`]: expressions selecting annotations of one layer
//! - [`MatrixCompiler`]: word-by-word search matrices into `INSERT ... SELECT`
//!
//! All three compile against a shared, immutable [`Schema`] and report every
//! problem they find as [`CompileErrors`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use corpusql_query::{AnnotationTranslator, Schema, SqlTranslator};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(Schema::standard());
//! let query = AnnotationTranslator::new(schema)
//!     .translate_text("layer.id == 'word' && /^the$/.test(label)")?;
//! println!("{}", query.sql);
//! ```

pub mod error;
pub mod expr;
pub mod matrix;
pub mod render;
pub mod resolve;
pub mod schema;
pub mod syntax;
// Schema fixtures, exposed to other crates' tests through `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod translate;

pub use error::{CompileError, CompileErrors, CompileResult, SchemaError};
pub use expr::{BinaryOp, Expr, Literal, UnaryOp};
pub use matrix::{
    Column, LayerMatch, Matrix, MatrixCompiler, NoRestriction, SearchOptions, SearchRestriction,
    TranscriptFilter,
};
pub use render::Query;
pub use resolve::{LayerBinding, LayerResolver};
pub use schema::{Layer, Schema, SchemaDefinition};
pub use syntax::{parse_expression, parse_order, OrderTerm};
pub use translate::{AnnotationTranslator, QueryRequest, SqlTranslator, TranscriptTranslator};
