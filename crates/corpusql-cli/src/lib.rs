//! corpusql CLI library
//!
//! Loads a schema from configuration, compiles query-language expressions
//! and search matrices, and prints the resulting SQL with its parameters.
//! Nothing here talks to a database.

pub mod cli;
pub mod commands;
pub mod config;
pub mod output;
