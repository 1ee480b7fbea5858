//! SQL output types and the building blocks shared by every compiler.

pub mod joins;
pub mod literal;

pub use joins::{Join, JoinSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A compiled statement: SQL text plus positional parameters.
///
/// The Nth `?` placeholder in `sql` (left to right, outside string
/// literals) corresponds to the Nth entry of `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The generated SQL statement
    pub sql: String,
    /// Values to bind, in placeholder order
    pub parameters: Vec<Value>,
}

impl Query {
    /// A statement with no bound parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    /// Number of `?` placeholders outside quoted string literals
    pub fn placeholder_count(&self) -> usize {
        placeholder_count(&self.sql)
    }

    /// Whether placeholders and parameters line up one to one
    pub fn is_aligned(&self) -> bool {
        self.placeholder_count() == self.parameters.len()
    }
}

/// Count `?` placeholders, skipping single-quoted literals and their
/// backslash escapes.
pub fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut in_string = false;
    let mut chars = sql.chars();
    while let Some(c) = chars.next() {
        match (in_string, c) {
            (true, '\\') => {
                chars.next();
            }
            (true, '\'') => in_string = false,
            (false, '\'') => in_string = true,
            (false, '?') => count += 1,
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_count_skips_strings() {
        assert_eq!(placeholder_count("a = ? AND b = '?' AND c = ?"), 2);
        assert_eq!(placeholder_count(r"a = 'it\'s ?' AND b = ?"), 1);
        assert_eq!(placeholder_count("SELECT 1"), 0);
    }

    #[test]
    fn test_alignment() {
        let query = Query::with_parameters("x REGEXP ?", vec![Value::from("^(a)$")]);
        assert!(query.is_aligned());
        assert!(!Query::new("x REGEXP ?").is_aligned());
    }
}
