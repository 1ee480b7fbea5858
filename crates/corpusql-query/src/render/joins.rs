//! Join bookkeeping shared by the translators and the matrix compiler.
//!
//! Joins are keyed by alias: adding an alias that is already present is a
//! no-op, so every layer is joined at most once per statement. Each join
//! carries a rank; rendering orders joins by rank, then by insertion, which
//! keeps the output independent of the order references were found in.

use serde_json::Value;

/// One `INNER JOIN` clause
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub alias: String,
    /// Full clause text, starting with `INNER JOIN`
    pub sql: String,
    /// Values for the `?` placeholders in `sql`, in order
    pub params: Vec<Value>,
    pub rank: u8,
}

/// Ordered, alias-deduplicated set of joins
#[derive(Debug, Clone, Default)]
pub struct JoinSet {
    joins: Vec<Join>,
}

impl JoinSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j.alias == alias)
    }

    /// Add a join without parameters. Returns false if the alias was
    /// already joined.
    pub fn add(&mut self, rank: u8, alias: impl Into<String>, sql: impl Into<String>) -> bool {
        self.add_with_params(rank, alias, sql, Vec::new())
    }

    /// Add a join whose clause contains placeholders
    pub fn add_with_params(
        &mut self,
        rank: u8,
        alias: impl Into<String>,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> bool {
        let alias = alias.into();
        if self.contains(&alias) {
            return false;
        }
        self.joins.push(Join {
            alias,
            sql: sql.into(),
            params,
            rank,
        });
        true
    }

    /// Pick an alias not yet used: `base`, then `base_2`, `base_3`, ...
    pub fn unique_alias(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Joins in render order
    pub fn ordered(&self) -> Vec<&Join> {
        let mut joins: Vec<&Join> = self.joins.iter().collect();
        joins.sort_by_key(|j| j.rank);
        joins
    }

    /// Render every clause, each preceded by a space, and append the
    /// clauses' parameters to `params` in the same order.
    pub fn render(&self, params: &mut Vec<Value>) -> String {
        let mut sql = String::new();
        for join in self.ordered() {
            sql.push(' ');
            sql.push_str(&join.sql);
            params.extend(join.params.iter().cloned());
        }
        sql
    }
}
