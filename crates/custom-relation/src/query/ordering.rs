//! Query Builder ORDER BY, LIMIT and scope operations

use std::sync::Arc;

use super::builder::QueryBuilder;
use super::types::{OrderDirection, Scope};

impl QueryBuilder {
    /// Add ORDER BY clause
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Add ORDER BY clause with DESC direction
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Desc));
        self
    }

    /// Add LIMIT clause
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Register a scope, applied by [`QueryBuilder::apply_scopes`]
    pub fn with_scope<F>(mut self, name: &str, scope: F) -> Self
    where
        F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    {
        self.scopes.push(Scope {
            name: name.to_string(),
            apply: Arc::new(scope),
        });
        self
    }

    /// Drop a registered scope before it is applied
    pub fn without_scope(mut self, name: &str) -> Self {
        self.scopes.retain(|scope| scope.name != name);
        self
    }

    /// Apply every registered scope once, in registration order
    pub fn apply_scopes(mut self) -> Self {
        let scopes = std::mem::take(&mut self.scopes);
        scopes
            .into_iter()
            .fold(self, |query, scope| (scope.apply)(query))
    }
}
