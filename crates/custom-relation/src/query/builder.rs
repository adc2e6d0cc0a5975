//! Query Builder - Core builder implementation

use super::types::*;

/// Query builder for the SELECT a relation runs against its related table
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(crate) select_items: Vec<SelectItem>,
    pub(crate) from_table: Option<String>,
    pub(crate) where_clauses: Vec<WhereClause>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) scopes: Vec<Scope>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a query on `table`
    pub fn table(table: &str) -> Self {
        Self::new().from(table)
    }

    pub fn from_table(&self) -> Option<&str> {
        self.from_table.as_deref()
    }

    pub fn select_items(&self) -> &[SelectItem] {
        &self.select_items
    }

    /// Whether any columns were selected explicitly
    pub fn has_select(&self) -> bool {
        !self.select_items.is_empty()
    }

    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.where_clauses
    }

    pub fn order(&self) -> &[(String, OrderDirection)] {
        &self.order_by
    }

    pub fn limit_count(&self) -> Option<i64> {
        self.limit_count
    }

    /// Names of scopes still waiting to be applied
    pub fn pending_scopes(&self) -> Vec<&str> {
        self.scopes.iter().map(|scope| scope.name.as_str()).collect()
    }
}
