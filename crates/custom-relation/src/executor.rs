//! Query execution seam between relations and a storage backend

use async_trait::async_trait;

use crate::error::RelationResult;
use crate::query::QueryBuilder;
use crate::record::Record;

/// Runs relation queries and hydrates their rows into records
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a SELECT and return one record per row, tagged with the
    /// query's table.
    async fn execute_select(&self, query: &QueryBuilder) -> RelationResult<Vec<Record>>;

    /// Apply the query's registered scopes before execution
    fn apply_scopes(&self, query: QueryBuilder) -> QueryBuilder {
        query.apply_scopes()
    }

    /// Load relations nested under freshly fetched records
    async fn eager_load_relations(&self, records: Vec<Record>) -> RelationResult<Vec<Record>> {
        Ok(records)
    }
}
