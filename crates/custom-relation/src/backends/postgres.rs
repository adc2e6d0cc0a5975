//! PostgreSQL executor over an sqlx connection pool

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, PgPool, Postgres, Row};
use tracing::debug;

use crate::error::{RelationError, RelationResult};
use crate::executor::QueryExecutor;
use crate::logging::LOG_TARGET;
use crate::query::QueryBuilder;
use crate::record::Record;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Executes relation queries against a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute_select(&self, query: &QueryBuilder) -> RelationResult<Vec<Record>> {
        let table = query
            .from_table()
            .ok_or_else(|| RelationError::Query("SELECT without a FROM table".to_string()))?;

        let (sql, params) = query.to_sql_with_params();
        debug!(target: LOG_TARGET, sql = %sql, params = params.len(), "Executing relation query");

        let mut db_query = sqlx::query(&sql);
        for param in &params {
            db_query = bind_value(db_query, param)?;
        }

        let rows = db_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RelationError::Database(format!("Relation query failed: {}", e)))?;

        rows.iter()
            .map(|row| Record::from_json(table, row_to_json(row)))
            .collect()
    }
}

fn bind_value<'q>(db_query: PgQuery<'q>, value: &'q Value) -> RelationResult<PgQuery<'q>> {
    Ok(match value {
        Value::Null => db_query.bind(None::<String>),
        Value::Bool(b) => db_query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                db_query.bind(i)
            } else if let Some(f) = n.as_f64() {
                db_query.bind(f)
            } else {
                return Err(RelationError::Query(format!("Unsupported number parameter {}", n)));
            }
        }
        Value::String(s) => match uuid_param(s) {
            Some(id) => db_query.bind(id),
            None => db_query.bind(s.as_str()),
        },
        Value::Array(_) | Value::Object(_) => db_query.bind(value.clone()),
    })
}

/// Rows decode `uuid` columns to hyphenated strings; bind those back as
/// `uuid` so keys read from a row compare against a `uuid` column.
fn uuid_param(s: &str) -> Option<uuid::Uuid> {
    if s.len() != 36 {
        return None;
    }
    uuid::Uuid::parse_str(s).ok()
}

/// Convert a row to a JSON object, trying the common column types in turn
fn row_to_json(row: &PgRow) -> Value {
    let mut map = serde_json::Map::new();

    for (i, column) in row.columns().iter().enumerate() {
        let value = if let Ok(value) = row.try_get::<Option<String>, _>(i) {
            value.map_or(Value::Null, Value::String)
        } else if let Ok(value) = row.try_get::<Option<i64>, _>(i) {
            value.map_or(Value::Null, Value::from)
        } else if let Ok(value) = row.try_get::<Option<i32>, _>(i) {
            value.map_or(Value::Null, Value::from)
        } else if let Ok(value) = row.try_get::<Option<i16>, _>(i) {
            value.map_or(Value::Null, Value::from)
        } else if let Ok(value) = row.try_get::<Option<f64>, _>(i) {
            value
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number)
        } else if let Ok(value) = row.try_get::<Option<bool>, _>(i) {
            value.map_or(Value::Null, Value::Bool)
        } else if let Ok(value) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_rfc3339()))
        } else if let Ok(value) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        } else if let Ok(value) = row.try_get::<Option<uuid::Uuid>, _>(i) {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        } else if let Ok(value) = row.try_get::<Option<Value>, _>(i) {
            value.unwrap_or(Value::Null)
        } else {
            Value::Null
        };

        map.insert(column.name().to_string(), value);
    }

    Value::Object(map)
}
