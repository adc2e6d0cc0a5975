//! In-memory executor
//!
//! Evaluates [`QueryBuilder`] queries over JSON rows held in memory. It
//! understands column and `CONCAT_WS` operands, ordering, limits and
//! projection, and records every query it runs. Raw SQL fragments are
//! rejected since there is no SQL engine behind it.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RelationError, RelationResult};
use crate::executor::QueryExecutor;
use crate::logging::LOG_TARGET;
use crate::query::{Operand, OrderDirection, QueryBuilder, QueryOperator, SelectItem, WhereClause, WhereCondition};
use crate::record::Record;
use crate::relations::join_key::stringify;

type Row = Map<String, Value>;

/// Executor over tables of JSON rows
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    tables: HashMap<String, Vec<Row>>,
    queries: AtomicUsize,
    executed: RwLock<Vec<String>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; non-object rows are rejected
    pub fn with_table(mut self, table: &str, rows: Vec<Value>) -> RelationResult<Self> {
        let rows = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => Ok(map),
                other => Err(RelationError::Serialization(format!(
                    "Rows of '{}' must be JSON objects, got {}",
                    table, other
                ))),
            })
            .collect::<RelationResult<Vec<Row>>>()?;
        self.tables.insert(table.to_string(), rows);
        Ok(self)
    }

    /// Number of SELECTs executed so far
    pub fn query_count(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    /// SQL text of every executed query, oldest first
    pub async fn executed_sql(&self) -> Vec<String> {
        self.executed.read().await.clone()
    }

    fn evaluate(&self, query: &QueryBuilder) -> RelationResult<Vec<Row>> {
        let table = query
            .from_table()
            .ok_or_else(|| RelationError::Query("SELECT without a FROM table".to_string()))?;
        let rows = self
            .tables
            .get(table)
            .ok_or_else(|| RelationError::Query(format!("Unknown table '{}'", table)))?;

        let mut selected = Vec::new();
        for row in rows {
            if row_matches(row, query.where_clauses())? {
                selected.push(row);
            }
        }

        for (column, direction) in query.order().iter().rev() {
            let column = unqualified(column);
            selected.sort_by(|a, b| {
                let ordering = compare_nulls_last(a.get(column), b.get(column));
                match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit_count() {
            selected.truncate(limit.max(0) as usize);
        }

        selected
            .into_iter()
            .map(|row| project(row, query.select_items()))
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute_select(&self, query: &QueryBuilder) -> RelationResult<Vec<Record>> {
        let sql = query.to_sql();
        debug!(target: LOG_TARGET, sql = %sql, "Executing relation query in memory");

        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        self.executed.write().await.push(sql);

        let table = query.from_table().unwrap_or_default().to_string();
        self.evaluate(query)?
            .into_iter()
            .map(|row| Record::from_json(&table, Value::Object(row)))
            .collect()
    }
}

fn unqualified(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

fn operand_value(row: &Row, operand: &Operand) -> Value {
    match operand {
        Operand::Column(column) => row.get(unqualified(column)).cloned().unwrap_or(Value::Null),
        Operand::Concat { columns, separator } => Value::String(concat_ws(row, columns, separator)),
    }
}

/// `CONCAT_WS` semantics: NULL values are skipped
fn concat_ws(row: &Row, columns: &[String], separator: &str) -> String {
    columns
        .iter()
        .filter_map(|column| match row.get(unqualified(column)) {
            None | Some(Value::Null) => None,
            Some(value) => Some(stringify(value)),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn row_matches(row: &Row, clauses: &[WhereClause]) -> RelationResult<bool> {
    for clause in clauses {
        let condition = match clause {
            WhereClause::Condition(condition) => condition,
            WhereClause::Raw(raw) => {
                return Err(RelationError::Query(format!(
                    "Raw condition '{}' cannot be evaluated in memory",
                    raw
                )))
            }
        };
        if !condition_matches(row, condition) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn condition_matches(row: &Row, condition: &WhereCondition) -> bool {
    let left = operand_value(row, &condition.operand);
    let right = condition.value.as_ref().unwrap_or(&Value::Null);

    match condition.operator {
        QueryOperator::IsNull => left.is_null(),
        QueryOperator::IsNotNull => !left.is_null(),
        // SQL comparisons with NULL are never true
        _ if left.is_null() => false,
        QueryOperator::In => condition.values.iter().any(|v| values_equal(&left, v)),
        QueryOperator::NotIn => !condition.values.iter().any(|v| values_equal(&left, v)),
        QueryOperator::Equal => values_equal(&left, right),
        QueryOperator::NotEqual => !right.is_null() && !values_equal(&left, right),
        QueryOperator::GreaterThan => compare(&left, right) == Some(Ordering::Greater),
        QueryOperator::GreaterThanOrEqual => {
            matches!(compare(&left, right), Some(Ordering::Greater | Ordering::Equal))
        }
        QueryOperator::LessThan => compare(&left, right) == Some(Ordering::Less),
        QueryOperator::LessThanOrEqual => {
            matches!(compare(&left, right), Some(Ordering::Less | Ordering::Equal))
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Null, _) | (_, Value::Null) => false,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_nulls_last(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
    }
}

fn project(row: &Row, items: &[SelectItem]) -> RelationResult<Row> {
    if items.is_empty() {
        return Ok(row.clone());
    }

    let mut projected = Map::new();
    for item in items {
        match item {
            SelectItem::Column(column) if column == "*" || column.ends_with(".*") => {
                for (name, value) in row {
                    projected.insert(name.clone(), value.clone());
                }
            }
            SelectItem::Column(column) => {
                let name = unqualified(column);
                let value = row.get(name).cloned().unwrap_or(Value::Null);
                projected.insert(name.to_string(), value);
            }
            SelectItem::Concat {
                columns,
                separator,
                alias,
            } => {
                projected.insert(alias.clone(), Value::String(concat_ws(row, columns, separator)));
            }
            SelectItem::Raw(expression) => {
                return Err(RelationError::Query(format!(
                    "Raw select '{}' cannot be evaluated in memory",
                    expression
                )))
            }
        }
    }
    Ok(projected)
}
