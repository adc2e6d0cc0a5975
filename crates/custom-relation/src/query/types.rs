//! Query Builder Types - Operators, operands and clauses

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::builder::QueryBuilder;

/// Query operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::In => write!(f, "IN"),
            QueryOperator::NotIn => write!(f, "NOT IN"),
            QueryOperator::IsNull => write!(f, "IS NULL"),
            QueryOperator::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// Left-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    /// Separator-joined text of several columns, as `CONCAT_WS` renders it
    Concat { columns: Vec<String>, separator: String },
}

impl Operand {
    pub fn to_sql(&self) -> String {
        match self {
            Operand::Column(column) => column.clone(),
            Operand::Concat { columns, separator } => concat_ws_sql(columns, separator),
        }
    }
}

/// Where clause condition
#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub operand: Operand,
    pub operator: QueryOperator,
    pub value: Option<Value>,
    pub values: Vec<Value>, // For IN, NOT IN
}

/// One entry of the WHERE clause, joined with AND
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Condition(WhereCondition),
    Raw(String),
}

/// One entry of the SELECT list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// Plain column or `table.*`
    Column(String),
    /// Concatenated key column exposed under an alias
    Concat {
        columns: Vec<String>,
        separator: String,
        alias: String,
    },
    Raw(String),
}

impl SelectItem {
    pub fn to_sql(&self) -> String {
        match self {
            SelectItem::Column(column) => column.clone(),
            SelectItem::Concat {
                columns,
                separator,
                alias,
            } => format!("{} AS {}", concat_ws_sql(columns, separator), alias),
            SelectItem::Raw(expression) => expression.clone(),
        }
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Named query scope applied when the query is executed
#[derive(Clone)]
pub struct Scope {
    pub name: String,
    pub(crate) apply: Arc<dyn Fn(QueryBuilder) -> QueryBuilder + Send + Sync>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("name", &self.name).finish()
    }
}

fn concat_ws_sql(columns: &[String], separator: &str) -> String {
    format!(
        "CONCAT_WS('{}', {})",
        separator.replace('\'', "''"),
        columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_select_sql() {
        let item = SelectItem::Concat {
            columns: vec!["user_id".to_string(), "tenant".to_string()],
            separator: ",".to_string(),
            alias: "__custom_relation_key".to_string(),
        };
        assert_eq!(
            item.to_sql(),
            "CONCAT_WS(',', user_id, tenant) AS __custom_relation_key"
        );
    }

    #[test]
    fn test_concat_separator_is_escaped() {
        let operand = Operand::Concat {
            columns: vec!["a".to_string()],
            separator: "'".to_string(),
        };
        assert_eq!(operand.to_sql(), "CONCAT_WS('''', a)");
    }
}
