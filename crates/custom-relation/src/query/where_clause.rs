//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use serde_json::Value;

impl QueryBuilder {
    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(column, QueryOperator::Equal, Some(value.into()))
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(column, QueryOperator::NotEqual, Some(value.into()))
    }

    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(column, QueryOperator::GreaterThan, Some(value.into()))
    }

    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(column, QueryOperator::GreaterThanOrEqual, Some(value.into()))
    }

    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(column, QueryOperator::LessThan, Some(value.into()))
    }

    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(column, QueryOperator::LessThanOrEqual, Some(value.into()))
    }

    /// Add WHERE IN condition
    pub fn where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_clauses.push(WhereClause::Condition(WhereCondition {
            operand: Operand::Column(column.to_string()),
            operator: QueryOperator::In,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        }));
        self
    }

    /// Add WHERE NOT IN condition
    pub fn where_not_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_clauses.push(WhereClause::Condition(WhereCondition {
            operand: Operand::Column(column.to_string()),
            operator: QueryOperator::NotIn,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        }));
        self
    }

    /// Restrict rows to those whose separator-joined `columns` text is one of `keys`
    pub fn where_concat_in<S: AsRef<str>>(mut self, columns: &[S], separator: &str, keys: Vec<String>) -> Self {
        self.where_clauses.push(WhereClause::Condition(WhereCondition {
            operand: Operand::Concat {
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
                separator: separator.to_string(),
            },
            operator: QueryOperator::In,
            value: None,
            values: keys.into_iter().map(Value::String).collect(),
        }));
        self
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push_condition(column, QueryOperator::IsNull, None)
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push_condition(column, QueryOperator::IsNotNull, None)
    }

    /// Add raw WHERE condition
    pub fn where_raw(mut self, raw_condition: &str) -> Self {
        self.where_clauses.push(WhereClause::Raw(raw_condition.to_string()));
        self
    }

    fn push_condition(mut self, column: &str, operator: QueryOperator, value: Option<Value>) -> Self {
        self.where_clauses.push(WhereClause::Condition(WhereCondition {
            operand: Operand::Column(column.to_string()),
            operator,
            value,
            values: Vec::new(),
        }));
        self
    }
}
