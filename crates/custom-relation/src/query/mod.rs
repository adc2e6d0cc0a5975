//! Query Builder Module - Fluent SELECT builder held by relations

pub mod builder;
pub mod ordering;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use types::{Operand, OrderDirection, QueryOperator, Scope, SelectItem, WhereClause, WhereCondition};
