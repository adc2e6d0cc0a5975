//! Error types for custom relations
//!
//! Covers relation configuration, join-key computation during matching,
//! and failures surfaced by the query executor.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for relation operations
pub type RelationResult<T> = Result<T, RelationError>;

/// Error types for custom relation operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RelationError {
    /// The relation was built without a usable query, parent record or join key
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A configured join-key field is absent from a parent or result record
    #[error("Missing field '{field}' on {context}")]
    MissingField { field: String, context: String },

    /// Query building or evaluation failed
    #[error("Query error: {0}")]
    Query(String),

    /// The database rejected or failed the query
    #[error("Database error: {0}")]
    Database(String),

    /// A record could not be converted to or from a typed model
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RelationError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        RelationError::Configuration(msg.into())
    }

    pub fn missing_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        RelationError::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Whether the error was raised while computing a join key
    pub fn is_missing_field(&self) -> bool {
        matches!(self, RelationError::MissingField { .. })
    }
}

impl From<sqlx::Error> for RelationError {
    fn from(err: sqlx::Error) -> Self {
        RelationError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RelationError {
    fn from(err: serde_json::Error) -> Self {
        RelationError::Serialization(err.to_string())
    }
}

impl From<ConfigError> for RelationError {
    fn from(err: ConfigError) -> Self {
        RelationError::Configuration(err.to_string())
    }
}
