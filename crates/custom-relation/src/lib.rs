//! # elif-custom-relation: Caller-defined relations for elif.rs
//!
//! A relation whose query constraints are supplied as callbacks, plus the
//! matching engine that distributes one batch of results across a batch
//! of parents in linear time. Join keys may be a single field, an ordered
//! list of fields concatenated by the query, or a precomputed column.
//!
//! ```ignore
//! let relation = user.custom::<Post, _, _, _>(
//!     |relation| relation.constrain_to_parent(),
//!     |relation, parents| relation.constrain_to_parents(parents),
//!     JoinKey::composite(["id", "tenant"], ["user_id", "tenant"]),
//! )?;
//! let users = load_eager(&relation, users, "posts", &executor).await?;
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod query;
pub mod record;
pub mod relations;

pub use backends::{MemoryExecutor, PostgresExecutor};
pub use config::{ConfigError, ConfigSource, KeyFormat, RelationSettings};
pub use error::{RelationError, RelationResult};
pub use executor::QueryExecutor;
pub use logging::{init_logging, LoggingConfig};
pub use query::QueryBuilder;
pub use record::{new_collection, Collection, Record, RelationValue};
pub use relations::*;
