//! Custom relations: definition, join keys and the matching engine

pub mod custom;
pub mod dictionary;
pub mod eager;
pub mod has_custom;
pub mod join_key;
pub mod matcher;

pub use custom::{BaseConstraintFn, CustomRelation, CustomRelationBuilder, EagerConstraintFn, RelationConfig};
pub use dictionary::Dictionary;
pub use eager::{load_eager, EagerLoader, RelationFactory};
pub use has_custom::{HasCustomRelations, RelatedEntity};
pub use join_key::{JoinKey, KeyPlan, KeySource, KeySpec};
pub use matcher::{MatchStats, MatchingEngine};
