//! Declaring custom relations from a parent record

use super::custom::{CustomRelation, CustomRelationBuilder};
use super::join_key::JoinKey;
use crate::error::RelationResult;
use crate::query::QueryBuilder;
use crate::record::{Record, DEFAULT_KEY_NAME};

/// An entity a custom relation can point at
pub trait RelatedEntity {
    fn table_name() -> &'static str;

    fn primary_key_name() -> &'static str {
        DEFAULT_KEY_NAME
    }

    /// Fresh query over the entity's table
    fn new_query() -> QueryBuilder {
        QueryBuilder::table(Self::table_name())
    }
}

/// Records that can declare custom relations
pub trait HasCustomRelations {
    /// Builder preloaded with `R`'s query and this record as the parent
    fn custom_relation<R: RelatedEntity>(&self) -> CustomRelationBuilder;

    /// Plural custom relation to `R`
    fn custom<R, B, E, K>(&self, base_constraints: B, eager_constraints: E, join_key: K) -> RelationResult<CustomRelation>
    where
        R: RelatedEntity,
        B: Fn(&mut CustomRelation) -> RelationResult<()> + Send + Sync + 'static,
        E: Fn(&mut CustomRelation, &[Record]) -> RelationResult<()> + Send + Sync + 'static,
        K: Into<JoinKey>,
    {
        self.custom_relation::<R>()
            .base_constraints(base_constraints)
            .eager_constraints(eager_constraints)
            .join_key(join_key)
            .build()
    }

    /// Singular custom relation to `R`
    fn custom_one<R, B, E, K>(&self, base_constraints: B, eager_constraints: E, join_key: K) -> RelationResult<CustomRelation>
    where
        R: RelatedEntity,
        B: Fn(&mut CustomRelation) -> RelationResult<()> + Send + Sync + 'static,
        E: Fn(&mut CustomRelation, &[Record]) -> RelationResult<()> + Send + Sync + 'static,
        K: Into<JoinKey>,
    {
        self.custom_relation::<R>()
            .base_constraints(base_constraints)
            .eager_constraints(eager_constraints)
            .join_key(join_key)
            .singular()
            .build()
    }
}

impl HasCustomRelations for Record {
    fn custom_relation<R: RelatedEntity>(&self) -> CustomRelationBuilder {
        CustomRelation::builder()
            .query(R::new_query())
            .parent(self.clone())
            .related_key_name(R::primary_key_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Post;

    impl RelatedEntity for Post {
        fn table_name() -> &'static str {
            "posts"
        }

        fn primary_key_name() -> &'static str {
            "post_id"
        }
    }

    #[test]
    fn test_custom_uses_related_table_and_key() {
        let user = Record::from_json("users", json!({"id": 1})).unwrap();
        let relation = user
            .custom::<Post, _, _, _>(
                |relation: &mut CustomRelation| relation.constrain_to_parent(),
                |relation: &mut CustomRelation, parents: &[Record]| relation.constrain_to_parents(parents),
                JoinKey::composite("id", "user_id"),
            )
            .unwrap();

        assert_eq!(relation.related_table(), "posts");
        assert_eq!(relation.config().related_key_name(), "post_id");
        assert!(relation.is_plural());
        assert_eq!(relation.parent(), &user);
    }

    #[test]
    fn test_custom_one_is_singular() {
        let user = Record::from_json("users", json!({"id": 1})).unwrap();
        let relation = user
            .custom_one::<Post, _, _, _>(|_: &mut CustomRelation| Ok(()), |_: &mut CustomRelation, _: &[Record]| Ok(()), "id")
            .unwrap();
        assert!(!relation.is_plural());
    }
}
