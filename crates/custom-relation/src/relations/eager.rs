//! Eager loading - One query per relation per batch of parents

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::custom::CustomRelation;
use crate::error::RelationResult;
use crate::executor::QueryExecutor;
use crate::logging::LOG_TARGET;
use crate::record::Record;

/// Load `relation` onto every parent of the batch.
///
/// Runs the eager constraints, gives each parent an empty value, fetches
/// the results with a single query and matches them. An empty batch runs
/// no query. Constraints land on a copy of `relation`, so one relation can
/// serve any number of batches.
pub async fn load_eager<E>(
    relation: &CustomRelation,
    mut parents: Vec<Record>,
    relation_name: &str,
    executor: &E,
) -> RelationResult<Vec<Record>>
where
    E: QueryExecutor + ?Sized,
{
    if parents.is_empty() {
        return Ok(parents);
    }

    let mut relation = relation.clone();
    relation.apply_eager_constraints(&parents)?;
    relation.initialize_empty(&mut parents, relation_name);

    let results = relation.fetch_rows(executor, &["*"]).await?;
    relation.match_results(parents, results, relation_name)
}

/// Builds the relation for a batch from its first parent
pub type RelationFactory = Arc<dyn Fn(&Record) -> RelationResult<CustomRelation> + Send + Sync>;

/// Named custom relations that can be eager loaded onto batches
#[derive(Clone, Default)]
pub struct EagerLoader {
    relations: Vec<(String, RelationFactory)>,
}

impl EagerLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation under `name`
    pub fn with<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Record) -> RelationResult<CustomRelation> + Send + Sync + 'static,
    {
        self.relations.push((name.to_string(), Arc::new(factory)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.relations.iter().map(|(name, _)| name.as_str())
    }

    /// Load every registered relation, in registration order
    pub async fn load<E>(&self, parents: Vec<Record>, executor: &E) -> RelationResult<Vec<Record>>
    where
        E: QueryExecutor + ?Sized,
    {
        let names: Vec<String> = self.names().map(str::to_string).collect();
        self.load_only(parents, &names, executor).await
    }

    /// Load the relations the first parent lists in its eager loads
    pub async fn load_requested<E>(&self, parents: Vec<Record>, executor: &E) -> RelationResult<Vec<Record>>
    where
        E: QueryExecutor + ?Sized,
    {
        let requested = match parents.first() {
            Some(parent) => parent.eager_loads().to_vec(),
            None => return Ok(parents),
        };
        self.load_only(parents, &requested, executor).await
    }

    async fn load_only<E>(&self, mut parents: Vec<Record>, names: &[String], executor: &E) -> RelationResult<Vec<Record>>
    where
        E: QueryExecutor + ?Sized,
    {
        for name in names {
            let Some(first) = parents.first() else {
                break;
            };
            let Some((_, factory)) = self.relations.iter().find(|(registered, _)| registered == name) else {
                debug!(target: LOG_TARGET, relation = %name, "Skipping unregistered eager load");
                continue;
            };

            let relation = factory(first)?;
            parents = load_eager(&relation, parents, name, executor).await?;
        }
        Ok(parents)
    }
}

impl fmt::Debug for EagerLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoader")
            .field("relations", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
