//! Custom Relation - A relation whose constraints are supplied by the caller
//!
//! The relation holds the related query and the parent record it was
//! created from. Two callbacks narrow the query: the base constraints for
//! the single-parent (lazy) path and the eager constraints for a batch of
//! parents. The join key decides how fetched results are distributed back
//! onto parents by the [`MatchingEngine`].
//!
//! Everything except the query and the parent lives in an immutable
//! [`RelationConfig`] shared through an `Arc`, so one definition can serve
//! many batches concurrently.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::join_key::{JoinKey, KeyPlan};
use super::matcher::{MatchStats, MatchingEngine};
use crate::config::RelationSettings;
use crate::error::{RelationError, RelationResult};
use crate::executor::QueryExecutor;
use crate::logging::LOG_TARGET;
use crate::query::QueryBuilder;
use crate::record::{Collection, Record, RelationValue, DEFAULT_KEY_NAME};

/// Narrows the query for a single parent
pub type BaseConstraintFn = Arc<dyn Fn(&mut CustomRelation) -> RelationResult<()> + Send + Sync>;

/// Narrows the query for a batch of parents
pub type EagerConstraintFn = Arc<dyn Fn(&mut CustomRelation, &[Record]) -> RelationResult<()> + Send + Sync>;

/// Immutable part of a relation definition
pub struct RelationConfig {
    base_constraints: BaseConstraintFn,
    eager_constraints: EagerConstraintFn,
    join_key: JoinKey,
    key_plan: KeyPlan,
    plural: bool,
    related_key_name: String,
    settings: RelationSettings,
}

impl RelationConfig {
    pub fn join_key(&self) -> &JoinKey {
        &self.join_key
    }

    pub fn key_plan(&self) -> &KeyPlan {
        &self.key_plan
    }

    pub fn is_plural(&self) -> bool {
        self.plural
    }

    pub fn related_key_name(&self) -> &str {
        &self.related_key_name
    }

    pub fn settings(&self) -> &RelationSettings {
        &self.settings
    }
}

impl fmt::Debug for RelationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationConfig")
            .field("join_key", &self.join_key)
            .field("key_plan", &self.key_plan)
            .field("plural", &self.plural)
            .field("related_key_name", &self.related_key_name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// A configured custom relation
#[derive(Debug, Clone)]
pub struct CustomRelation {
    query: QueryBuilder,
    parent: Record,
    config: Arc<RelationConfig>,
    base_applied: bool,
}

impl CustomRelation {
    /// Create a relation from its query, parent, constraints and join key
    pub fn new<B, E, K>(
        query: QueryBuilder,
        parent: Record,
        base_constraints: B,
        eager_constraints: E,
        join_key: K,
        plural: bool,
    ) -> RelationResult<Self>
    where
        B: Fn(&mut CustomRelation) -> RelationResult<()> + Send + Sync + 'static,
        E: Fn(&mut CustomRelation, &[Record]) -> RelationResult<()> + Send + Sync + 'static,
        K: Into<JoinKey>,
    {
        Self::builder()
            .query(query)
            .parent(parent)
            .base_constraints(base_constraints)
            .eager_constraints(eager_constraints)
            .join_key(join_key)
            .plural(plural)
            .build()
    }

    pub fn builder() -> CustomRelationBuilder {
        CustomRelationBuilder::default()
    }

    /// Create another relation sharing an existing definition
    pub fn with_config(query: QueryBuilder, parent: Record, config: Arc<RelationConfig>) -> RelationResult<Self> {
        if query.from_table().is_none() {
            return Err(RelationError::configuration("Custom relation query has no table"));
        }
        Ok(Self {
            query,
            parent,
            config,
            base_applied: false,
        })
    }

    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut QueryBuilder {
        &mut self.query
    }

    /// Replace the held query through a by-value builder chain
    pub fn modify_query<F>(&mut self, f: F)
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let query = std::mem::take(&mut self.query);
        self.query = f(query);
    }

    pub fn parent(&self) -> &Record {
        &self.parent
    }

    pub fn config(&self) -> &Arc<RelationConfig> {
        &self.config
    }

    pub fn is_plural(&self) -> bool {
        self.config.plural
    }

    pub fn key_plan(&self) -> &KeyPlan {
        &self.config.key_plan
    }

    pub fn settings(&self) -> &RelationSettings {
        &self.config.settings
    }

    /// Table of the related records
    pub fn related_table(&self) -> &str {
        self.query.from_table().unwrap_or_default()
    }

    /// Run the base constraints against this relation.
    ///
    /// Meant to run once per relation; a second call adds the predicates
    /// again.
    pub fn apply_base_constraints(&mut self) -> RelationResult<()> {
        let config = Arc::clone(&self.config);
        (config.base_constraints)(self)?;
        self.base_applied = true;
        debug!(
            target: LOG_TARGET,
            table = self.related_table(),
            "Applied base constraints"
        );
        Ok(())
    }

    /// Run the eager constraints for one batch of parents
    pub fn apply_eager_constraints(&mut self, parents: &[Record]) -> RelationResult<()> {
        let config = Arc::clone(&self.config);
        (config.eager_constraints)(self, parents)?;
        debug!(
            target: LOG_TARGET,
            table = self.related_table(),
            parents = parents.len(),
            "Applied eager constraints"
        );
        Ok(())
    }

    /// Give every parent a defined, empty value under `relation`
    pub fn initialize_empty(&self, parents: &mut [Record], relation: &str) {
        for parent in parents.iter_mut() {
            parent.set_relation(relation, MatchingEngine::empty_value(self.config.plural));
        }
    }

    /// Distribute `results` across `parents` and return the parents
    pub fn match_results(
        &self,
        mut parents: Vec<Record>,
        results: Vec<Record>,
        relation: &str,
    ) -> RelationResult<Vec<Record>> {
        if parents.is_empty() {
            return Ok(parents);
        }
        self.match_in_place(&mut parents, results, relation)?;
        Ok(parents)
    }

    /// Distribute `results` across `parents` without moving them.
    ///
    /// On error no parent has been modified.
    pub fn match_in_place(
        &self,
        parents: &mut [Record],
        results: Vec<Record>,
        relation: &str,
    ) -> RelationResult<MatchStats> {
        MatchingEngine::new(&self.config.key_plan, &self.config.settings).match_records(
            parents,
            results,
            relation,
            self.config.plural,
        )
    }

    /// Lazy path: constrain to the held parent, run the query and shape
    /// the rows by plurality
    pub async fn get_results<E>(&mut self, executor: &E) -> RelationResult<RelationValue>
    where
        E: QueryExecutor + ?Sized,
    {
        if !self.base_applied {
            self.apply_base_constraints()?;
        }

        let records = self.fetch_rows(executor, &["*"]).await?;
        Ok(if self.config.plural {
            RelationValue::Many(Collection::new(records))
        } else {
            RelationValue::One(records.into_iter().next().map(Box::new))
        })
    }

    /// Execute the held query.
    ///
    /// Columns already selected on the query win over `columns`; `["*"]`
    /// selects every column of the related table. Composite keys add the
    /// concatenated key column. Rows come back tagged with the related key
    /// name, with nested relations loaded by the executor.
    pub async fn fetch_rows<E>(&self, executor: &E, columns: &[&str]) -> RelationResult<Vec<Record>>
    where
        E: QueryExecutor + ?Sized,
    {
        let table = self.related_table().to_string();
        let mut query = executor.apply_scopes(self.query.clone());

        if !query.has_select() {
            let columns: Vec<String> = if columns.is_empty() || columns == ["*"] {
                vec![format!("{}.*", table)]
            } else {
                columns.iter().map(|c| c.to_string()).collect()
            };
            query = query.add_select(&columns);
        }

        let settings = &self.config.settings;
        if let Some(fields) = self.config.key_plan.synthetic_columns() {
            query = query.select_concat(fields, &settings.key_separator, &settings.synthetic_column);
        }

        let records = executor.execute_select(&query).await?;
        debug!(target: LOG_TARGET, table = %table, rows = records.len(), "Fetched relation rows");

        let records: Vec<Record> = records
            .into_iter()
            .map(|record| record.with_key_name(&self.config.related_key_name))
            .collect();

        if records.is_empty() {
            return Ok(records);
        }
        executor.eager_load_relations(records).await
    }

    /// Restrict the query to results of the held parent
    pub fn constrain_to_parent(&mut self) -> RelationResult<()> {
        let parent = std::slice::from_ref(&self.parent);
        let query = self
            .config
            .key_plan
            .constrain(self.query.clone(), parent, &self.config.settings)?;
        self.query = query;
        Ok(())
    }

    /// Restrict the query to results of any parent in the batch
    pub fn constrain_to_parents(&mut self, parents: &[Record]) -> RelationResult<()> {
        let query = self
            .config
            .key_plan
            .constrain(self.query.clone(), parents, &self.config.settings)?;
        self.query = query;
        Ok(())
    }

    /// Distinct join keys of `parents`, in first-seen order
    pub fn parent_keys(&self, parents: &[Record]) -> RelationResult<Vec<String>> {
        self.config
            .key_plan
            .parent_keys(parents, &self.config.settings.key_separator)
    }
}

/// Builder for [`CustomRelation`]
#[derive(Default)]
pub struct CustomRelationBuilder {
    query: Option<QueryBuilder>,
    parent: Option<Record>,
    base_constraints: Option<BaseConstraintFn>,
    eager_constraints: Option<EagerConstraintFn>,
    join_key: Option<JoinKey>,
    plural: Option<bool>,
    settings: Option<RelationSettings>,
    related_key_name: Option<String>,
    eager_parent_relations: Option<Vec<String>>,
}

impl CustomRelationBuilder {
    pub fn query(mut self, query: QueryBuilder) -> Self {
        self.query = Some(query);
        self
    }

    pub fn parent(mut self, parent: Record) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Defaults to [`CustomRelation::constrain_to_parent`]
    pub fn base_constraints<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CustomRelation) -> RelationResult<()> + Send + Sync + 'static,
    {
        self.base_constraints = Some(Arc::new(f));
        self
    }

    /// Defaults to [`CustomRelation::constrain_to_parents`]
    pub fn eager_constraints<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CustomRelation, &[Record]) -> RelationResult<()> + Send + Sync + 'static,
    {
        self.eager_constraints = Some(Arc::new(f));
        self
    }

    /// Defaults to [`JoinKey::identity`] on the parent's key name
    pub fn join_key<K: Into<JoinKey>>(mut self, key: K) -> Self {
        self.join_key = Some(key.into());
        self
    }

    pub fn plural(mut self, plural: bool) -> Self {
        self.plural = Some(plural);
        self
    }

    pub fn singular(self) -> Self {
        self.plural(false)
    }

    pub fn settings(mut self, settings: RelationSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Primary key name given to fetched results
    pub fn related_key_name(mut self, name: &str) -> Self {
        self.related_key_name = Some(name.to_string());
        self
    }

    /// Relations recorded on the parent as requested eager loads
    pub fn eager_parent_relations(mut self, relations: Vec<String>) -> Self {
        self.eager_parent_relations = Some(relations);
        self
    }

    pub fn build(self) -> RelationResult<CustomRelation> {
        let query = self
            .query
            .ok_or_else(|| RelationError::configuration("Custom relation requires a query"))?;
        let mut parent = self
            .parent
            .ok_or_else(|| RelationError::configuration("Custom relation requires a parent record"))?;

        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        let join_key = self.join_key.unwrap_or_else(|| JoinKey::identity(None));
        let key_plan = join_key.resolve(parent.key_name(), &settings)?;

        if let Some(relations) = self.eager_parent_relations {
            parent.set_eager_loads(relations);
        }

        let base_constraints: BaseConstraintFn = match self.base_constraints {
            Some(f) => f,
            None => Arc::new(|relation: &mut CustomRelation| relation.constrain_to_parent()),
        };
        let eager_constraints: EagerConstraintFn = match self.eager_constraints {
            Some(f) => f,
            None => Arc::new(|relation: &mut CustomRelation, parents: &[Record]| {
                relation.constrain_to_parents(parents)
            }),
        };

        let config = RelationConfig {
            base_constraints,
            eager_constraints,
            join_key,
            key_plan,
            plural: self.plural.unwrap_or(true),
            related_key_name: self
                .related_key_name
                .unwrap_or_else(|| DEFAULT_KEY_NAME.to_string()),
            settings,
        };

        CustomRelation::with_config(query, parent, Arc::new(config))
    }
}
