//! Matching Engine - Distributes one batch of results across its parents
//!
//! Matching is a hash join: results are grouped into a [`Dictionary`]
//! once, then every parent probes it exactly once. All keys on both sides
//! are computed before any parent is touched, so a missing key field
//! fails the whole batch and leaves every parent as it was.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::dictionary::Dictionary;
use super::join_key::KeyPlan;
use crate::config::RelationSettings;
use crate::error::RelationResult;
use crate::logging::LOG_TARGET;
use crate::record::{Collection, Record, RelationValue};

/// Counters describing one matching pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub parents: usize,
    pub results: usize,
    /// Distinct result keys
    pub buckets: usize,
    /// Parents that received at least one result
    pub matched: usize,
    /// Results whose key no parent carried
    pub orphaned: usize,
    /// Dictionary lookups performed
    pub probes: usize,
    pub elapsed: Duration,
}

/// Hash-join matcher bound to a resolved key plan
#[derive(Debug, Clone, Copy)]
pub struct MatchingEngine<'a> {
    plan: &'a KeyPlan,
    settings: &'a RelationSettings,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(plan: &'a KeyPlan, settings: &'a RelationSettings) -> Self {
        Self { plan, settings }
    }

    pub fn build_dictionary(&self, results: Vec<Record>) -> RelationResult<Dictionary> {
        Dictionary::build(results, |record| self.plan.result_key(record, self.settings))
    }

    /// Attach each parent's bucket under `relation`.
    ///
    /// Plural relations receive the whole bucket in result order, singular
    /// ones its first record. Parents without a bucket get an empty value
    /// unless their slot is already populated.
    pub fn match_records(
        &self,
        parents: &mut [Record],
        results: Vec<Record>,
        relation: &str,
        plural: bool,
    ) -> RelationResult<MatchStats> {
        let started = Instant::now();
        let result_count = results.len();

        let dictionary = self.build_dictionary(results)?;
        let parent_keys = parents
            .iter()
            .map(|parent| self.plan.parent_key(parent, &self.settings.key_separator))
            .collect::<RelationResult<Vec<String>>>()?;

        let mut matched = 0;
        let mut claimed: HashSet<&str> = HashSet::with_capacity(dictionary.len());

        for (parent, key) in parents.iter_mut().zip(parent_keys.iter()) {
            match dictionary.get(key) {
                Some(bucket) => {
                    matched += 1;
                    claimed.insert(key.as_str());
                    parent.set_relation(relation, Self::value_for(bucket, plural));
                }
                None if !parent.has_relation(relation) => {
                    parent.set_relation(relation, Self::empty_value(plural));
                }
                None => {}
            }
        }

        let orphaned: usize = dictionary
            .keys()
            .filter(|key| !claimed.contains(key))
            .inspect(|key| trace!(target: LOG_TARGET, relation, key = %key, "No parent for result key"))
            .count();

        let stats = MatchStats {
            parents: parents.len(),
            results: result_count,
            buckets: dictionary.len(),
            matched,
            orphaned,
            probes: dictionary.probes(),
            elapsed: started.elapsed(),
        };

        debug!(
            target: LOG_TARGET,
            relation,
            parents = stats.parents,
            results = stats.results,
            buckets = stats.buckets,
            matched = stats.matched,
            orphaned = stats.orphaned,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "Matched custom relation"
        );

        if stats.elapsed > Duration::from_millis(self.settings.slow_match_threshold_ms) {
            warn!(
                target: LOG_TARGET,
                relation,
                parents = stats.parents,
                results = stats.results,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                threshold_ms = self.settings.slow_match_threshold_ms,
                "Slow custom relation match"
            );
        }

        Ok(stats)
    }

    /// Value for a parent with no results
    pub fn empty_value(plural: bool) -> RelationValue {
        if plural {
            RelationValue::empty_many()
        } else {
            RelationValue::none()
        }
    }

    fn value_for(bucket: &[Record], plural: bool) -> RelationValue {
        if plural {
            RelationValue::Many(Collection::new(bucket.to_vec()))
        } else {
            RelationValue::One(bucket.first().cloned().map(Box::new))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::join_key::JoinKey;
    use serde_json::json;

    fn user(id: i64) -> Record {
        Record::from_json("users", json!({"id": id})).unwrap()
    }

    fn post(title: &str, user_id: i64) -> Record {
        Record::from_json("posts", json!({"title": title, "user_id": user_id})).unwrap()
    }

    fn titles(parent: &Record, relation: &str) -> Vec<String> {
        parent
            .relation(relation)
            .and_then(RelationValue::as_many)
            .map(|c| c.iter().map(|r| r.get_field("title").unwrap().as_str().unwrap().to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_plural_match_with_unmatched_parent() {
        let settings = RelationSettings::default();
        let plan = JoinKey::composite("id", "user_id").resolve("id", &settings).unwrap();
        let engine = MatchingEngine::new(&plan, &settings);

        let mut parents = vec![user(1), user(2), user(3)];
        let results = vec![post("a", 1), post("b", 1), post("c", 3)];
        let stats = engine.match_records(&mut parents, results, "posts", true).unwrap();

        assert_eq!(titles(&parents[0], "posts"), vec!["a", "b"]);
        assert!(parents[1].relation("posts").unwrap().is_empty());
        assert_eq!(titles(&parents[2], "posts"), vec!["c"]);
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.probes, 3);
        assert_eq!(stats.orphaned, 0);
    }

    #[test]
    fn test_singular_match_takes_first() {
        let settings = RelationSettings::default();
        let plan = JoinKey::composite("id", "user_id").resolve("id", &settings).unwrap();
        let engine = MatchingEngine::new(&plan, &settings);

        let mut parents = vec![user(1), user(2)];
        let results = vec![post("a", 1), post("b", 1)];
        engine.match_records(&mut parents, results, "post", false).unwrap();

        let first = parents[0].relation("post").and_then(RelationValue::as_one).unwrap();
        assert_eq!(first.get_field("title"), Some(&json!("a")));
        assert_eq!(parents[1].relation("post"), Some(&RelationValue::none()));
    }

    #[test]
    fn test_orphaned_results_are_counted() {
        let settings = RelationSettings::default();
        let plan = JoinKey::composite("id", "user_id").resolve("id", &settings).unwrap();
        let engine = MatchingEngine::new(&plan, &settings);

        let mut parents = vec![user(1)];
        let stats = engine
            .match_records(&mut parents, vec![post("a", 1), post("z", 9)], "posts", true)
            .unwrap();
        assert_eq!(stats.orphaned, 1);
        assert_eq!(stats.buckets, 2);
    }

    #[test]
    fn test_existing_slot_survives_when_unmatched() {
        let settings = RelationSettings::default();
        let plan = JoinKey::composite("id", "user_id").resolve("id", &settings).unwrap();
        let engine = MatchingEngine::new(&plan, &settings);

        let mut parents = vec![user(1)];
        let preset = RelationValue::Many(Collection::new(vec![post("kept", 1)]));
        parents[0].set_relation("posts", preset.clone());

        engine.match_records(&mut parents, vec![], "posts", true).unwrap();
        assert_eq!(parents[0].relation("posts"), Some(&preset));
    }
}
