use elif_custom_relation::{
    CustomRelation, JoinKey, KeyFormat, QueryBuilder, Record, RelationError, RelationSettings, RelationValue,
};
use serde_json::{json, Value};

fn record(table: &str, attrs: Value) -> Record {
    Record::from_json(table, attrs).unwrap()
}

fn parents(ids: &[i64]) -> Vec<Record> {
    ids.iter().map(|id| record("parents", json!({"id": id}))).collect()
}

fn scenario_results() -> Vec<Record> {
    vec![
        record("results", json!({"relation_key": 1, "val": "a"})),
        record("results", json!({"relation_key": 1, "val": "b"})),
        record("results", json!({"relation_key": 3, "val": "c"})),
    ]
}

fn relation(key: JoinKey, plural: bool) -> CustomRelation {
    relation_with(key, plural, RelationSettings::default())
}

fn relation_with(key: JoinKey, plural: bool, settings: RelationSettings) -> CustomRelation {
    CustomRelation::builder()
        .query(QueryBuilder::table("results"))
        .parent(record("parents", json!({"id": 0})))
        .join_key(key)
        .plural(plural)
        .settings(settings)
        .build()
        .unwrap()
}

fn vals(parent: &Record, name: &str) -> Vec<Value> {
    parent
        .relation(name)
        .and_then(RelationValue::as_many)
        .map(|collection| collection.pluck("val"))
        .unwrap()
}

fn single_val(parent: &Record, name: &str) -> Option<Value> {
    match parent.relation(name) {
        Some(RelationValue::One(record)) => record.as_ref().and_then(|r| r.get_field("val").cloned()),
        other => panic!("expected a singular relation value, got {:?}", other),
    }
}

#[test]
fn test_plural_scenario() {
    let relation = relation(JoinKey::composite("id", "relation_key"), true);

    let mut batch = parents(&[1, 2, 3]);
    relation.initialize_empty(&mut batch, "items");
    let batch = relation.match_results(batch, scenario_results(), "items").unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(vals(&batch[0], "items"), vec![json!("a"), json!("b")]);
    assert_eq!(vals(&batch[1], "items"), Vec::<Value>::new());
    assert_eq!(vals(&batch[2], "items"), vec![json!("c")]);
}

#[test]
fn test_singular_scenario() {
    let relation = relation(JoinKey::composite("id", "relation_key"), false);

    let mut batch = parents(&[1, 2, 3]);
    relation.initialize_empty(&mut batch, "item");
    let batch = relation.match_results(batch, scenario_results(), "item").unwrap();

    assert_eq!(single_val(&batch[0], "item"), Some(json!("a")));
    assert_eq!(single_val(&batch[1], "item"), None);
    assert_eq!(single_val(&batch[2], "item"), Some(json!("c")));
}

#[test]
fn test_unmatched_parents_get_defined_value_without_initialization() {
    let plural = relation(JoinKey::composite("id", "relation_key"), true);
    let batch = plural.match_results(parents(&[2, 4]), scenario_results(), "items").unwrap();
    assert!(batch.iter().all(|p| p.relation("items") == Some(&RelationValue::empty_many())));

    let singular = relation(JoinKey::composite("id", "relation_key"), false);
    let batch = singular.match_results(parents(&[2, 4]), scenario_results(), "item").unwrap();
    assert!(batch.iter().all(|p| p.relation("item") == Some(&RelationValue::none())));
}

#[test]
fn test_empty_results_leave_every_parent_empty() {
    let relation = relation(JoinKey::composite("id", "relation_key"), true);

    let mut batch = parents(&[1, 2, 3]);
    relation.initialize_empty(&mut batch, "items");
    let batch = relation.match_results(batch, Vec::new(), "items").unwrap();

    assert_eq!(batch.len(), 3);
    for parent in &batch {
        assert!(parent.relation("items").unwrap().is_empty());
    }
}

#[test]
fn test_empty_parent_batch_is_a_no_op() {
    let relation = relation(JoinKey::composite("id", "relation_key"), true);
    let batch = relation.match_results(Vec::new(), scenario_results(), "items").unwrap();
    assert!(batch.is_empty());
}

#[test]
fn test_composite_key_matches_exact_concatenation() {
    let relation = relation(JoinKey::matching(["a", "b"]), true);

    let batch = vec![record("parents", json!({"a": 1, "b": "x"}))];
    let results = vec![
        record("results", json!({"__custom_relation_key": "1,x", "val": "hit"})),
        record("results", json!({"__custom_relation_key": "1,y", "val": "miss"})),
    ];

    let batch = relation.match_results(batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("hit")]);
}

#[test]
fn test_match_is_idempotent() {
    let relation = relation(JoinKey::composite("id", "relation_key"), true);

    let first = relation
        .match_results(parents(&[1, 2, 3]), scenario_results(), "items")
        .unwrap();
    let second = relation
        .match_results(parents(&[1, 2, 3]), scenario_results(), "items")
        .unwrap();
    assert_eq!(first, second);

    // Matching again onto already populated parents assigns the same values
    let again = relation.match_results(first.clone(), scenario_results(), "items").unwrap();
    assert_eq!(again, first);
}

#[test]
fn test_duplicate_parent_keys_each_receive_the_bucket() {
    let relation = relation(JoinKey::composite("id", "relation_key"), true);

    let batch = relation
        .match_results(parents(&[1, 1, 3]), scenario_results(), "items")
        .unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("a"), json!("b")]);
    assert_eq!(vals(&batch[1], "items"), vec![json!("a"), json!("b")]);
    assert_eq!(vals(&batch[2], "items"), vec![json!("c")]);
}

#[test]
fn test_integer_and_string_keys_collide() {
    let relation = relation(JoinKey::matching("code"), true);

    let batch = vec![
        record("parents", json!({"id": 1, "code": 1})),
        record("parents", json!({"id": 2, "code": "1"})),
    ];
    let results = vec![record("results", json!({"code": 1, "val": "shared"}))];

    let batch = relation.match_results(batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("shared")]);
    assert_eq!(vals(&batch[1], "items"), vec![json!("shared")]);
}

#[test]
fn test_typed_keys_keep_integer_and_string_apart() {
    let settings = RelationSettings::default().with_key_format(KeyFormat::Typed);
    let relation = relation_with(JoinKey::matching("code"), true, settings);

    let batch = vec![
        record("parents", json!({"id": 1, "code": 1})),
        record("parents", json!({"id": 2, "code": "1"})),
    ];
    let results = vec![record("results", json!({"code": 1, "val": "int"}))];

    let batch = relation.match_results(batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("int")]);
    assert!(vals(&batch[1], "items").is_empty());
}

#[test]
fn test_typed_composite_keys_are_computed_from_result_fields() {
    let settings = RelationSettings::default().with_key_format(KeyFormat::Typed);
    let relation = relation_with(JoinKey::composite(["id", "tenant"], ["user_id", "tenant"]), true, settings);

    let batch = vec![record("parents", json!({"id": 1, "tenant": "x"}))];
    let results = vec![
        record("results", json!({"user_id": 1, "tenant": "x", "val": "hit"})),
        record("results", json!({"user_id": "1", "tenant": "x", "val": "miss"})),
    ];

    let batch = relation.match_results(batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("hit")]);
}

#[test]
fn test_missing_parent_field_fails_the_whole_batch() {
    let relation = relation(JoinKey::composite("id", "relation_key"), true);

    let mut batch = parents(&[1, 3]);
    batch.push(record("parents", json!({"uuid": "x"})));
    relation.initialize_empty(&mut batch, "items");
    let before = batch.clone();

    let err = relation
        .match_in_place(&mut batch, scenario_results(), "items")
        .unwrap_err();
    assert!(err.is_missing_field());
    assert_eq!(err, RelationError::missing_field("id", "parent record in table 'parents'"));
    assert_eq!(batch, before);
}

#[test]
fn test_missing_result_field_fails_the_whole_batch() {
    let relation = relation(JoinKey::composite("id", "relation_key"), true);

    let mut batch = parents(&[1, 3]);
    let before = batch.clone();
    let mut results = scenario_results();
    results.push(record("results", json!({"val": "keyless"})));

    let err = relation.match_in_place(&mut batch, results, "items").unwrap_err();
    assert_eq!(
        err,
        RelationError::missing_field("relation_key", "result record in table 'results'")
    );
    assert_eq!(batch, before);
}

#[test]
fn test_identity_key_reads_local_key_on_results() {
    let relation = relation(JoinKey::identity(Some("relation_key")), true);
    let batch = relation
        .match_results(parents(&[1, 2, 3]), scenario_results(), "items")
        .unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("a"), json!("b")]);
    assert_eq!(vals(&batch[2], "items"), vec![json!("c")]);

    let relation = self::relation(JoinKey::identity(None), true);
    let results = vec![record("results", json!({"id": 2, "val": "same id"}))];
    let batch = relation.match_results(parents(&[1, 2]), results, "items").unwrap();
    assert!(vals(&batch[0], "items").is_empty());
    assert_eq!(vals(&batch[1], "items"), vec![json!("same id")]);
}

#[test]
fn test_computed_column_key() {
    let relation = relation(JoinKey::computed(["id", "kind"], "match_key"), true);

    let batch = vec![
        record("parents", json!({"id": 1, "kind": "post"})),
        record("parents", json!({"id": 1, "kind": "video"})),
    ];
    let results = vec![
        record("results", json!({"match_key": "1,video", "val": "v"})),
        record("results", json!({"match_key": "1,post", "val": "p"})),
    ];

    let batch = relation.match_results(batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("p")]);
    assert_eq!(vals(&batch[1], "items"), vec![json!("v")]);
}

#[test]
fn test_custom_separator() {
    let settings = RelationSettings::default().with_separator("|");
    let relation = relation_with(JoinKey::matching(["a", "b"]), true, settings);

    let batch = vec![record("parents", json!({"a": "1,2", "b": 3}))];
    let results = vec![record("results", json!({"__custom_relation_key": "1,2|3", "val": "piped"}))];

    let batch = relation.match_results(batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("piped")]);
}

#[test]
fn test_empty_string_key_field_is_kept_in_the_key() {
    let relation = relation(JoinKey::matching(["id", "tenant"]), true);

    let batch = vec![
        record("parents", json!({"id": 1, "tenant": ""})),
        record("parents", json!({"id": 1, "tenant": null})),
    ];
    let results = vec![
        record("results", json!({"__custom_relation_key": "1,", "val": "blank"})),
        record("results", json!({"__custom_relation_key": "1", "val": "null"})),
    ];

    let batch = relation.match_results(batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("blank")]);
    assert_eq!(vals(&batch[1], "items"), vec![json!("null")]);
}

#[test]
fn test_null_result_key_never_matches_empty_parent_key() {
    let relation = relation(JoinKey::composite("code", "relation_key"), true);

    let mut batch = vec![record("parents", json!({"id": 1, "code": ""}))];
    let results = vec![
        record("results", json!({"relation_key": null, "val": "unowned"})),
        record("results", json!({"relation_key": "", "val": "blank"})),
    ];

    let stats = relation.match_in_place(&mut batch, results, "items").unwrap();
    assert_eq!(vals(&batch[0], "items"), vec![json!("blank")]);
    assert_eq!(stats.results, 2);
    assert_eq!(stats.buckets, 1);
}

#[test]
fn test_large_batches_probe_each_parent_once() {
    const SIZE: i64 = 10_000;

    let relation = relation(JoinKey::composite("id", "relation_key"), true);

    let mut batch: Vec<Record> = (0..SIZE).map(|id| record("parents", json!({"id": id}))).collect();
    let results: Vec<Record> = (0..SIZE)
        .map(|i| record("results", json!({"relation_key": i % (SIZE / 2), "val": i})))
        .collect();

    let stats = relation.match_in_place(&mut batch, results, "items").unwrap();

    assert_eq!(stats.parents, SIZE as usize);
    assert_eq!(stats.results, SIZE as usize);
    assert_eq!(stats.buckets, (SIZE / 2) as usize);
    assert_eq!(stats.matched, (SIZE / 2) as usize);
    assert_eq!(stats.probes, SIZE as usize);
    assert_eq!(stats.orphaned, 0);

    assert_eq!(vals(&batch[0], "items"), vec![json!(0), json!(SIZE / 2)]);
    assert!(vals(&batch[(SIZE - 1) as usize], "items").is_empty());
}
