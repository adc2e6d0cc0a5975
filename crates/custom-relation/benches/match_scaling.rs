//! Matching Scaling Benchmark
//!
//! Matches growing batches of parents and results; time should grow
//! linearly with batch size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use elif_custom_relation::{CustomRelation, JoinKey, QueryBuilder, Record};
use serde_json::json;

fn relation(key: JoinKey) -> CustomRelation {
    CustomRelation::builder()
        .query(QueryBuilder::table("posts"))
        .parent(Record::new("users"))
        .join_key(key)
        .build()
        .expect("valid relation")
}

fn batch(size: usize) -> (Vec<Record>, Vec<Record>) {
    let parents = (0..size)
        .map(|id| Record::new("users").with_attribute("id", id).with_attribute("tenant", "x"))
        .collect();
    let results = (0..size)
        .map(|i| {
            let owner = i % (size / 2).max(1);
            Record::new("posts")
                .with_attribute("user_id", owner)
                .with_attribute("__custom_relation_key", format!("{},x", owner))
                .with_attribute("body", json!({"n": i}))
        })
        .collect();
    (parents, results)
}

fn bench_match_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_scaling");

    let simple = relation(JoinKey::composite("id", "user_id"));
    let composite = relation(JoinKey::composite(["id", "tenant"], ["user_id", "tenant"]));

    for size in [1_000usize, 10_000, 50_000] {
        let (parents, results) = batch(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("simple_key", size), &size, |b, _| {
            b.iter(|| {
                let matched = simple
                    .match_results(parents.clone(), results.clone(), "posts")
                    .expect("match");
                black_box(matched)
            })
        });

        group.bench_with_input(BenchmarkId::new("composite_key", size), &size, |b, _| {
            b.iter(|| {
                let matched = composite
                    .match_results(parents.clone(), results.clone(), "posts")
                    .expect("match");
                black_box(matched)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_match_scaling);
criterion_main!(benches);
