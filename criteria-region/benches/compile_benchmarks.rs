//! OQL compilation and region query benchmarks

use criteria_core::{
    collect_entities, entity::to_value, Backend, Entity, Expression, Identity, Operation,
    Operator, Path, Query, Value,
};
use criteria_region::{
    compile_key_select, compile_select, extract_keys, MemoryRegion, Region, RegionBackend,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::executor::block_on;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Person {
    id: String,
    age: i32,
    city: String,
}

impl Entity for Person {
    fn identity() -> Option<Identity<Self>> {
        Some(Identity::new(Path::of("id"), |p| Value::from(p.id.as_str())))
    }
}

fn binary(operator: Operator, path: &str, value: impl Into<Value>) -> Expression {
    Expression::binary(
        operator,
        Expression::path(Path::parse(path)),
        Expression::constant(value).unwrap(),
    )
    .unwrap()
}

/// `(age >= 18 AND city = 'Lisbon') OR id IN SET(..)` style filter with
/// `width` key alternatives
fn filter(width: usize) -> Expression {
    let keys: Vec<Value> = (0..width).map(|i| Value::from(format!("p{i}"))).collect();
    Expression::or(vec![
        Expression::and(vec![
            binary(Operator::GreaterThanOrEqual, "age", 18),
            binary(Operator::Equal, "address.city", "Lisbon"),
        ])
        .unwrap(),
        binary(Operator::In, "id", keys),
    ])
    .unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for width in [1, 16, 256] {
        let query = Query::with_filter(filter(width)).desc(Path::of("age")).limit(50);

        group.bench_with_input(BenchmarkId::new("bind", width), &query, |b, query| {
            b.iter(|| compile_select("/people", black_box(query), true).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("literal", width), &query, |b, query| {
            b.iter(|| compile_select("/people", black_box(query), false).unwrap());
        });
    }

    let key_filter = filter(16);
    group.bench_function("key_select", |b| {
        b.iter(|| compile_key_select("/people", black_box(&key_filter), true).unwrap());
    });

    let keys_only = Expression::or(
        (0..64)
            .map(|i| binary(Operator::Equal, "id", format!("p{i}")))
            .collect(),
    )
    .unwrap();
    let identity = Path::of("id");
    group.bench_function("extract_keys", |b| {
        b.iter(|| extract_keys(black_box(&keys_only), &identity).unwrap());
    });

    group.finish();
}

fn bench_memory_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_select");

    let region = MemoryRegion::new("people");
    let entries = (0..10_000)
        .map(|i| {
            let person = Person {
                id: format!("p{i}"),
                age: (i % 90) as i32,
                city: if i % 3 == 0 { "Lisbon" } else { "Porto" }.to_string(),
            };
            (Value::from(person.id.as_str()), to_value(&person).unwrap())
        })
        .collect();
    region.put_all(entries).unwrap();
    let backend: RegionBackend<Person> = RegionBackend::new(Arc::new(region.clone()));

    let adults = Query::with_filter(binary(Operator::GreaterThanOrEqual, "age", 18));
    group.bench_function("filter_scan", |b| {
        b.iter(|| {
            let stream = backend.execute(Operation::select(black_box(adults.clone())));
            block_on(collect_entities(stream)).unwrap()
        });
    });

    let sorted = Query::new().desc(Path::of("age")).limit(100);
    group.bench_function("sorted_page", |b| {
        b.iter(|| {
            let stream = backend.execute(Operation::select(black_box(sorted.clone())));
            block_on(collect_entities(stream)).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_memory_select);
criterion_main!(benches);
