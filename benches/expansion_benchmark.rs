use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use query_fn::expansion::{Slot, expand_named, expand_positional};
use query_fn::prelude::*;

const POSITIONAL_SQL: &str = "select id, name from items /* ids in (?) */
    where kind = ? and id in (?) and note <> 'what?'
    order by id -- ?";

const NAMED_SQL: &str = "select id, name from items /* :ids */
    where kind = :kind and id in (:ids) and note <> ':ids'
    order by id -- :ids";

fn positional_slots(n: i64) -> Vec<Slot<i64>> {
    vec![Slot::Single(0), Slot::Expand((0..n).collect())]
}

fn named_slots(n: i64) -> Vec<(String, Slot<i64>)> {
    vec![
        ("kind".to_string(), Slot::Single(0)),
        ("ids".to_string(), Slot::Expand((0..n).collect())),
    ]
}

fn bench_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("expansion");
    for n in [0_i64, 1, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("positional", n), &n, |b, &n| {
            b.iter(|| {
                let out = expand_positional(black_box(POSITIONAL_SQL), positional_slots(n));
                black_box(out)
            });
        });
        group.bench_with_input(BenchmarkId::new("named", n), &n, |b, &n| {
            b.iter(|| black_box(expand_named(black_box(NAMED_SQL), named_slots(n))));
        });
    }
    group.finish();
}

fn bench_fetch_by_ids(c: &mut Criterion) {
    let Ok(conn) = SqliteOptions::in_memory().open() else {
        return;
    };
    let mut seed = String::from("create table items(id integer primary key, name text);");
    for i in 0..2000 {
        seed.push_str(&format!("insert into items(name) values ('item-{i}');"));
    }
    if conn.execute_batch(&seed).is_err() {
        return;
    }

    let by_ids: FetchScalars<String> = FetchScalars::new(
        QueryFn::new("by_ids", |_| Ok(CallResult::AutoNamed))
            .sql("select name from items where id in (:ids) order by id")
            .param("ids"),
    );

    let mut group = c.benchmark_group("fetch_by_ids");
    for n in [1_i64, 50, 500] {
        let ids: Vec<i64> = (1..=n).map(|i| i * 3).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            b.iter(|| {
                let names = by_ids.call(&conn, CallArgs::new().arg(ids.clone()));
                black_box(names)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_expansion, bench_fetch_by_ids);
criterion_main!(benches);
