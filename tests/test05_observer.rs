use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use query_fn::prelude::*;
use tokio::sync::mpsc;

fn counters_db() -> Result<rusqlite::Connection, QueryFnError> {
    let conn = SqliteOptions::in_memory().open()?;
    conn.execute_batch(
        "create table counters(name text primary key, hits integer not null);
         insert into counters values ('a', 1), ('b', 2), ('c', 3);",
    )?;
    Ok(conn)
}

fn hits_over(registry: &Arc<StatsRegistry>) -> FetchScalars<i64> {
    FetchScalars::new(
        QueryFn::new("hits_over", |args| {
            let min = args.value::<Option<i64>>("min")?;
            let Some(min) = min else {
                return cancel();
            };
            Ok(query_fn::params([min]))
        })
        .sql("select hits from counters where hits > ? order by hits")
        .param("min")
        .stats(registry),
    )
}

#[test]
fn registry_counts_calls_tuples_and_failures() -> Result<(), QueryFnError> {
    let conn = counters_db()?;
    let registry = Arc::new(StatsRegistry::new());
    registry.register("never_called");
    let hits = hits_over(&registry);

    assert_eq!(hits.call(&conn, CallArgs::new().arg(1))?, vec![2, 3]);
    assert_eq!(hits.call(&conn, CallArgs::new().arg(0))?, vec![1, 2, 3]);
    assert!(hits.call(&conn, CallArgs::new().arg(RowValues::Null))?.is_empty());
    assert!(hits.call(&conn, CallArgs::new()).is_err());
    assert!(hits.call(&conn, CallArgs::new().arg("x")).is_err());

    let stat = registry.stat("hits_over").expect("stats recorded");
    assert_eq!(stat.calls, 5);
    assert_eq!(stat.tuples, 5);
    assert_eq!(stat.fails, 2);
    assert_eq!(stat.fails_by_error.get("UsageError"), Some(&1));
    assert_eq!(stat.fails_by_error.get("DecodeError"), Some(&1));

    let names = registry.func_names();
    assert!(names.contains("never_called"));
    assert!(names.contains("hits_over"));
    assert!(registry.stat("never_called").is_none());

    registry.clear_stat();
    assert!(registry.snapshot().is_empty());
    assert!(registry.func_names().contains("hits_over"));
    Ok(())
}

#[test]
fn execute_reports_rows_changed() -> Result<(), QueryFnError> {
    let conn = counters_db()?;
    let registry = Arc::new(StatsRegistry::new());
    let bump = Execute::new(
        QueryFn::new("bump", |_| Ok(CallResult::AutoNamed))
            .sql("update counters set hits = hits + 1 where name in (:names)")
            .param("names")
            .stats(&registry),
    );
    assert_eq!(bump.call(&conn, CallArgs::new().arg(vec!["a", "c"]))?, 2);
    let stat = registry.stat("bump").expect("stats recorded");
    assert_eq!((stat.calls, stat.tuples, stat.fails), (1, 2, 0));
    Ok(())
}

struct Panicky;

impl CallObserver for Panicky {
    fn on_call(&self, _event: &CallEvent) {
        panic!("listener failure");
    }
}

#[derive(Default)]
struct Tally(AtomicUsize);

impl CallObserver for Tally {
    fn on_call(&self, _event: &CallEvent) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn panicking_listener_does_not_break_calls() -> Result<(), QueryFnError> {
    let conn = counters_db()?;
    let registry = Arc::new(StatsRegistry::new());
    let tally = Arc::new(Tally::default());
    registry.add_listener(Arc::new(Panicky));
    registry.add_listener(tally.clone());

    let hits = hits_over(&registry);
    assert_eq!(hits.call(&conn, CallArgs::new().arg(2))?, vec![3]);
    assert_eq!(tally.0.load(Ordering::SeqCst), 1);
    assert_eq!(registry.stat("hits_over").map(|s| s.calls), Some(1));
    Ok(())
}

#[test]
fn channel_observer_feeds_a_registry_later() -> Result<(), QueryFnError> {
    let conn = counters_db()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let count: ScalarOrNone<i64> = ScalarOrNone::new(
        QueryFn::without_body("count_counters")
            .sql("select count(*) from counters")
            .observer(Arc::new(ChannelObserver::new(tx))),
    );
    count.call(&conn, CallArgs::new())?;
    count.call(&conn, CallArgs::new())?;

    let registry = StatsRegistry::new();
    assert_eq!(registry.drain(&mut rx), 2);
    assert_eq!(registry.drain(&mut rx), 0);
    let stat = registry.stat("count_counters").expect("stats recorded");
    assert_eq!((stat.calls, stat.tuples), (2, 2));
    Ok(())
}

#[tokio::test]
async fn streamed_calls_are_reported_once_finished() -> Result<(), QueryFnError> {
    let conn = SqliteOptions::in_memory().connect().await?;
    conn.execute_batch("create table n(v integer); insert into n values (1), (2), (3);")
        .await?;
    let registry = Arc::new(StatsRegistry::new());
    let values: IterateScalars<i64> = IterateScalars::new(
        QueryFn::without_body("stream_n")
            .sql("select v from n order by v")
            .stats(&registry),
    );

    let mut rx = values.stream(&conn, CallArgs::new())?;
    let mut sum = 0;
    while let Some(v) = rx.recv().await {
        sum += v?;
    }
    assert_eq!(sum, 6);

    let stat = registry.stat("stream_n").expect("stats recorded");
    assert_eq!((stat.calls, stat.tuples), (1, 3));
    Ok(())
}
