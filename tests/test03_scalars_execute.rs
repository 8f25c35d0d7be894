use std::cell::Cell;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use query_fn::executor::RowHandler;
use query_fn::prelude::*;
use query_fn::sqlite::PreparedCall;
use rusqlite::ToSql;
use rusqlite::types::ToSqlOutput;

fn people_db() -> Result<rusqlite::Connection, QueryFnError> {
    let conn = SqliteOptions::in_memory().open()?;
    conn.execute_batch(
        "create table people(id integer primary key, name text, birthdate text, avatar blob);
         insert into people(name, birthdate, avatar) values
            ('Ann', '1990-03-04', x'0102'),
            ('Bob', '1985-11-30', NULL),
            ('Cid', NULL, NULL);",
    )?;
    Ok(conn)
}

#[test]
fn scalar_or_none_reads_first_column() -> Result<(), QueryFnError> {
    let conn = people_db()?;

    let count: ScalarOrNone<i64> =
        ScalarOrNone::new(QueryFn::without_body("count_people").sql("select count(*) from people"));
    assert_eq!(count.call(&conn, CallArgs::new())?, Some(3));

    let oldest: ScalarOrNone<NaiveDate> =
        ScalarOrNone::new(QueryFn::without_body("oldest").sql("select min(birthdate) from people"));
    assert_eq!(oldest.call(&conn, CallArgs::new())?, NaiveDate::from_ymd_opt(1985, 11, 30));

    let missing: ScalarOrNone<String> = ScalarOrNone::new(
        QueryFn::new("name_of", |_| Ok(CallResult::AutoPositional))
            .sql("select name from people where id = ?")
            .param("id"),
    );
    assert_eq!(missing.call(&conn, CallArgs::new().arg(42))?, None);

    let null_birthdate: ScalarOrNone<NaiveDate> = ScalarOrNone::new(
        QueryFn::without_body("cid_birthdate").sql("select birthdate from people where name = 'Cid'"),
    );
    assert_eq!(null_birthdate.call(&conn, CallArgs::new())?, None);
    Ok(())
}

#[test]
fn fetch_scalars_collects_first_column() -> Result<(), QueryFnError> {
    let conn = people_db()?;

    let ids: FetchScalars<i64> =
        FetchScalars::new(QueryFn::without_body("ids").sql("select id from people order by id"));
    assert_eq!(ids.call(&conn, CallArgs::new())?, vec![1, 2, 3]);

    let ids_as_text: FetchScalars<String> = FetchScalars::new(
        QueryFn::without_body("ids_as_text").sql("select id from people where id < 3 order by id"),
    );
    assert_eq!(ids_as_text.call(&conn, CallArgs::new())?, vec!["1", "2"]);

    let raw: FetchScalars<RowValues> =
        FetchScalars::new(QueryFn::without_body("raw").sql("select birthdate from people order by id"));
    assert_eq!(
        raw.call(&conn, CallArgs::new())?,
        vec![
            RowValues::Text("1990-03-04".into()),
            RowValues::Text("1985-11-30".into()),
            RowValues::Null,
        ]
    );

    let avatars: FetchScalars<Option<Vec<u8>>> =
        FetchScalars::new(QueryFn::without_body("avatars").sql("select avatar from people order by id"));
    assert_eq!(avatars.call(&conn, CallArgs::new())?, vec![Some(vec![1, 2]), None, None]);

    let strict: FetchScalars<Vec<u8>> =
        FetchScalars::new(QueryFn::without_body("strict").sql("select avatar from people order by id"));
    assert!(matches!(strict.call(&conn, CallArgs::new()), Err(QueryFnError::DecodeError(_))));

    let cancelled: FetchScalars<i64> = FetchScalars::new(
        QueryFn::new("cancelled", |_| cancel()).sql("select id from people"),
    );
    assert!(cancelled.call(&conn, CallArgs::new())?.is_empty());
    Ok(())
}

#[test]
fn iterate_scalars_stops_on_request() -> Result<(), QueryFnError> {
    let conn = people_db()?;
    let names: IterateScalars<String> =
        IterateScalars::new(QueryFn::without_body("names").sql("select name from people order by id"));

    let mut seen = Vec::new();
    let delivered = names.for_each(&conn, CallArgs::new(), |name| {
        seen.push(name);
        if seen.len() == 2 { RowFlow::Stop } else { RowFlow::Continue }
    })?;
    assert_eq!(delivered, 2);
    assert_eq!(seen, vec!["Ann", "Bob"]);
    Ok(())
}

#[test]
fn execute_returns_rows_changed() -> Result<(), QueryFnError> {
    let conn = people_db()?;

    let add_person = Execute::new(
        QueryFn::new("add_person", |_| Ok(CallResult::AutoNamed))
            .sql("insert into people(name, birthdate) values (:name, :birthdate)")
            .param("name")
            .param_default("birthdate", RowValues::Null),
    );
    assert_eq!(add_person.call(&conn, CallArgs::new().arg("Dee"))?, 1);
    assert_eq!(
        add_person.call(
            &conn,
            CallArgs::new().arg("Eve").kwarg("birthdate", NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()),
        )?,
        1
    );

    let remove_people = Execute::new(
        QueryFn::new("remove_people", |args| {
            let ids = args.get("ids").cloned().unwrap_or(RowValues::Null);
            if ids.as_list().is_some_and(<[RowValues]>::is_empty) {
                return cancel();
            }
            Ok(query_fn::named([("ids", ids)]))
        })
        .sql("delete from people where id in (:ids)")
        .param("ids"),
    );
    assert_eq!(remove_people.call(&conn, CallArgs::new().arg(vec![1, 2, 99]))?, 2);
    assert_eq!(remove_people.call(&conn, CallArgs::new().arg(Vec::<i64>::new()))?, 0);

    let born: ScalarOrNone<NaiveDate> = ScalarOrNone::new(
        QueryFn::without_body("eve_born").sql("select birthdate from people where name = 'Eve'"),
    );
    assert_eq!(born.call(&conn, CallArgs::new())?, NaiveDate::from_ymd_opt(2001, 2, 3));

    let left: FetchScalars<String> =
        FetchScalars::new(QueryFn::without_body("left").sql("select name from people order by id"));
    assert_eq!(left.call(&conn, CallArgs::new())?, vec!["Cid", "Dee", "Eve"]);
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

impl ToSql for Point {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(format!("{},{}", self.x, self.y)))
    }
}

impl FromValue for Point {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn from_value(value: RowValues) -> Result<Self, QueryFnError> {
        let text = String::from_value(value)?;
        let parsed = text
            .split_once(',')
            .and_then(|(x, y)| Some(Point { x: x.parse().ok()?, y: y.parse().ok()? }));
        parsed.ok_or_else(|| QueryFnError::DecodeError(format!("not a point: {text}")))
    }
}

query_fn::result_record! {
    #[derive(Debug, PartialEq)]
    struct Shape {
        name: String,
        origin: Point,
    }
}

#[test]
fn custom_values_round_trip_through_user_impls() -> Result<(), QueryFnError> {
    let conn = SqliteOptions::in_memory().open()?;
    conn.execute_batch("create table shapes(name text, origin text)")?;

    let add_shape = Execute::new(
        QueryFn::new("add_shape", |_| Ok(CallResult::AutoPositional))
            .sql("insert into shapes(name, origin) values (?, ?)")
            .param("name")
            .param("origin"),
    );
    add_shape.call(
        &conn,
        CallArgs::new().arg("square").arg(CustomValue::new(Point { x: 3, y: -4 })),
    )?;

    let shapes: FetchAll<Shape> =
        FetchAll::new(QueryFn::without_body("shapes").sql("select name, origin from shapes"));
    assert_eq!(
        shapes.call(&conn, CallArgs::new())?,
        vec![Shape { name: "square".into(), origin: Point { x: 3, y: -4 } }]
    );
    Ok(())
}

#[test]
fn declared_time_types_widen_and_truncate() -> Result<(), QueryFnError> {
    let conn = SqliteOptions::in_memory().open()?;

    let widened: ScalarOrNone<NaiveDateTime> =
        ScalarOrNone::new(QueryFn::without_body("widened").sql("select '2024-01-02'"));
    assert_eq!(
        widened.call(&conn, CallArgs::new())?,
        NaiveDate::from_ymd_opt(2024, 1, 2).and_then(|d| d.and_hms_opt(0, 0, 0))
    );

    let truncated: ScalarOrNone<NaiveDate> =
        ScalarOrNone::new(QueryFn::without_body("truncated").sql("select '2024-01-02 03:04:05'"));
    assert_eq!(truncated.call(&conn, CallArgs::new())?, NaiveDate::from_ymd_opt(2024, 1, 2));

    let flag: ScalarOrNone<bool> = ScalarOrNone::new(QueryFn::without_body("flag").sql("select 1"));
    assert_eq!(flag.call(&conn, CallArgs::new())?, Some(true));
    Ok(())
}

/// Positional-only executor that records how often it is reached.
#[derive(Default)]
struct CountingExecutor {
    queries: Cell<usize>,
    executes: Cell<usize>,
}

impl Executor for CountingExecutor {
    fn supports_named_placeholders(&self) -> bool {
        false
    }

    fn query_rows(&self, _call: &PreparedCall, _on_row: &mut RowHandler<'_>) -> Result<(), QueryFnError> {
        self.queries.set(self.queries.get() + 1);
        Ok(())
    }

    fn execute_dml(&self, _call: &PreparedCall) -> Result<usize, QueryFnError> {
        self.executes.set(self.executes.get() + 1);
        Ok(7)
    }
}

#[test]
fn cancel_never_reaches_the_executor() -> Result<(), QueryFnError> {
    let mock = CountingExecutor::default();

    let skip = |name: &str| QueryFn::new(name, |_| cancel()).sql("select 1");
    let all: FetchAll<BTreeMap<String, RowValues>> = FetchAll::new(skip("a"));
    assert!(all.call(&mock, CallArgs::new())?.is_empty());
    let one: OneOrNone<BTreeMap<String, RowValues>> = OneOrNone::new(skip("b"));
    assert_eq!(one.call(&mock, CallArgs::new())?, None);
    assert_eq!(ScalarOrNone::<i64>::new(skip("c")).call(&mock, CallArgs::new())?, None);
    assert_eq!(Execute::new(skip("d")).call(&mock, CallArgs::new())?, 0);
    assert_eq!(mock.queries.get(), 0);
    assert_eq!(mock.executes.get(), 0);

    let run = Execute::new(QueryFn::without_body("run").sql("delete from t"));
    assert_eq!(run.call(&mock, CallArgs::new())?, 7);
    assert_eq!(mock.executes.get(), 1);
    Ok(())
}

#[test]
fn named_parameters_need_a_named_executor() {
    let mock = CountingExecutor::default();
    let by_name: FetchScalars<i64> = FetchScalars::new(
        QueryFn::new("by_name", |_| Ok(CallResult::AutoNamed))
            .sql("select id from t where name = :name")
            .param("name"),
    );
    let err = by_name.call(&mock, CallArgs::new().arg("x")).unwrap_err();
    assert!(matches!(err, QueryFnError::UsageError(ref msg) if msg.contains("by_name")));
    assert_eq!(mock.queries.get(), 0);

    let by_pos: FetchScalars<i64> = FetchScalars::new(
        QueryFn::new("by_pos", |_| Ok(CallResult::AutoPositional))
            .sql("select id from t where name = ?")
            .param("name"),
    );
    assert!(by_pos.call(&mock, CallArgs::new().arg("x")).unwrap().is_empty());
    assert_eq!(mock.queries.get(), 1);
}
