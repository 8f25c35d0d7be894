//! Turn query-preparing functions into typed `SQLite` executors.
//!
//! A [`QueryFn`] decides, per call, which statement runs and which parameters are bound.
//! A result mode ([`FetchAll`], [`OneOrNone`], [`ScalarOrNone`], [`FetchScalars`],
//! [`Iterate`], [`IterateScalars`], [`Execute`]) wraps it, resolves the statement, encodes
//! values, expands list parameters into one placeholder per element, runs the statement on
//! the connection you pass in, and decodes the rows.
//!
//! ```rust
//! use query_fn::prelude::*;
//!
//! query_fn::result_record! {
//!     #[derive(Debug)]
//!     pub struct User {
//!         pub id: i64,
//!         pub username: String,
//!     }
//! }
//!
//! # fn main() -> Result<(), QueryFnError> {
//! let conn = SqliteOptions::in_memory().open()?;
//! conn.execute_batch(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT);
//!      INSERT INTO users (username) VALUES ('jane'), ('john'), ('joe');",
//! )?;
//!
//! let by_ids: FetchAll<User> = FetchAll::new(
//!     QueryFn::new("get_users_by_ids", |_| Ok(CallResult::AutoNamed))
//!         .sql("select id, username from users where id in (:ids) order by id")
//!         .param("ids"),
//! );
//! let users = by_ids.call(&conn, CallArgs::new().arg(vec![1, 3]))?;
//! assert_eq!(users.len(), 2);
//! assert_eq!(users[1].username, "joe");
//! # Ok(()) }
//! ```

pub mod call_result;
pub mod context;
pub mod decode;
pub mod error;
pub mod executor;
pub mod expansion;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod query_fn;
pub mod resolver;
pub mod results;
pub mod signature;
pub mod sqlite;
pub mod types;

pub use call_result::{
    CallResult, Params, Prepared, cancel, named, params, query_and_named, query_and_params,
    query_only,
};
pub use context::DbScope;
pub use decode::{FieldType, FromValue, RecordDecoder, ResultRecord, make_scalar_decoder};
pub use error::QueryFnError;
pub use executor::{AsyncExecutor, Executor, RowFlow};
pub use observer::{CallEvent, CallObserver, CallStat, ChannelObserver, StatsRegistry};
pub use ops::{Execute, FetchAll, FetchScalars, Iterate, IterateScalars, OneOrNone, ScalarOrNone};
pub use query_fn::QueryFn;
pub use results::{DbRow, ResultSet};
pub use signature::{BoundArgs, CallArgs, Signature};
pub use sqlite::{SqliteConnection, SqliteOptions, SqliteOptionsBuilder};
pub use types::{CustomValue, RowValues};
