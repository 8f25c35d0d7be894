//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::call_result::{CallResult, Params, Prepared, cancel};
pub use crate::context::DbScope;
pub use crate::decode::{FieldType, FromValue, ResultRecord};
pub use crate::error::QueryFnError;
pub use crate::executor::{AsyncExecutor, Executor, RowFlow};
pub use crate::observer::{CallEvent, CallObserver, ChannelObserver, StatsRegistry};
pub use crate::ops::{
    Execute, FetchAll, FetchScalars, Iterate, IterateScalars, OneOrNone, ScalarOrNone,
};
pub use crate::query_fn::QueryFn;
pub use crate::results::{DbRow, ResultSet};
pub use crate::signature::{BoundArgs, CallArgs, Signature};
pub use crate::sqlite::{SqliteConnection, SqliteOptions, SqliteOptionsBuilder};
pub use crate::types::{CustomValue, RowValues};
