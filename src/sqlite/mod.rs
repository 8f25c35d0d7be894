// SQLite backend:
// - config: connection options and builder
// - params: value encoding and statement preparation
// - query: binding, row extraction and result building
// - executor: blocking `Executor` impls for rusqlite connections
// - connection: async connection running statements on the blocking pool

pub mod config;
pub mod connection;
pub mod executor;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use params::{BoundParams, BoundValue, ParamKey, PreparedCall, encode_param, encode_value};
pub use query::build_result_set;
