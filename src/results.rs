//! Raw query results: rows of undecoded [`RowValues`] sharing one set of column names.

mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::DbRow;
