/// Database Module
///
/// The database layer is split into three concerns:
/// - **Values** (`value.rs`): typed cells and the materialized `QueryResult`
/// - **Connection Management** (`connection.rs`): credentials, the driver seam
///   and the single lazily opened connection
/// - **Query Execution** (`query.rs`): running SQL through the managed
///   connection, with an optional timeout
///
/// `sqlite.rs` holds the shipped driver built on rusqlite.
pub mod connection;
pub mod query;
pub mod sqlite;
pub mod value;

pub use connection::*;
pub use query::*;
pub use sqlite::{SqliteConnection, SqliteDriver};
pub use value::*;
