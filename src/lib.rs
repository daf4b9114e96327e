//! Blocking and queued access to SQLite databases from one process.
//!
//! A [`Bridge`] owns a small pool of worker threads. Each [`Connection`] it
//! hands out owns one engine handle and an ordered queue of background tasks:
//! plain methods run on the calling thread, `*_async` methods return a
//! [`Completion`] that resolves on a worker. Both paths see the handle one
//! thread at a time, and queued tasks of one connection run in order.
//!
//! ```no_run
//! use sqlite_bridge::{BatchCommand, OpenOptions, RowValues};
//!
//! # fn main() -> Result<(), sqlite_bridge::BridgeError> {
//! let conn = sqlite_bridge::open("app.db", OpenOptions::default())?;
//! conn.execute("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v INTEGER)")?;
//! conn.execute_commands(vec![
//!     BatchCommand::new("INSERT INTO kv VALUES (?1, ?2)").with_param_sets(vec![
//!         vec![RowValues::from("a"), RowValues::Int(1)],
//!         vec![RowValues::from("b"), RowValues::Int(2)],
//!     ]),
//! ])?;
//! let total = conn.execute_async("SELECT sum(v) FROM kv").wait()?;
//! assert_eq!(total.rows.len(), 1);
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod completion;
pub mod connection;
pub mod error;
mod executor;
pub mod prelude;
pub mod request;
pub mod results;
pub mod sqlite;
pub mod transaction;
pub mod types;
mod worker;

pub use bridge::{Bridge, BridgeConfig, BridgeConfigBuilder, default_bridge, delete, open};
pub use completion::Completion;
pub use connection::{Connection, ConnectionState};
pub use error::BridgeError;
pub use request::{BatchCommand, BatchParams, ExecutionRequest, TransactionMode, expand_commands};
pub use results::{BatchResult, ColumnMetadata, FileLoadResult, QueryResult, ResultSet, Row};
pub use sqlite::{OpenOptions, OpenOptionsBuilder};
pub use transaction::{Transaction, TxState};
pub use types::RowValues;

pub use rusqlite;
