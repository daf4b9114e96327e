//! Convenient imports for common functionality.
//!
//! ```
//! use sqlite_bridge::prelude::*;
//! ```

pub use crate::bridge::{Bridge, BridgeConfig};
pub use crate::completion::Completion;
pub use crate::connection::{Connection, ConnectionState};
pub use crate::error::BridgeError;
pub use crate::request::{BatchCommand, ExecutionRequest, TransactionMode};
pub use crate::results::{BatchResult, FileLoadResult, QueryResult, ResultSet};
pub use crate::sqlite::OpenOptions;
pub use crate::transaction::Transaction;
pub use crate::types::RowValues;
