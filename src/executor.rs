// Statement execution shared by both paths.
//
// - blocking: runs on the calling thread once it holds the handle
// - queued: packages work as tasks for the worker pool

mod blocking;
mod queued;

use crate::error::BridgeError;
use crate::request::{ExecutionRequest, TransactionMode};
use crate::results::QueryResult;
use crate::sqlite::engine;
use crate::transaction::run_unit;

/// Run one request, honouring its transaction mode.
pub(crate) fn run_request(
    conn: &rusqlite::Connection,
    request: &ExecutionRequest,
) -> Result<QueryResult, BridgeError> {
    match request.transaction_mode() {
        TransactionMode::None => engine::execute(conn, request.sql(), request.params()),
        TransactionMode::Single | TransactionMode::Batch => {
            run_unit(conn, |tx| tx.execute_request(request))
        }
    }
}
