// Engine boundary: everything that touches `rusqlite` directly lives here.
//
// - config: options applied when a handle is acquired
// - params: host value -> engine value marshalling
// - query: row extraction and result building
// - engine: open/close/execute/begin/commit/rollback/attach/detach
// - restore: bulk load of a SQL script

pub mod config;
pub mod engine;
pub mod params;
pub mod query;
pub mod restore;

pub use config::{OpenOptions, OpenOptionsBuilder};
pub use params::Params;
