use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::Connection;
use crate::connection::registry::{self, DbTarget};
use crate::connection::shared::Shared;
use crate::error::BridgeError;
use crate::sqlite::OpenOptions;
use crate::worker::WorkerPool;

const MAX_DEFAULT_WORKERS: usize = 4;

static DEFAULT_BRIDGE: OnceLock<Result<Bridge, String>> = OnceLock::new();

/// Worker pool settings shared by every connection of a [`Bridge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub workers: usize,
    /// Worker threads are named `<thread_name>-<idx>`.
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(MAX_DEFAULT_WORKERS);
        Self {
            workers,
            thread_name: "sqlite-bridge-worker".into(),
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn finish(self) -> BridgeConfig {
        self.config
    }
}

/// Owns the worker pool and hands out connections that queue work on it.
///
/// Connections keep the pool alive, so a bridge may be dropped while its
/// connections are still in use.
pub struct Bridge {
    pool: Arc<WorkerPool>,
    config: BridgeConfig,
}

impl Bridge {
    /// Start the worker pool.
    ///
    /// # Errors
    /// `Config` for zero workers or an empty thread name; `Worker` if a thread
    /// cannot be spawned.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        if config.thread_name.trim().is_empty() {
            return Err(BridgeError::Config("worker thread name is empty".into()));
        }
        let pool = WorkerPool::spawn(config.workers, &config.thread_name)?;
        Ok(Self {
            pool: Arc::new(pool),
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Create a connection in `Opening`; call [`Connection::open`] to acquire the handle.
    ///
    /// # Errors
    /// `Open` for an empty name or a path that cannot be made absolute.
    pub fn connection(&self, name: &str, options: OpenOptions) -> Result<Connection, BridgeError> {
        let target = DbTarget::resolve(name, options.location.as_deref())?;
        let shared = Shared::new(name.to_owned(), target, options, Arc::clone(&self.pool));
        Ok(Connection::from_shared(shared))
    }

    /// Create and open a connection.
    ///
    /// # Errors
    /// See [`Bridge::connection`] and [`Connection::open`].
    pub fn open(&self, name: &str, options: OpenOptions) -> Result<Connection, BridgeError> {
        let conn = self.connection(name, options)?;
        conn.open()?;
        Ok(conn)
    }

    /// Delete a database file and its sidecars, resolving `name` like [`Bridge::open`].
    ///
    /// # Errors
    /// `ResourceBusy` while any connection holds the file, `InvalidState` for
    /// in-memory and URI names, `Io` if the file cannot be removed.
    pub fn delete(&self, name: &str, options: &OpenOptions) -> Result<(), BridgeError> {
        delete(name, options)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("workers", &self.pool.size())
            .field("thread_name", &self.config.thread_name)
            .finish()
    }
}

/// The process-wide bridge behind [`open`], started on first use with default settings.
///
/// # Errors
/// `Worker` if the default pool could not be started.
pub fn default_bridge() -> Result<&'static Bridge, BridgeError> {
    DEFAULT_BRIDGE
        .get_or_init(|| {
            debug!("starting default bridge");
            Bridge::new(BridgeConfig::default()).map_err(|err| err.to_string())
        })
        .as_ref()
        .map_err(|msg| BridgeError::Worker(format!("default bridge unavailable: {msg}")))
}

/// Open a connection on the default bridge.
///
/// # Errors
/// See [`Bridge::open`].
pub fn open(name: &str, options: OpenOptions) -> Result<Connection, BridgeError> {
    default_bridge()?.open(name, options)
}

/// Delete a database file that no connection holds open.
///
/// # Errors
/// See [`Bridge::delete`].
pub fn delete(name: &str, options: &OpenOptions) -> Result<(), BridgeError> {
    let target = DbTarget::resolve(name, options.location.as_deref())?;
    registry::delete(&target)
}
