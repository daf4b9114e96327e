use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BridgeError;
use crate::sqlite::engine;

use super::registry::{self, DbTarget};
use super::shared::{Attachment, ConnectionState};
use super::Connection;

const RESERVED_SCHEMAS: &[&str] = &["main", "temp"];

fn validate_alias(alias: &str) -> Result<(), BridgeError> {
    let mut chars = alias.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BridgeError::Parameter(format!(
            "invalid database alias {alias:?}"
        )))
    }
}

impl Connection {
    /// Acquire the engine handle.
    ///
    /// # Errors
    /// `InvalidState` unless the connection is in `Opening`; `Open` when the
    /// engine cannot open the target or the file is not a usable database.
    /// A failed open leaves the connection in `Opening`.
    pub fn open(&self) -> Result<(), BridgeError> {
        self.shared.open()
    }

    /// Drain queued and in-flight tasks, then release the handle.
    ///
    /// Tasks submitted once closing has begun are rejected. Closing twice is a no-op.
    ///
    /// # Errors
    /// `InvalidState` when called from inside this connection's own transaction
    /// body; `Engine` if the engine refuses to release the handle.
    pub fn close(&self) -> Result<(), BridgeError> {
        self.shared.close()
    }

    /// Name the connection was created with.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Path handed to the engine, after resolving against the configured location.
    pub fn path(&self) -> &Path {
        &self.shared.target.open_path
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Asynchronous tasks accepted and not yet finished.
    pub fn pending_tasks(&self) -> usize {
        self.shared.outstanding()
    }

    /// Currently attached databases by alias.
    pub fn attached(&self) -> BTreeMap<String, PathBuf> {
        self.shared
            .lock()
            .attached
            .iter()
            .map(|(alias, attachment)| (alias.clone(), attachment.path.clone()))
            .collect()
    }

    /// Delete this connection's database file and its journal sidecars.
    ///
    /// # Errors
    /// `InvalidState` while the connection is open or closing, or for in-memory
    /// targets; `ResourceBusy` if another connection holds the file;
    /// `Io` if removal fails.
    pub fn delete(&self) -> Result<(), BridgeError> {
        let state = self.state();
        if matches!(state, ConnectionState::Open | ConnectionState::Closing) {
            return Err(BridgeError::InvalidState(format!(
                "connection {} must be closed before its file is deleted",
                self.shared.name
            )));
        }
        registry::delete(&self.shared.target)
    }

    /// Attach another database file under `alias`.
    ///
    /// # Errors
    /// `Parameter` for an alias that is not a plain identifier, `ResourceBusy`
    /// for `main`, `temp` or an alias already attached, `Engine` if the engine
    /// refuses the file.
    pub fn attach(&self, alias: &str, path: impl AsRef<Path>) -> Result<(), BridgeError> {
        validate_alias(alias)?;
        let target = DbTarget::from_path(path.as_ref(), self.shared.options.location.as_deref())?;
        let mut access = self.shared.acquire()?;
        let taken = RESERVED_SCHEMAS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(alias))
            || self
                .shared
                .lock()
                .attached
                .keys()
                .any(|existing| existing.eq_ignore_ascii_case(alias));
        if taken {
            return Err(BridgeError::ResourceBusy(format!(
                "database alias {alias} is already in use"
            )));
        }
        let conn = access.conn()?;
        let ((), key) = registry::register_with(target.file.as_deref(), || {
            engine::attach(conn, alias, &target.open_path)
        })?;
        debug!(name = %self.shared.name, alias, path = %target.open_path.display(), "database attached");
        self.shared.lock().attached.insert(
            alias.to_owned(),
            Attachment {
                path: target.open_path,
                key,
            },
        );
        Ok(())
    }

    /// Detach the database attached under `alias`.
    ///
    /// # Errors
    /// `InvalidState` if nothing is attached under `alias`; `Engine` if the
    /// engine refuses, e.g. inside an open transaction.
    pub fn detach(&self, alias: &str) -> Result<(), BridgeError> {
        let mut access = self.shared.acquire()?;
        let known = self
            .shared
            .lock()
            .attached
            .keys()
            .find(|existing| existing.eq_ignore_ascii_case(alias))
            .cloned();
        let Some(known) = known else {
            return Err(BridgeError::InvalidState(format!(
                "no database attached as {alias}"
            )));
        };
        engine::detach(access.conn()?, &known)?;
        let removed = self.shared.lock().attached.remove(&known);
        if let Some(key) = removed.and_then(|attachment| attachment.key) {
            registry::unregister(&key);
        }
        debug!(name = %self.shared.name, alias = %known, "database detached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_must_be_plain_identifiers() {
        for ok in ["aux", "_scratch", "db2", "Archive_2024"] {
            assert!(validate_alias(ok).is_ok(), "{ok}");
        }
        for bad in ["", "2db", "my db", "a-b", "x\"y", "ümlaut"] {
            assert!(
                matches!(validate_alias(bad), Err(BridgeError::Parameter(_))),
                "{bad}"
            );
        }
    }
}
