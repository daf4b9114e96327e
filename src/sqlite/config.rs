use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Options applied when a connection acquires its engine handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Directory that relative database and attachment names resolve against.
    pub location: Option<PathBuf>,
    pub read_only: bool,
    /// Create the database file if it does not exist (ignored when read-only).
    pub create_if_missing: bool,
    /// How long the engine waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Switch the database to WAL journaling after open. This writes to the file header.
    pub wal: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            location: None,
            read_only: false,
            create_if_missing: true,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: false,
        }
    }
}

impl OpenOptions {
    #[must_use]
    pub fn builder() -> OpenOptionsBuilder {
        OpenOptionsBuilder::default()
    }
}

/// Fluent builder for [`OpenOptions`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptionsBuilder {
    opts: OpenOptions,
}

impl OpenOptionsBuilder {
    #[must_use]
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.opts.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.opts.create_if_missing = create;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> OpenOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let opts: OpenOptions = serde_json::from_str(r#"{"read_only": true}"#).expect("parse");
        assert!(opts.read_only);
        assert!(opts.create_if_missing);
        assert_eq!(opts.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn builder_sets_every_field() {
        let opts = OpenOptions::builder()
            .location("/tmp/dbs")
            .read_only(true)
            .create_if_missing(false)
            .busy_timeout(Duration::from_millis(250))
            .wal(true)
            .finish();
        assert_eq!(opts.location, Some(PathBuf::from("/tmp/dbs")));
        assert!(opts.read_only && opts.wal && !opts.create_if_missing);
        assert_eq!(opts.busy_timeout, Duration::from_millis(250));
    }
}
