use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("cannot open database {path}: {message}")]
    Open { path: String, message: String },

    #[error("connection {0} is closed")]
    ClosedConnection(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("resource busy: {0}")]
    ResourceBusy(String),

    #[error("engine error {code}: {message}")]
    Engine { code: i32, message: String },

    /// Failure inside a transaction unit. The unit has already been rolled back.
    #[error("transaction rolled back: {source}")]
    Transaction {
        #[source]
        source: Box<BridgeError>,
    },

    #[error("parameter error: {0}")]
    Parameter(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn closed(name: &str) -> Self {
        BridgeError::ClosedConnection(name.to_owned())
    }

    /// Wrap a failure from inside a unit of work, without nesting an existing wrap.
    #[must_use]
    pub fn into_transaction(self) -> Self {
        match self {
            err @ BridgeError::Transaction { .. } => err,
            other => BridgeError::Transaction {
                source: Box::new(other),
            },
        }
    }

    /// Engine result code, if this error came from the engine.
    #[must_use]
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            BridgeError::Engine { code, .. } => Some(*code),
            BridgeError::Transaction { source } => source.engine_code(),
            _ => None,
        }
    }
}

// Engine failures pass through verbatim: extended result code plus message.
impl From<rusqlite::Error> for BridgeError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(inner, message) => BridgeError::Engine {
                code: inner.extended_code,
                message: message.unwrap_or_else(|| inner.to_string()),
            },
            other => BridgeError::Engine {
                code: -1,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_wrap_is_not_nested() {
        let err = BridgeError::Parameter("bad".into()).into_transaction();
        let again = err.into_transaction();
        match again {
            BridgeError::Transaction { source } => {
                assert!(matches!(*source, BridgeError::Parameter(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sqlite_failure_keeps_extended_code() {
        let raw = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: 2067,
            },
            Some("UNIQUE constraint failed: t.id".into()),
        );
        let err = BridgeError::from(raw);
        assert_eq!(err.engine_code(), Some(2067));
        assert!(err.to_string().contains("UNIQUE constraint failed"));
    }
}
