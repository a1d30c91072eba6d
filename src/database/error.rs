//! Driver failure values.
//!
//! A [`DatabaseError`] is always the root of an error chain: it has no
//! `source()`. That is what lets provenance checks find it by walking the
//! chain from any wrapper built on top of it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Broad classification of a driver failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    /// The connection could not be established or was lost
    ConnectionBad,
    /// The connection exists but a message could not be sent over it
    UnableToSend,
    /// The server executed the statement and reported an error
    Query,
    Other,
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseErrorKind::ConnectionBad => write!(f, "connection bad"),
            DatabaseErrorKind::UnableToSend => write!(f, "unable to send"),
            DatabaseErrorKind::Query => write!(f, "query failed"),
            DatabaseErrorKind::Other => write!(f, "database error"),
        }
    }
}

impl DatabaseErrorKind {
    /// Kinds that indicate the server is unreachable rather than the query being wrong
    pub fn is_connectivity(self) -> bool {
        matches!(self, DatabaseErrorKind::ConnectionBad | DatabaseErrorKind::UnableToSend)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
    message: String,
    code: Option<String>,
    from_readyset: AtomicBool,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            from_readyset: AtomicBool::new(false),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn kind(&self) -> DatabaseErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// SQLSTATE reported by the server, if any
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Whether this failure happened on a connection to ReadySet
    pub fn is_from_readyset(&self) -> bool {
        self.from_readyset.load(Ordering::Acquire)
    }

    /// Mark this failure as having happened on a ReadySet connection.
    /// Marking twice leaves a single mark.
    pub(crate) fn mark_from_readyset(&self) {
        self.from_readyset.store(true, Ordering::Release);
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DatabaseErrorKind::ConnectionBad,
            sqlx::Error::Protocol(_) => DatabaseErrorKind::UnableToSend,
            sqlx::Error::Database(_) => DatabaseErrorKind::Query,
            _ => DatabaseErrorKind::Other,
        };
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };

        let mut error = DatabaseError::new(kind, err.to_string());
        error.code = code;
        error
    }
}
