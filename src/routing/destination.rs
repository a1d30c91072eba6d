use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::database::DatabaseError;
use crate::error::{FailoverError, Result};

/// Which database a backend talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Readyset,
    Primary,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Readyset => write!(f, "readyset"),
            Target::Primary => write!(f, "primary"),
        }
    }
}

/// Access granted to an operation on its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Read statements only; writes are rejected before reaching the backend
    Reading,
    Writing,
}

/// Something queries can be sent to
#[async_trait]
pub trait Backend: Send + Sync {
    type Row: Send;

    fn target(&self) -> Target;

    /// Run a statement and return the number of affected rows
    async fn execute(&self, statement: &str) -> std::result::Result<u64, DatabaseError>;

    async fn fetch_all(&self, statement: &str) -> std::result::Result<Vec<Self::Row>, DatabaseError>;
}

/// The backend an operation was routed to, together with its role
pub struct Destination<B> {
    backend: Arc<B>,
    role: Role,
}

impl<B: Backend> Destination<B> {
    pub fn new(backend: Arc<B>, role: Role) -> Self {
        Self { backend, role }
    }

    pub fn target(&self) -> Target {
        self.backend.target()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn prevents_writes(&self) -> bool {
        self.role == Role::Reading
    }

    pub async fn execute(&self, statement: &str) -> Result<u64> {
        self.check_statement(statement)?;
        Ok(self.backend.execute(statement).await?)
    }

    pub async fn fetch_all(&self, statement: &str) -> Result<Vec<B::Row>> {
        self.check_statement(statement)?;
        Ok(self.backend.fetch_all(statement).await?)
    }

    fn check_statement(&self, statement: &str) -> Result<()> {
        if self.prevents_writes() && is_write_statement(statement) {
            return Err(FailoverError::WriteRejected {
                statement: statement.to_string(),
            });
        }
        Ok(())
    }
}

impl<B> Clone for Destination<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            role: self.role,
        }
    }
}

impl<B: Backend> fmt::Debug for Destination<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("target", &self.target())
            .field("role", &self.role)
            .finish()
    }
}

/// Leading keywords of statements that never modify data
const READ_KEYWORDS: &[&str] = &[
    "SELECT", "SHOW", "EXPLAIN", "WITH", "SET", "RESET", "BEGIN", "COMMIT", "ROLLBACK",
    "SAVEPOINT", "RELEASE", "DECLARE", "FETCH", "MOVE", "CLOSE",
];

/// True when the statement's leading keyword, after comments, whitespace and
/// opening parentheses, is on the read allow-list
pub fn is_read_statement(statement: &str) -> bool {
    let keyword = leading_keyword(statement);
    READ_KEYWORDS
        .iter()
        .any(|read| read.eq_ignore_ascii_case(keyword))
}

/// Anything that is not known to be a read, including an empty statement
pub fn is_write_statement(statement: &str) -> bool {
    !is_read_statement(statement)
}

fn leading_keyword(statement: &str) -> &str {
    let mut rest = statement;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, after)| after);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, after)| after);
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}
