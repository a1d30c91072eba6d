use crate::config::ConfigurationError;
use crate::database::DatabaseError;

/// Errors surfaced to callers of the failover layer.
///
/// `Database` keeps the driver failure reachable through
/// [`std::error::Error::source`], so the [`DatabaseError`] is always the root
/// cause of any chain built on top of it.
#[derive(Debug, thiserror::Error)]
pub enum FailoverError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Write query attempted while preventing writes: {statement}")]
    WriteRejected { statement: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<FailoverError>,
    },
}

impl FailoverError {
    /// Wrap this error with additional context, keeping it as the cause.
    pub fn context(self, context: impl Into<String>) -> Self {
        FailoverError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True when this is a write rejected by a read-only destination.
    pub fn is_write_rejected(&self) -> bool {
        match self {
            FailoverError::WriteRejected { .. } => true,
            FailoverError::Context { source, .. } => source.is_write_rejected(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FailoverError>;
