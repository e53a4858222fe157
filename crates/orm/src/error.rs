//! Error types for the ORM system
//!
//! Every fallible operation in the crate reports an [`OrmError`]. Statement
//! failures carry the prefetch node and the rendered statement so a caller can
//! tell which part of a query failed.

use crate::object::ObjectId;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Name used for the root node of a prefetch pass in diagnostics.
pub const ROOT_NODE: &str = "<root>";

/// Error types for ORM operations
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// Malformed or contradictory prefetch tree, query or configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A statement issued while resolving `node` failed in the database layer
    #[error("Statement failed while resolving '{node}': {source} [{statement}]")]
    StatementExecution {
        node: String,
        statement: String,
        #[source]
        source: DatabaseError,
    },

    /// A fault holder was resolved twice within one prefetch pass
    #[error("Relationship '{relationship}' of {entity} {key} was already resolved in this pass")]
    AlreadyResolved {
        entity: String,
        key: String,
        relationship: String,
    },

    /// A returned row cannot be mapped to an object
    #[error("Inconsistent row for entity '{entity}': {reason}")]
    InconsistentRow { entity: String, reason: String },

    /// The entity model itself is malformed
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// The object id does not belong to this unit of work
    #[error("Object {0} is not registered in this context")]
    UnknownObject(ObjectId),

    /// The prefetch pass was cancelled before `node` was resolved
    #[error("Prefetch pass cancelled before resolving '{node}'")]
    Cancelled { node: String },
}

impl OrmError {
    /// Prefetch node a statement or cancellation error is attached to.
    pub fn failed_node(&self) -> Option<&str> {
        match self {
            OrmError::StatementExecution { node, .. } | OrmError::Cancelled { node } => Some(node),
            _ => None,
        }
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        OrmError::Configuration(msg.into())
    }

    pub(crate) fn inconsistent_row(entity: &str, reason: impl Into<String>) -> Self {
        OrmError::InconsistentRow {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a [`StatementExecutor`](crate::backends::StatementExecutor)
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DatabaseError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::with_source(format!("Query fetch failed: {}", err), err)
    }
}

/// Raised by [`FaultHolder::resolve_to`](crate::object::FaultHolder::resolve_to)
/// when the holder is no longer a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("fault holder is already resolved")]
pub struct AlreadyResolvedError;
