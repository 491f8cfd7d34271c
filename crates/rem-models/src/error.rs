use thiserror::Error;

/// Errors raised while parsing or normalizing model values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown entity table: {0}")]
    UnknownTable(String),

    #[error("unknown message role: {0}")]
    UnknownRole(String),

    #[error("unknown traversal direction: {0}")]
    UnknownDirection(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
