use hdforge_types::{RowId, TypesError};
use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{table} row {id} not found")]
    NotFound { table: &'static str, id: RowId },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<TypesError> for StorageError {
    fn from(e: TypesError) -> Self {
        StorageError::ConstraintViolation(e.to_string())
    }
}
