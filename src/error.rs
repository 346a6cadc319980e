//! Error types for the entity store.
//!
//! Two layers live here. [`StoreError`] is the internal error used by the
//! table, pipeline and persistence code. [`OperationError`] is the tagged
//! `{ code, message, timestamp }` record the mutation API hands back to
//! callers and keeps as the store's last error.

use crate::types::Timestamp;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Main error type for store internals.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item with id {0} not found")]
    NotFound(String),

    #[error("Entity does not serialize to an object: {0}")]
    NotAnObject(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("{}", .0.message)]
    Validation(ValidationError),

    #[error("Version conflict for {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Cannot change identity of {id} to {to}")]
    IdentityChange { id: String, to: String },

    #[error("Hook panicked: {0}")]
    HookPanicked(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Key-value store is locked by another process")]
    Locked,

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

impl From<ValidationError> for StoreError {
    fn from(e: ValidationError) -> Self {
        StoreError::Validation(e)
    }
}

/// Result type for store internals.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failure reported by a validation hook.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

impl ValidationError {
    pub const DEFAULT_CODE: &'static str = "VALIDATION_ERROR";

    /// Validation failure with the default code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: Self::DEFAULT_CODE.to_string(),
            message: message.into(),
        }
    }

    /// Validation failure with an application-specific code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Error code carried by an [`OperationError`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CreateError,
    ReadError,
    UpdateError,
    DeleteError,
    /// The in-memory change stands but could not be written through.
    PersistError,
    /// Code chosen by the validation hook, passed through untouched.
    Validation(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::CreateError => "CREATE_ERROR",
            ErrorCode::ReadError => "READ_ERROR",
            ErrorCode::UpdateError => "UPDATE_ERROR",
            ErrorCode::DeleteError => "DELETE_ERROR",
            ErrorCode::PersistError => "PERSIST_ERROR",
            ErrorCode::Validation(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Error record surfaced by the mutation API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OperationError {
    pub code: ErrorCode,
    pub message: String,
    pub timestamp: Timestamp,
}

impl OperationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            timestamp: Timestamp::now(),
        }
    }

    /// Normalize an internal error into the operation's code.
    ///
    /// Validation failures keep the hook's own code and message.
    pub fn from_store_error(code: ErrorCode, error: StoreError) -> Self {
        match error {
            StoreError::Validation(v) => Self::new(ErrorCode::Validation(v.code), v.message),
            other => Self::new(code, other.to_string()),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.code, ErrorCode::Validation(_))
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for OperationError {}

/// Result shape of every single-item mutation.
pub type CrudResult<T> = std::result::Result<T, OperationError>;
