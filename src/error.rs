//! Error types for the ingestion pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Closed taxonomy of failures. Only `Validation` is scoped to a single file;
/// every other kind aborts the batch or run it occurs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Collision,
    ProcessFailure,
    StoreFailure,
    Io,
    Configuration,
}

impl ErrorKind {
    /// Whether the failure can be recorded against one file while the batch continues.
    pub fn is_file_scoped(&self) -> bool {
        matches!(self, ErrorKind::Validation)
    }
}

/// Errors that can occur while preparing or loading dictionary records
#[derive(Error, Debug)]
pub enum IngestError {
    /// A single record is unusable (bad JSON, missing `Entity`, non-numeric identifier)
    #[error("Validation error: {message}")]
    Validation {
        file: Option<PathBuf>,
        message: String,
    },

    /// Two source files claim the same identity
    #[error("Collision error: [{}] is already existing", path.display())]
    Collision { path: PathBuf },

    /// The external transform step exited non-zero or timed out
    #[error("Transform process failed: {0}")]
    ProcessFailure(String),

    /// The document store rejected an operation
    #[error("Store error: {0}")]
    StoreFailure(#[from] crate::store::StoreError),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors outside per-file validation
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl IngestError {
    /// Create a validation error tied to a file
    pub fn validation(file: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Validation {
            file: Some(file.into()),
            message: msg.into(),
        }
    }

    /// Create a validation error for a payload that has no file yet
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::Validation {
            file: None,
            message: msg.into(),
        }
    }

    /// Create a new collision error
    pub fn collision(path: impl Into<PathBuf>) -> Self {
        Self::Collision { path: path.into() }
    }

    /// Create a new transform process error
    pub fn process_failure(msg: impl Into<String>) -> Self {
        Self::ProcessFailure(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Validation { .. } => ErrorKind::Validation,
            IngestError::Collision { .. } => ErrorKind::Collision,
            IngestError::ProcessFailure(_) => ErrorKind::ProcessFailure,
            IngestError::StoreFailure(_) => ErrorKind::StoreFailure,
            IngestError::Io(_) | IngestError::Json(_) => ErrorKind::Io,
            IngestError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

/// Result type for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;
