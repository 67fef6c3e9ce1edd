//! Dispatch error taxonomy.
//!
//! Validation and not-found errors are raised before any engine call and carry
//! the offending field or name verbatim. Engine and filesystem failures keep
//! their kind so callers can tell them apart without parsing message text,
//! even though both share the internal-error wire class.

use crate::imaging::BackendError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid argument `{field}`: {constraint}")]
    Validation { field: String, constraint: String },
    #[error("Unknown tool: {0}")]
    NotFound(String),
    #[error("Image processing error: {0}")]
    Engine(BackendError),
    #[error("Image processing error: {action} {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Wire-level error class of a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorClass {
    /// JSON-RPC error code.
    pub fn code(self) -> i64 {
        match self {
            ErrorClass::MethodNotFound => -32601,
            ErrorClass::InvalidParams => -32602,
            ErrorClass::InternalError => -32603,
        }
    }
}

impl DispatchError {
    pub fn validation(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        DispatchError::Validation {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    pub fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DispatchError::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DispatchError::Validation { .. } => ErrorClass::InvalidParams,
            DispatchError::NotFound(_) => ErrorClass::MethodNotFound,
            DispatchError::Engine(_) | DispatchError::Filesystem { .. } => {
                ErrorClass::InternalError
            }
        }
    }

    /// Stable machine-readable kind, reported alongside the wire class.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Validation { .. } => "validation",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::Engine(_) => "engine",
            DispatchError::Filesystem { .. } => "filesystem",
        }
    }
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Io { path, source } => DispatchError::Filesystem {
                action: "failed to access",
                path,
                source,
            },
            other => DispatchError::Engine(other),
        }
    }
}
