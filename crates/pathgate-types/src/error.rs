//! Path construction and comparison errors.

use thiserror::Error;

/// Errors raised by path values themselves, before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A constructor rejected its input (e.g. a non-tree URI as a tree root).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two paths that must share a variant (or tree root) do not.
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),

    /// The variant cannot perform this operation (e.g. raw segments).
    #[error("unsupported for {path_type} paths: {operation}")]
    Unsupported {
        operation: &'static str,
        path_type: crate::PathType,
    },
}

impl PathError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an ArgumentMismatch error.
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::ArgumentMismatch(msg.into())
    }
}

/// Path result type.
pub type PathResult<T> = Result<T, PathError>;
