//! Gateway error types.

use std::io;

use pathgate_types::{APath, PathError, PathType};
use thiserror::Error;

use crate::local::Mode;
use crate::sharedresource::BoxError;

/// Gateway error type.
///
/// Backend failures are wrapped once, at the gateway that observed them, into
/// [`GatewayError::ReadFailure`] or [`GatewayError::WriteFailure`]. Routing
/// layers pass errors through untouched.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Paths that must agree on variant or tree root don't.
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),

    /// A path value was rejected before any I/O happened.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A read-side operation failed.
    #[error("failed to read {path}{}", detail(.message))]
    ReadFailure {
        path: APath,
        message: Option<String>,
        #[source]
        cause: Option<BoxError>,
    },

    /// A write-side operation failed.
    #[error("failed to write {path}{}", detail(.message))]
    WriteFailure {
        path: APath,
        message: Option<String>,
        #[source]
        cause: Option<BoxError>,
    },

    /// Neither unprivileged nor privileged execution is possible.
    #[error("no route available for {path} in {mode} mode")]
    NoRouteAvailable { path: APath, mode: Mode },

    /// The backend can't do this at all (e.g. symlinks on tree URIs).
    #[error("{operation} is not supported for {path_type} paths{}", at(.path))]
    UnsupportedOperation {
        operation: &'static str,
        path_type: PathType,
        path: Option<APath>,
    },

    /// No persisted grant covers the path.
    #[error("no permission grant covers {path}")]
    MissingCapabilityGrant { path: APath },

    /// No backend serves this path variant.
    #[error("no gateway for {path_type} paths")]
    Unimplemented { path_type: PathType },
}

fn detail(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {m}")).unwrap_or_default()
}

fn at(path: &Option<APath>) -> String {
    path.as_ref().map(|p| format!(" ({p})")).unwrap_or_default()
}

impl From<PathError> for GatewayError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::ArgumentMismatch(msg) => Self::ArgumentMismatch(msg),
            PathError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            PathError::Unsupported {
                operation,
                path_type,
            } => Self::UnsupportedOperation {
                operation,
                path_type,
                path: None,
            },
        }
    }
}

impl GatewayError {
    /// Create a ReadFailure caused by `cause`.
    pub fn read(path: impl Into<APath>, cause: impl Into<BoxError>) -> Self {
        Self::ReadFailure {
            path: path.into(),
            message: None,
            cause: Some(cause.into()),
        }
    }

    /// Create a ReadFailure with a message and no underlying cause.
    pub fn read_msg(path: impl Into<APath>, message: impl Into<String>) -> Self {
        Self::ReadFailure {
            path: path.into(),
            message: Some(message.into()),
            cause: None,
        }
    }

    /// Create a WriteFailure caused by `cause`.
    pub fn write(path: impl Into<APath>, cause: impl Into<BoxError>) -> Self {
        Self::WriteFailure {
            path: path.into(),
            message: None,
            cause: Some(cause.into()),
        }
    }

    /// Create a WriteFailure with a message and no underlying cause.
    pub fn write_msg(path: impl Into<APath>, message: impl Into<String>) -> Self {
        Self::WriteFailure {
            path: path.into(),
            message: Some(message.into()),
            cause: None,
        }
    }

    /// Create a NoRouteAvailable error.
    pub fn no_route(path: impl Into<APath>, mode: Mode) -> Self {
        Self::NoRouteAvailable {
            path: path.into(),
            mode,
        }
    }

    /// Create an UnsupportedOperation error.
    pub fn unsupported(operation: &'static str, path: impl Into<APath>) -> Self {
        let path = path.into();
        Self::UnsupportedOperation {
            operation,
            path_type: path.path_type(),
            path: Some(path),
        }
    }

    /// Create a MissingCapabilityGrant error.
    pub fn missing_grant(path: impl Into<APath>) -> Self {
        Self::MissingCapabilityGrant { path: path.into() }
    }
}

/// Convert GatewayError to std::io::Error for compatibility.
impl From<GatewayError> for io::Error {
    fn from(e: GatewayError) -> Self {
        let kind = match &e {
            GatewayError::ArgumentMismatch(_) | GatewayError::InvalidArgument(_) => {
                io::ErrorKind::InvalidInput
            }
            GatewayError::NoRouteAvailable { .. } | GatewayError::MissingCapabilityGrant { .. } => {
                io::ErrorKind::PermissionDenied
            }
            GatewayError::UnsupportedOperation { .. } | GatewayError::Unimplemented { .. } => {
                io::ErrorKind::Unsupported
            }
            GatewayError::ReadFailure { .. } | GatewayError::WriteFailure { .. } => {
                io::ErrorKind::Other
            }
        };
        io::Error::new(kind, e)
    }
}

/// Gateway result type.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pathgate_types::LocalPath;

    #[test]
    fn test_display_includes_path_and_message() {
        let err = GatewayError::read_msg(LocalPath::new("/sdcard/x"), "not readable");
        assert_eq!(err.to_string(), "failed to read /sdcard/x: not readable");

        let err = GatewayError::write(
            LocalPath::new("/sdcard/y"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.to_string(), "failed to write /sdcard/y");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_error_kinds() {
        let err: io::Error = GatewayError::no_route(LocalPath::new("/data"), Mode::Automatic).into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let err: io::Error = GatewayError::Unimplemented {
            path_type: PathType::Raw,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_from_path_error_keeps_kind() {
        let err = GatewayError::from(PathError::mismatch("different tree roots"));
        assert!(matches!(err, GatewayError::ArgumentMismatch(ref m) if m == "different tree roots"));

        let err = GatewayError::from(PathError::invalid_argument("not a tree uri: content://x"));
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
        assert_eq!(err.to_string(), "invalid argument: not a tree uri: content://x");
        let err: io::Error = err.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = GatewayError::from(PathError::Unsupported {
            operation: "segments",
            path_type: PathType::Raw,
        });
        assert!(matches!(
            err,
            GatewayError::UnsupportedOperation {
                operation: "segments",
                path_type: PathType::Raw,
                path: None,
            }
        ));
    }
}
