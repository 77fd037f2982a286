//! Error types for netnsplan operations.

use std::fmt;
use std::io;

/// Result type for netnsplan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single configuration validation error or warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrorInfo {
    /// Path of the offending field, e.g. `netns.ns1.veth-devices.veth0.peer.name`.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationErrorInfo {
    /// Create a new validation error entry.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Coarse classification of an [`Error`].
///
/// The engine only ever branches on [`ErrorKind::NotFound`]; every other
/// kind aborts the apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The named namespace or link does not exist.
    NotFound,
    /// The execution environment refused the operation.
    PermissionDenied,
    /// The underlying tool exited nonzero for any other reason.
    CommandFailure,
    /// I/O, parse, validation or transport failure.
    Unexpected,
}

/// Errors that can occur while loading configuration or driving iproute2.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, e.g. the `ip` binary could not be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `ip -json` produced output that does not parse.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration document is not valid YAML or has the wrong shape.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Namespace or link does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Message reported by the tool.
        message: String,
    },

    /// Operation not permitted.
    #[error("operation not permitted: {message}")]
    PermissionDenied {
        /// Message reported by the tool.
        message: String,
    },

    /// The command exited with a nonzero status.
    #[error("{message} (exit status: {status})")]
    Command {
        /// Exit status of the process (-1 if killed by a signal).
        status: i32,
        /// Trimmed stderr of the process.
        message: String,
    },

    /// Namespace still has processes attached and cannot be deleted.
    #[error("netns {name} has running processes: {}", join_pids(.pids))]
    NamespaceBusy {
        /// The namespace name.
        name: String,
        /// Processes running inside it.
        pids: Vec<u32>,
    },

    /// Output of a command could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// The desired state failed validation.
    #[error("invalid configuration: {}", join_validation(.0))]
    Validation(Vec<ValidationErrorInfo>),

    /// An error with the operation that produced it.
    #[error("{operation}: {source}")]
    WithContext {
        /// The operation that failed, including namespace and device.
        operation: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_validation(errors: &[ValidationErrorInfo]) -> String {
    errors
        .iter()
        .map(ValidationErrorInfo::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Add context to this error.
    ///
    /// Context is only attached once; an error that already carries an
    /// operation is returned unchanged so the innermost operation wins.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::WithContext { .. } => self,
            other => Self::WithContext {
                operation: operation.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error with any context wrapping removed.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Command { .. } | Self::NamespaceBusy { .. } => ErrorKind::CommandFailure,
            _ => ErrorKind::Unexpected,
        }
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a permission error.
    pub fn is_permission_denied(&self) -> bool {
        self.kind() == ErrorKind::PermissionDenied
    }

    /// Get the exit status if a command failed.
    pub fn exit_status(&self) -> Option<i32> {
        match self.root() {
            Self::Command { status, .. } => Some(*status),
            _ => None,
        }
    }
}
