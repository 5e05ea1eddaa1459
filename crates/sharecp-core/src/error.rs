use std::time::Duration;

use thiserror::Error;

/// Errors produced anywhere in the transfer pipeline.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{op} '{path}': {source}")]
    File {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Broad error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dial failure, timeout, or disconnect mid-operation.
    Transport,
    /// Credentials rejected or handshake malformed.
    Authentication,
    /// Share missing or access denied.
    NotFound,
    /// Local or remote file open/create/read/write failure.
    Io,
    /// Caller misuse: wrong state, bad address or path.
    Usage,
}

impl ShareError {
    /// Wrap an I/O error with the operation and path it came from.
    pub fn file(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        ShareError::File {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ShareError::Transport(_) | ShareError::Timeout(_) => ErrorKind::Transport,
            ShareError::AuthFailed(_) => ErrorKind::Authentication,
            ShareError::NotFound(_) => ErrorKind::NotFound,
            ShareError::File { .. } | ShareError::Io(_) => ErrorKind::Io,
            ShareError::InvalidState(_)
            | ShareError::InvalidAddress(_)
            | ShareError::InvalidPath(_)
            | ShareError::Unsupported(_) => ErrorKind::Usage,
        }
    }
}

pub type ShareResult<T> = Result<T, ShareError>;
