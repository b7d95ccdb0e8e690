// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for OneFS
//!
//! Routine existence checks never fail: "not found" and "already exists" are
//! reported through `Option`/`bool` return values. The variants below are the
//! faults that callers actually have to handle.

use std::io;
use thiserror::Error;

/// Result type alias
pub type OneFsResult<T> = Result<T, OneFsError>;

/// Main error type
#[derive(Error, Debug)]
pub enum OneFsError {
    /// The input matched none of the address syntaxes
    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    /// No registered backend claims the path
    #[error("No backend handles '{0}'")]
    Unsupported(String),

    /// The remote side rejected the credentials
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Connection-level failure (connect, lost link, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote side rejected a command
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unexpected backend fault, passed through as-is
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl OneFsError {
    /// Transport faults are the only ones worth retrying; the library itself
    /// never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OneFsError::Transport(_))
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, OneFsError::AccessDenied(_))
    }

    /// Recovers a translated fault from an `io::Error` produced by a wrapped
    /// stream.
    pub fn from_io(err: &io::Error) -> Option<&OneFsError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<OneFsError>())
    }

    /// Wraps this error into an `io::Error` so it can travel through
    /// `AsyncRead`/`AsyncWrite` implementations.
    pub fn into_io(self) -> io::Error {
        let kind = match &self {
            OneFsError::Transport(_) => io::ErrorKind::ConnectionAborted,
            OneFsError::AccessDenied(_) => io::ErrorKind::PermissionDenied,
            OneFsError::Io(e) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }

    /// Takes back a fault wrapped by [`OneFsError::into_io`]; any other
    /// `io::Error` becomes [`OneFsError::Io`].
    pub fn recover(err: io::Error) -> OneFsError {
        if Self::from_io(&err).is_none() {
            return OneFsError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<OneFsError>()) {
            Some(Ok(fault)) => *fault,
            Some(Err(other)) => OneFsError::Io(io::Error::new(kind, other)),
            None => OneFsError::Io(kind.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(OneFsError::Transport("connection reset".into()).is_retryable());

        assert!(!OneFsError::Protocol("550 denied".into()).is_retryable());
        assert!(!OneFsError::AccessDenied("bad password".into()).is_retryable());
        assert!(!OneFsError::MalformedAddress("::".into()).is_retryable());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(OneFsError::AccessDenied("login incorrect".into()).is_auth_error());

        assert!(!OneFsError::Transport("timeout".into()).is_auth_error());
        assert!(!OneFsError::Unsupported("gopher://x/".into()).is_auth_error());
    }

    #[test]
    fn test_error_display() {
        let err = OneFsError::Unsupported("nntp://news/".into());
        assert_eq!(format!("{}", err), "No backend handles 'nntp://news/'");

        let err = OneFsError::MalformedAddress("ftp://host:99999/".into());
        assert!(format!("{}", err).contains("99999"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: OneFsError = io_err.into();
        assert!(matches!(err, OneFsError::Io(_)));
    }

    #[test]
    fn test_io_round_trip() {
        let io_err = OneFsError::Transport("link down".into()).into_io();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionAborted);
        assert!(matches!(
            OneFsError::from_io(&io_err),
            Some(OneFsError::Transport(msg)) if msg == "link down"
        ));

        let plain = io::Error::new(io::ErrorKind::Other, "plain");
        assert!(OneFsError::from_io(&plain).is_none());
    }

    #[test]
    fn test_recover() {
        let wrapped = OneFsError::AccessDenied("530".into()).into_io();
        assert!(OneFsError::recover(wrapped).is_auth_error());

        let plain = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(
            OneFsError::recover(plain),
            OneFsError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe
        ));
    }
}
