//! Error types for the `sse` crate.
//!
//! Follows the layered pattern used across the workspace: a root `Error`
//! struct holding an `error_kind` tree plus the optional underlying cause.
//! The `web` layer translates the kinds into HTTP status codes.
use std::error::Error as StdError;
use std::fmt;
use std::io;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Writing to or flushing a subscriber's stream failed.
    Connection(ConnectionErrorKind),
    /// The transport cannot flush partial responses to the client.
    StreamingUnsupported,
    /// The transport cannot be handed over as an exclusive stream.
    HijackUnsupported,
    /// The request stopped before its producers finished.
    Cancelled(CancelReason),
}

#[derive(Debug, PartialEq)]
pub enum ConnectionErrorKind {
    /// The peer went away (broken pipe, reset, closed pipe).
    Disconnected,
    /// A write or flush did not complete within the configured deadline.
    Stalled,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The per-request deadline elapsed.
    Timeout,
    /// The client dropped the response stream.
    Disconnected,
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn streaming_unsupported() -> Self {
        Error::new(ErrorKind::StreamingUnsupported)
    }

    pub fn hijack_unsupported() -> Self {
        Error::new(ErrorKind::HijackUnsupported)
    }

    pub fn is_connection(&self) -> bool {
        matches!(self.error_kind, ErrorKind::Connection(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Connection(kind) => write!(f, "connection error ({kind:?})")?,
            ErrorKind::StreamingUnsupported => write!(f, "client doesn't support streaming")?,
            ErrorKind::HijackUnsupported => write!(f, "server doesn't support hijacking")?,
            ErrorKind::Cancelled(reason) => write!(f, "request cancelled ({reason:?})")?,
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero => ConnectionErrorKind::Disconnected,
            io::ErrorKind::TimedOut => ConnectionErrorKind::Stalled,
            _ => ConnectionErrorKind::Other,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Connection(kind),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Connection(ConnectionErrorKind::Stalled),
        }
    }
}
