use std::error::Error;
use std::fmt::{self, Display};

use thiserror::Error;

/// The kind of error that occurred while talking to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never produced a response (connection refused, DNS,
    /// TLS or a transport level timeout).
    Transport,
    /// The backend rejected the request with a 4xx status.
    ClientStatus,
    /// The backend failed with a 5xx status.
    ServerStatus,
    /// The response arrived but its body could not be decoded.
    Malformed,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns whether retrying the same request may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::ServerStatus)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "Transport error"),
            ErrorKind::ClientStatus => write!(f, "Request rejected"),
            ErrorKind::ServerStatus => write!(f, "Backend unavailable"),
            ErrorKind::Malformed => write!(f, "Malformed response"),
            ErrorKind::Other => write!(f, "Other error"),
        }
    }
}

/// The error type for a backend implementation.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// An error reported by the voice link, either as the result of a command
/// or through [`crate::VoiceEventHandler::on_error`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("{message}")]
pub struct VoiceLinkError {
    message: String,
}

impl VoiceLinkError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}
