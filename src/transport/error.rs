//! Transport error types.

use thiserror::Error;

use crate::error::{ProtocolError, SessionError};

/// Errors that can occur when reading from a transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportReadError {
    /// An I/O error occurred.
    #[error("read failed: {0}")]
    Io(#[source] std::io::Error),
    /// A protocol error occurred.
    #[error("framing failed: {0}")]
    Protocol(#[source] ProtocolError),
}

impl From<std::io::Error> for TransportReadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProtocolError> for TransportReadError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => Self::Io(e),
            other => Self::Protocol(other),
        }
    }
}

impl From<TransportReadError> for SessionError {
    fn from(err: TransportReadError) -> Self {
        match err {
            TransportReadError::Io(e) => SessionError::network("reading from server", e),
            TransportReadError::Protocol(e) => SessionError::Transport(e),
        }
    }
}
