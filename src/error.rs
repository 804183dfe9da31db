//! Error types for the IRCv3 client engine.
//!
//! Errors are layered: [`MessageParseError`] covers a single malformed line,
//! [`ProtocolError`] covers the wire and transport, [`MechanismError`] covers
//! SASL mechanism steps, and [`SessionError`] is what handlers and the
//! session driver report.

use thiserror::Error;

/// Convenience type alias for Results using [`SessionError`].
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Wire-level errors raised while framing or transporting lines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line exceeded maximum allowed length.
    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),

    /// The configured host is not a usable TLS server name.
    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),
}

/// Errors encountered when parsing IRC lines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// A tag key did not match the key grammar.
    #[error("invalid tag key: {0:?}")]
    InvalidTag(String),

    /// Parsing error with detailed context information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Character position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
        /// Optional source error that caused this failure.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Preserved source error message for Clone support.
        source_message: Option<String>,
    },
}

impl Clone for MessageParseError {
    fn clone(&self) -> Self {
        match self {
            MessageParseError::EmptyMessage => MessageParseError::EmptyMessage,
            MessageParseError::InvalidCommand => MessageParseError::InvalidCommand,
            MessageParseError::InvalidTag(s) => MessageParseError::InvalidTag(s.clone()),
            MessageParseError::ParseContext {
                position,
                context,
                source,
                source_message,
            } => {
                // The boxed source can't be cloned; keep its message.
                let preserved_message = source_message
                    .clone()
                    .or_else(|| source.as_ref().map(|e| e.to_string()));
                MessageParseError::ParseContext {
                    position: *position,
                    context: context.clone(),
                    source: None,
                    source_message: preserved_message,
                }
            }
        }
    }
}

impl PartialEq for MessageParseError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::EmptyMessage, Self::EmptyMessage) => true,
            (Self::InvalidCommand, Self::InvalidCommand) => true,
            (Self::InvalidTag(a), Self::InvalidTag(b)) => a == b,
            (
                Self::ParseContext {
                    position: pa,
                    context: ca,
                    ..
                },
                Self::ParseContext {
                    position: pb,
                    context: cb,
                    ..
                },
            ) => pa == pb && ca == cb,
            _ => false,
        }
    }
}

/// Failures reported by a SASL mechanism step.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MechanismError {
    /// Server payload was not valid base64 or UTF-8.
    #[error("invalid base64 encoding")]
    InvalidEncoding,
    /// Server nonce doesn't start with the client nonce.
    #[error("server nonce doesn't match client nonce")]
    NonceMismatch,
    /// Missing nonce in server message.
    #[error("missing nonce in server message")]
    MissingNonce,
    /// Missing salt in server message.
    #[error("missing salt in server message")]
    MissingSalt,
    /// Missing iteration count in server message.
    #[error("missing iteration count")]
    MissingIterations,
    /// Invalid iteration count.
    #[error("invalid iteration count")]
    InvalidIterations,
    /// Server signature did not verify.
    #[error("server verification failed")]
    ServerVerificationFailed,
    /// Server reported an error inside the exchange (`e=...`).
    #[error("server rejected authentication: {0}")]
    Rejected(String),
    /// The mechanism received a challenge after it had finished.
    #[error("unexpected challenge for {0}")]
    UnexpectedChallenge(&'static str),
    /// `step` was called with no mechanism selected.
    #[error("no mechanism selected")]
    NoMechanism,
    /// The random source failed while generating a nonce.
    #[error("random number generator failed")]
    Rng,
    /// A hash or MAC primitive rejected its input.
    #[error("cryptographic primitive failed")]
    Crypto,
}

/// Errors reported by handlers, the state machines, and the session driver.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// A line did not match the message grammar.
    #[error("parse error: {0}")]
    Parse(#[from] MessageParseError),

    /// Neither a specific nor a fallback handler was registered.
    #[error("no handler for command {0:?}")]
    NoHandler(String),

    /// The server sent something that doesn't fit the current negotiation.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// SASL can't succeed on this connection.
    #[error("authentication impossible: {0}")]
    AuthenticationImpossible(String),

    /// A SASL mechanism step failed.
    #[error("sasl mechanism failed: {0}")]
    Mechanism(#[from] MechanismError),

    /// Connect or stream failure.
    #[error("network error while {context}: {source}")]
    Network {
        /// What the driver was doing.
        context: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Framing or TLS failure on the transport.
    #[error("transport error: {0}")]
    Transport(#[from] ProtocolError),

    /// The server closed the stream.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was attempted in a state that doesn't allow it.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The connection was cancelled by a local disconnect.
    #[error("operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether this error terminates the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationImpossible(_)
                | Self::Mechanism(_)
                | Self::Network { .. }
                | Self::Transport(_)
                | Self::ConnectionLost(_)
        )
    }

    /// Whether this error is the expected result of a local disconnect.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn network(context: &'static str, source: std::io::Error) -> Self {
        Self::Network { context, source }
    }
}
