//! Events a session reports to the application.

use chrono::{DateTime, Local};

use crate::sasl::SaslMechanism;
use crate::session::{ConnectionState, ConversationKey};

/// A chat message delivered by `PRIVMSG` or `NOTICE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Channel or direct conversation the message belongs to.
    pub conversation: ConversationKey,
    /// Sender, as given in the message source.
    pub author: String,
    /// Message text.
    pub contents: String,
    /// Local receive time.
    pub timestamp: DateTime<Local>,
    /// Set for `NOTICE`.
    pub notify: bool,
    /// Server-assigned `msgid` tag, if present and non-empty.
    pub id: Option<String>,
}

/// Something the application may want to react to.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionEvent {
    /// The connection moved to a new state.
    StateChanged(ConnectionState),
    /// The server finished listing its capabilities.
    CapabilitiesReady,
    /// A capability request was acknowledged.
    CapabilityAcknowledged(String),
    /// A capability request was rejected.
    CapabilityRejected(String),
    /// `CAP NEW`
    CapabilitiesAdded(Vec<String>),
    /// `CAP DEL`
    CapabilitiesRemoved(Vec<String>),
    /// SASL authentication succeeded.
    SaslSucceeded(SaslMechanism),
    /// Capability negotiation ended and registration completed.
    RegistrationComplete,
    /// A new contact was seen.
    ContactAdded(String),
    /// A new conversation was opened.
    ConversationCreated(ConversationKey),
    /// A chat message arrived.
    MessageReceived(IncomingMessage),
    /// The connection closed. Carries the reason for unexpected closes.
    Disconnected(Option<String>),
}
