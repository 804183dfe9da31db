//! # ircv3-engine
//!
//! The client side of an IRCv3 connection: line parsing, command dispatch,
//! capability negotiation, SASL authentication, and registration.
//!
//! ## Features
//!
//! - IRC line parsing with tags, sources, commands, and parameters
//! - IRCv3 `CAP` 3.2 negotiation with a wait gate for sub-negotiations
//! - SASL 3.2 with EXTERNAL, PLAIN, and SCRAM-SHA-256 (`scram` feature)
//! - A sans-IO [`Session`] that can be driven by any runtime
//! - Optional Tokio integration with TCP and TLS transports
//!
//! ## Quick Start
//!
//! ### Parsing IRC Lines
//!
//! ```rust
//! use ircv3_engine::ParsedMessage;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message: ParsedMessage = raw.parse().expect("Valid IRC message");
//!
//! assert_eq!(message.tag("time"), Some("2023-01-01T12:00:00Z"));
//! assert_eq!(message.params, ["#channel", "Hello!"]);
//! ```
//!
//! ### Driving a Session
//!
//! ```rust
//! use ircv3_engine::{AccountConfig, ConnectionState, Session};
//!
//! let mut session = Session::new(AccountConfig::new("alice", "irc.example.com"));
//! session.start();
//! session.handle_line(":irc.example.com CAP * LS :multi-prefix").unwrap();
//!
//! let sent: Vec<String> = session.drain_outgoing().collect();
//! assert_eq!(sent.last().map(String::as_str), Some("CAP END"));
//! assert_eq!(session.state(), ConnectionState::Connected);
//! ```

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod caps;
pub mod command;
pub mod config;
#[cfg(feature = "tokio")]
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod message;
pub mod sasl;
pub mod session;
#[cfg(feature = "tokio")]
pub mod transport;

pub use self::caps::{Capabilities, Capability, NegotiationHost, NegotiationState, NegotiationVersion};
pub use self::command::{CapSubCommand, Command};
pub use self::config::AccountConfig;
#[cfg(feature = "tokio")]
pub use self::connection::{Connection, DISCONNECT_GRACE};
pub use self::dispatch::{Dispatcher, MessageHandler};
pub use self::error::{MechanismError, MessageParseError, ProtocolError, SessionError};
pub use self::event::{IncomingMessage, SessionEvent};
pub use self::message::ParsedMessage;
pub use self::sasl::{MechanismContext, SaslMechanism, SaslState};
pub use self::session::{ConnectionState, ConversationKey, Session, SessionContext};
#[cfg(feature = "tokio")]
pub use self::transport::{LineCodec, Transport, TransportReadError, MAX_IRC_LINE_LEN};
