//! Sans-IO session driver.
//!
//! A [`Session`] owns everything one connection needs apart from the socket:
//! the dispatch table, capability and SASL state, and the contact roster.
//! The caller feeds it raw lines and forwards what it queues.
//!
//! # Example
//!
//! ```
//! use ircv3_engine::{AccountConfig, Session};
//!
//! let mut session = Session::new(AccountConfig::new("alice", "irc.example.com"));
//! session.start();
//!
//! let lines: Vec<String> = session.drain_outgoing().collect();
//! assert_eq!(lines, ["CAP LS 302", "USER alice 0 * :alice", "NICK alice"]);
//!
//! session.handle_line("PING :abc").unwrap();
//! assert_eq!(session.drain_outgoing().next().as_deref(), Some("PONG abc"));
//! ```

mod handlers;
mod roster;
mod sasl;

use std::collections::VecDeque;

use tracing::{debug, info, warn};

pub use self::roster::{Contact, Conversation, ConversationKey, Roster};
pub use self::sasl::SaslSession;

use crate::caps::{Capabilities, Capability, NegotiationHost};
use crate::command::Command;
use crate::config::AccountConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SessionError};
use crate::event::SessionEvent;
use crate::message::ParsedMessage;
use crate::sasl::SaslState;

/// Connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Opening the socket.
    Connecting,
    /// Negotiating capabilities and registering.
    Registering,
    /// Registration complete.
    Connected,
    /// Closed locally or by the server.
    Disconnected,
    /// Closed by a fatal error.
    Error,
}

/// State handlers mutate. Capability negotiation and the rest of the
/// session are separate fields so handlers can borrow both at once.
#[derive(Debug)]
pub struct SessionContext {
    /// Capability negotiation.
    pub caps: Capabilities,
    /// Everything else.
    pub core: SessionCore,
}

/// Session state apart from capability negotiation.
#[derive(Debug)]
pub struct SessionCore {
    config: AccountConfig,
    state: ConnectionState,
    sasl: Option<SaslSession>,
    roster: Roster,
    outbox: VecDeque<String>,
    events: VecDeque<SessionEvent>,
}

impl SessionCore {
    fn new(config: AccountConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Connecting,
            sasl: None,
            roster: Roster::default(),
            outbox: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Account settings.
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// SASL state, once authentication has started.
    pub fn sasl(&self) -> Option<&SaslSession> {
        self.sasl.as_ref()
    }

    /// Known contacts and conversations.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Queue an event for the application.
    pub fn emit(&mut self, event: SessionEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "connection state changed");
        self.state = state;
        self.emit(SessionEvent::StateChanged(state));
    }
}

impl NegotiationHost for SessionCore {
    fn send(&mut self, command: Command) {
        self.outbox.push_back(command.to_string());
    }

    fn ready(&mut self, caps: &mut Capabilities) -> Result<()> {
        self.emit(SessionEvent::CapabilitiesReady);

        let sasl = Capability::Sasl;
        if self.config.require_password && caps.lookup(sasl.as_ref()).is_some() {
            caps.request(sasl.as_ref(), self)?;
        }
        caps.request_if_available(Capability::CapNotify.as_ref(), self)?;
        caps.request_if_available(Capability::MessageTags.as_ref(), self)?;
        Ok(())
    }

    fn acknowledged(&mut self, caps: &mut Capabilities, name: &str) -> Result<()> {
        debug!(capability = name, "capability acknowledged");
        self.emit(SessionEvent::CapabilityAcknowledged(name.to_owned()));

        match Capability::from(name) {
            Capability::MessageTags => {
                caps.request_if_available(Capability::Msgid.as_ref(), self)?;
                Ok(())
            }
            Capability::Sasl => self.begin_sasl(caps),
            _ => Ok(()),
        }
    }

    fn rejected(&mut self, _caps: &mut Capabilities, name: &str) -> Result<()> {
        warn!(capability = name, "capability rejected");
        self.emit(SessionEvent::CapabilityRejected(name.to_owned()));
        Ok(())
    }

    fn added(&mut self, names: &[String]) {
        self.emit(SessionEvent::CapabilitiesAdded(names.to_vec()));
    }

    fn removed(&mut self, names: &[String]) {
        self.emit(SessionEvent::CapabilitiesRemoved(names.to_vec()));
    }

    fn done(&mut self) {
        info!(nick = %self.config.nick, "registration complete");
        self.set_state(ConnectionState::Connected);
        self.emit(SessionEvent::RegistrationComplete);
    }
}

/// One connection's protocol state.
pub struct Session {
    dispatcher: Dispatcher<SessionContext>,
    context: SessionContext,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A session in [`ConnectionState::Connecting`] with the default
    /// handlers installed.
    pub fn new(config: AccountConfig) -> Self {
        let mut dispatcher = Dispatcher::new();
        handlers::install(&mut dispatcher);

        Self {
            dispatcher,
            context: SessionContext {
                caps: Capabilities::new(),
                core: SessionCore::new(config),
            },
        }
    }

    /// The socket is open: start negotiation and queue registration.
    pub fn start(&mut self) {
        let SessionContext { caps, core } = &mut self.context;
        core.set_state(ConnectionState::Registering);
        caps.start(core);

        if let Some(password) = core.config.server_password().map(str::to_owned) {
            core.send(Command::PASS(password));
        }
        let user = Command::USER(
            core.config.ident().to_owned(),
            core.config.real_name().to_owned(),
        );
        core.send(user);
        let nick = Command::NICK(core.config.nick.clone());
        core.send(nick);
    }

    /// Parse and dispatch one line. Fatal errors move the session to
    /// [`ConnectionState::Error`].
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let result = self.dispatcher.parse_and_dispatch(line, &mut self.context);
        self.check(result)
    }

    /// Dispatch an already parsed message.
    pub fn handle_message(&mut self, message: &ParsedMessage) -> Result<()> {
        let result = self.dispatcher.dispatch(message, &mut self.context);
        self.check(result)
    }

    fn check(&mut self, result: Result<()>) -> Result<()> {
        if let Err(ref e) = result {
            if e.is_fatal() {
                self.fail(e);
            }
        }
        result
    }

    /// Queue a command.
    pub fn send(&mut self, command: Command) {
        self.context.core.send(command);
    }

    /// Queue a `PRIVMSG`.
    pub fn privmsg(&mut self, target: &str, text: &str) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(SessionError::InvalidState("not registered"));
        }
        self.send(Command::PRIVMSG(target.to_owned(), text.to_owned()));
        Ok(())
    }

    /// Lines waiting to be written, oldest first.
    pub fn drain_outgoing(&mut self) -> impl Iterator<Item = String> + '_ {
        self.context.core.outbox.drain(..)
    }

    /// Events waiting for the application, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.context.core.events.drain(..)
    }

    /// Drop queued lines after a write failure.
    pub fn clear_outgoing(&mut self) {
        self.context.core.outbox.clear();
    }

    /// The connection closed.
    pub fn mark_disconnected(&mut self, reason: Option<String>) {
        let core = &mut self.context.core;
        core.set_state(ConnectionState::Disconnected);
        core.emit(SessionEvent::Disconnected(reason));
    }

    /// The connection failed with `error`.
    pub fn fail(&mut self, error: &SessionError) {
        let core = &mut self.context.core;
        if matches!(
            core.state,
            ConnectionState::Error | ConnectionState::Disconnected
        ) {
            return;
        }
        warn!(error = %error, "connection failed");
        if let Some(sasl) = core.sasl.as_mut() {
            if !sasl.state().is_complete() {
                sasl.set_state(SaslState::Failed(error.to_string()));
            }
        }
        core.set_state(ConnectionState::Error);
        core.emit(SessionEvent::Disconnected(Some(error.to_string())));
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.context.core.state
    }

    /// Capability negotiation state.
    pub fn capabilities(&self) -> &Capabilities {
        &self.context.caps
    }

    /// SASL progress.
    pub fn sasl_state(&self) -> SaslState {
        self.context
            .core
            .sasl
            .as_ref()
            .map(|s| s.state().clone())
            .unwrap_or_default()
    }

    /// Everything handlers see.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Account settings.
    pub fn config(&self) -> &AccountConfig {
        &self.context.core.config
    }

    /// Known contacts and conversations.
    pub fn roster(&self) -> &Roster {
        &self.context.core.roster
    }

    /// The dispatch table, for replacing or adding handlers.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<SessionContext> {
        &mut self.dispatcher
    }
}
