//! IRCv3 capability negotiation.
//!
//! [`Capabilities`] is the client side of `CAP LS/REQ/ACK/NAK/NEW/DEL/END`.
//! It writes lines and reports progress through a [`NegotiationHost`], and
//! holds `CAP END` back while any party holds a wait on it.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{Result, SessionError};

/// Capabilities the session requests or reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// SASL authentication
    Sasl,
    /// Notify of capability changes
    CapNotify,
    /// Client message tags support
    MessageTags,
    /// Unique message IDs
    Msgid,
    /// Any other capability
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::Sasl => "sasl",
            Self::CapNotify => "cap-notify",
            Self::MessageTags => "message-tags",
            Self::Msgid => "msgid",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "sasl" => Self::Sasl,
            "cap-notify" => Self::CapNotify,
            "message-tags" => Self::MessageTags,
            "msgid" => Self::Msgid,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// CAP negotiation version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationVersion {
    /// CAP 3.2
    V302,
}

impl NegotiationVersion {
    /// Get the numeric version value.
    pub fn version(&self) -> u32 {
        match self {
            Self::V302 => 302,
        }
    }
}

/// Progress of capability negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// `CAP LS` not sent yet.
    Idle,
    /// Collecting `CAP LS` replies.
    AwaitingList,
    /// Listing finished; requests may be outstanding.
    Negotiating,
    /// Sending `CAP END`.
    Finishing,
    /// `CAP END` sent.
    Done,
}

/// The connection side of negotiation.
///
/// Hooks are called synchronously while the [`Capabilities`] is borrowed
/// mutably, and receive it back so they can request more capabilities or
/// take a wait.
pub trait NegotiationHost {
    /// Queue one outgoing command.
    fn send(&mut self, command: Command);

    /// The final `CAP LS` line arrived. Called once.
    fn ready(&mut self, caps: &mut Capabilities) -> Result<()> {
        let _ = caps;
        Ok(())
    }

    /// A request was acknowledged. `name` is the exact requested string.
    fn acknowledged(&mut self, caps: &mut Capabilities, name: &str) -> Result<()> {
        let _ = (caps, name);
        Ok(())
    }

    /// A request was rejected.
    fn rejected(&mut self, caps: &mut Capabilities, name: &str) -> Result<()> {
        let _ = (caps, name);
        Ok(())
    }

    /// `CAP NEW` advertised capabilities.
    fn added(&mut self, names: &[String]) {
        let _ = names;
    }

    /// `CAP DEL` withdrew capabilities.
    fn removed(&mut self, names: &[String]) {
        let _ = names;
    }

    /// `CAP END` was sent.
    fn done(&mut self) {}
}

/// Client capability negotiation state for one connection.
#[derive(Debug)]
pub struct Capabilities {
    state: NegotiationState,
    caps: HashMap<String, Option<String>>,
    requests: Vec<String>,
    wait_count: u32,
    ready_fired: bool,
    finished: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl Capabilities {
    /// Fresh state in [`NegotiationState::Idle`].
    pub fn new() -> Self {
        Self {
            state: NegotiationState::Idle,
            caps: HashMap::new(),
            requests: Vec::new(),
            wait_count: 0,
            ready_fired: false,
            finished: false,
        }
    }

    /// Current negotiation state.
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Requests still waiting for ACK or NAK.
    pub fn pending_requests(&self) -> &[String] {
        &self.requests
    }

    /// Number of parties holding negotiation open.
    pub fn wait_count(&self) -> u32 {
        self.wait_count
    }

    /// Whether `CAP END` has been sent.
    pub fn is_done(&self) -> bool {
        self.finished
    }

    /// Every capability the server advertised.
    pub fn advertised(&self) -> &HashMap<String, Option<String>> {
        &self.caps
    }

    /// `None` if not advertised, `Some(None)` for a flag, `Some(Some(v))`
    /// for `name=v`.
    pub fn lookup(&self, name: &str) -> Option<Option<&str>> {
        self.caps.get(name).map(|v| v.as_deref())
    }

    /// Send `CAP LS 302`.
    pub fn start<H: NegotiationHost + ?Sized>(&mut self, host: &mut H) {
        host.send(Command::CapLs(Some(NegotiationVersion::V302)));
        self.state = NegotiationState::AwaitingList;
    }

    /// Request `name` exactly as given. Multiple capabilities may be joined
    /// with spaces and are then acknowledged as one string.
    pub fn request<H: NegotiationHost + ?Sized>(&mut self, name: &str, host: &mut H) -> Result<()> {
        if self.finished {
            return Err(SessionError::InvalidState(
                "capability requested after negotiation finished",
            ));
        }

        debug!(capability = name, "requesting capability");
        self.requests.push(name.to_owned());
        host.send(Command::CapReq(name.to_owned()));
        Ok(())
    }

    /// Request `name` if the server advertised it. Returns whether it did.
    pub fn request_if_available<H: NegotiationHost + ?Sized>(
        &mut self,
        name: &str,
        host: &mut H,
    ) -> Result<bool> {
        if self.lookup(name).is_none() {
            return Ok(false);
        }
        self.request(name, host)?;
        Ok(true)
    }

    /// Hold `CAP END` until a matching [`remove_wait`](Self::remove_wait).
    pub fn add_wait(&mut self) {
        self.wait_count += 1;
    }

    /// Release one wait and finish if nothing else is outstanding.
    pub fn remove_wait<H: NegotiationHost + ?Sized>(&mut self, host: &mut H) {
        match self.wait_count.checked_sub(1) {
            Some(count) => self.wait_count = count,
            None => warn!("capability wait released more times than it was taken"),
        }
        self.maybe_finish(host);
    }

    /// Handle a server `CAP` message. `params` are the full message params:
    /// target, subcommand, then subcommand arguments.
    pub fn handle_message<H: NegotiationHost + ?Sized>(
        &mut self,
        params: &[String],
        host: &mut H,
    ) -> Result<()> {
        let [_target, subcommand, args @ ..] = params else {
            return Err(SessionError::ProtocolViolation(format!(
                "CAP with {} parameters",
                params.len()
            )));
        };

        match subcommand.as_str() {
            "LS" | "LIST" => self.handle_list(args, host),
            "ACK" => self.handle_ack_nak(args, true, host),
            "NAK" => self.handle_ack_nak(args, false, host),
            "NEW" => {
                let names = split_tokens(args);
                for token in &names {
                    self.insert_token(token);
                }
                host.added(&names);
                Ok(())
            }
            "DEL" => {
                let names = split_tokens(args);
                for name in &names {
                    self.caps.remove(name);
                }
                host.removed(&names);
                Ok(())
            }
            other => Err(SessionError::ProtocolViolation(format!(
                "no handler for CAP subcommand {}",
                other
            ))),
        }
    }

    fn handle_list<H: NegotiationHost + ?Sized>(&mut self, args: &[String], host: &mut H) -> Result<()> {
        let (more, fragment) = match args {
            [star, fragment, ..] if star == "*" => (true, fragment.as_str()),
            [fragment, ..] => (false, fragment.as_str()),
            [] => (false, ""),
        };

        for token in fragment.split(' ').filter(|t| !t.is_empty()) {
            self.insert_token(token);
        }

        if more || self.ready_fired {
            return Ok(());
        }

        self.ready_fired = true;
        self.state = NegotiationState::Negotiating;
        debug!(count = self.caps.len(), "capability listing complete");

        host.ready(self)?;
        self.maybe_finish(host);
        Ok(())
    }

    fn handle_ack_nak<H: NegotiationHost + ?Sized>(
        &mut self,
        args: &[String],
        ack: bool,
        host: &mut H,
    ) -> Result<()> {
        let joined = args.join(" ");

        let Some(index) = self.requests.iter().position(|r| *r == joined) else {
            return Err(SessionError::ProtocolViolation(format!(
                "received CAP {} for unknown capability {}",
                if ack { "ACK" } else { "NAK" },
                joined
            )));
        };
        self.requests.remove(index);

        let result = if ack {
            host.acknowledged(self, &joined)
        } else {
            host.rejected(self, &joined)
        };

        self.maybe_finish(host);
        result
    }

    fn insert_token(&mut self, token: &str) {
        match token.split_once('=') {
            Some((key, value)) => self.caps.insert(key.to_owned(), Some(value.to_owned())),
            None => self.caps.insert(token.to_owned(), None),
        };
    }

    /// Finish once: listing complete, nothing pending, no waits.
    fn maybe_finish<H: NegotiationHost + ?Sized>(&mut self, host: &mut H) {
        if self.finished
            || !self.ready_fired
            || !self.requests.is_empty()
            || self.wait_count > 0
        {
            return;
        }

        self.finished = true;
        self.state = NegotiationState::Finishing;
        host.send(Command::CapEnd);
        self.state = NegotiationState::Done;
        host.done();
    }
}

/// Split CAP arguments into whitespace-separated tokens.
fn split_tokens(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.split_whitespace())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<String>,
        ready: u32,
        acked: Vec<String>,
        nakked: Vec<String>,
        added: Vec<String>,
        removed: Vec<String>,
        done: u32,
        ready_requests: Vec<&'static str>,
        wait_on_ack: bool,
    }

    impl NegotiationHost for Recorder {
        fn send(&mut self, command: Command) {
            self.sent.push(command.to_string());
        }

        fn ready(&mut self, caps: &mut Capabilities) -> Result<()> {
            self.ready += 1;
            for name in self.ready_requests.clone() {
                caps.request_if_available(name, self)?;
            }
            Ok(())
        }

        fn acknowledged(&mut self, caps: &mut Capabilities, name: &str) -> Result<()> {
            self.acked.push(name.to_owned());
            if self.wait_on_ack {
                caps.add_wait();
            }
            Ok(())
        }

        fn rejected(&mut self, _caps: &mut Capabilities, name: &str) -> Result<()> {
            self.nakked.push(name.to_owned());
            Ok(())
        }

        fn added(&mut self, names: &[String]) {
            self.added.extend_from_slice(names);
        }

        fn removed(&mut self, names: &[String]) {
            self.removed.extend_from_slice(names);
        }

        fn done(&mut self) {
            self.done += 1;
        }
    }

    fn params(line: &str) -> Vec<String> {
        crate::message::ParsedMessage::parse(line).unwrap().params
    }

    fn feed(caps: &mut Capabilities, host: &mut Recorder, line: &str) -> Result<()> {
        caps.handle_message(&params(line), host)
    }

    fn count(host: &Recorder, line: &str) -> usize {
        host.sent.iter().filter(|l| *l == line).count()
    }

    #[test]
    fn test_capability_as_ref() {
        assert_eq!(Capability::CapNotify.as_ref(), "cap-notify");
        assert_eq!(Capability::from("sasl"), Capability::Sasl);
        assert_eq!(
            Capability::from("draft/x"),
            Capability::Custom("draft/x".to_string())
        );
    }

    #[test]
    fn test_start_sends_ls_302() {
        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        caps.start(&mut host);
        assert_eq!(host.sent, vec!["CAP LS 302"]);
        assert_eq!(caps.state(), NegotiationState::AwaitingList);
    }

    #[test]
    fn test_multiline_ls_fires_ready_once() {
        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        caps.start(&mut host);

        feed(&mut caps, &mut host, "CAP * LS * :cap-a cap-b=val").unwrap();
        assert_eq!(host.ready, 0);
        assert_eq!(caps.state(), NegotiationState::AwaitingList);

        feed(&mut caps, &mut host, "CAP nick LS :cap-c").unwrap();
        assert_eq!(host.ready, 1);
        assert_eq!(caps.advertised().len(), 3);
        assert_eq!(caps.lookup("cap-a"), Some(None));
        assert_eq!(caps.lookup("cap-b"), Some(Some("val")));
        assert_eq!(caps.lookup("cap-c"), Some(None));

        // Nothing requested, so negotiation ends right away.
        assert_eq!(count(&host, "CAP END"), 1);
        assert_eq!(host.done, 1);
        assert_eq!(caps.state(), NegotiationState::Done);

        feed(&mut caps, &mut host, "CAP nick LIST :cap-a").unwrap();
        assert_eq!(host.ready, 1);
        assert_eq!(count(&host, "CAP END"), 1);
    }

    #[test]
    fn test_ack_and_nak_drain_requests() {
        let mut caps = Capabilities::new();
        let mut host = Recorder {
            ready_requests: vec!["cap-notify", "message-tags", "missing"],
            ..Recorder::default()
        };
        caps.start(&mut host);
        feed(&mut caps, &mut host, "CAP * LS :cap-notify message-tags").unwrap();

        assert_eq!(caps.pending_requests(), ["cap-notify", "message-tags"]);
        assert_eq!(caps.state(), NegotiationState::Negotiating);

        feed(&mut caps, &mut host, "CAP nick ACK :cap-notify").unwrap();
        assert_eq!(count(&host, "CAP END"), 0);

        feed(&mut caps, &mut host, "CAP nick NAK :message-tags").unwrap();
        assert_eq!(host.acked, vec!["cap-notify"]);
        assert_eq!(host.nakked, vec!["message-tags"]);
        assert!(caps.pending_requests().is_empty());
        assert_eq!(count(&host, "CAP END"), 1);
    }

    #[test]
    fn test_unrequested_ack_is_protocol_violation() {
        let mut caps = Capabilities::new();
        let mut host = Recorder {
            ready_requests: vec!["sasl"],
            ..Recorder::default()
        };
        feed(&mut caps, &mut host, "CAP * LS :sasl").unwrap();

        let err = feed(&mut caps, &mut host, "CAP nick ACK :echo-message").unwrap_err();
        assert!(matches!(err, SessionError::ProtocolViolation(_)));
        assert_eq!(caps.pending_requests(), ["sasl"]);
        assert_eq!(count(&host, "CAP END"), 0);
    }

    #[test]
    fn test_multi_capability_request_matches_joined() {
        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        feed(&mut caps, &mut host, "CAP * LS :cap-a cap-b").unwrap();
        assert_eq!(count(&host, "CAP END"), 1);

        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        caps.add_wait();
        feed(&mut caps, &mut host, "CAP * LS :cap-a cap-b").unwrap();
        caps.request("cap-a cap-b", &mut host).unwrap();
        assert_eq!(host.sent.last().map(String::as_str), Some("CAP REQ :cap-a cap-b"));

        feed(&mut caps, &mut host, "CAP nick ACK :cap-a cap-b").unwrap();
        assert_eq!(host.acked, vec!["cap-a cap-b"]);
        assert!(caps.pending_requests().is_empty());
    }

    #[test]
    fn test_wait_holds_cap_end() {
        let mut caps = Capabilities::new();
        let mut host = Recorder {
            ready_requests: vec!["sasl"],
            wait_on_ack: true,
            ..Recorder::default()
        };
        feed(&mut caps, &mut host, "CAP * LS :sasl=PLAIN").unwrap();
        feed(&mut caps, &mut host, "CAP nick ACK :sasl").unwrap();

        assert!(caps.pending_requests().is_empty());
        assert_eq!(caps.wait_count(), 1);
        assert_eq!(count(&host, "CAP END"), 0);

        caps.remove_wait(&mut host);
        assert_eq!(count(&host, "CAP END"), 1);
        assert_eq!(host.done, 1);

        // A stray release must not finish twice.
        caps.remove_wait(&mut host);
        assert_eq!(count(&host, "CAP END"), 1);
        assert_eq!(caps.wait_count(), 0);
    }

    #[test]
    fn test_wait_taken_before_listing() {
        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        caps.add_wait();
        caps.remove_wait(&mut host);
        assert_eq!(count(&host, "CAP END"), 0);

        feed(&mut caps, &mut host, "CAP * LS :").unwrap();
        assert_eq!(count(&host, "CAP END"), 1);
    }

    #[test]
    fn test_request_after_done_is_rejected() {
        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        feed(&mut caps, &mut host, "CAP * LS :a").unwrap();
        assert!(caps.is_done());

        let err = caps.request("a", &mut host).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));
        assert!(caps.pending_requests().is_empty());
    }

    #[test]
    fn test_new_and_del() {
        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        feed(&mut caps, &mut host, "CAP * LS :a b").unwrap();

        feed(&mut caps, &mut host, "CAP nick NEW :c d=1").unwrap();
        assert_eq!(host.added, vec!["c", "d=1"]);
        assert_eq!(caps.lookup("d"), Some(Some("1")));

        feed(&mut caps, &mut host, "CAP nick DEL :a c").unwrap();
        assert_eq!(host.removed, vec!["a", "c"]);
        assert_eq!(caps.lookup("a"), None);
        assert_eq!(caps.lookup("b"), Some(None));
        assert_eq!(count(&host, "CAP END"), 1);
    }

    #[test]
    fn test_malformed_cap() {
        let mut caps = Capabilities::new();
        let mut host = Recorder::default();
        assert!(matches!(
            feed(&mut caps, &mut host, "CAP nick").unwrap_err(),
            SessionError::ProtocolViolation(_)
        ));
        assert!(matches!(
            feed(&mut caps, &mut host, "CAP nick BOGUS :x").unwrap_err(),
            SessionError::ProtocolViolation(_)
        ));
    }
}
