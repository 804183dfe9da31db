//! Command dispatch.
//!
//! A [`Dispatcher`] routes each [`ParsedMessage`] to the handler registered
//! for its command, or to the fallback handler when none matches.

use std::collections::HashMap;

use crate::error::{Result, SessionError};
use crate::message::ParsedMessage;

/// Handles one command for a connection context `C`.
pub trait MessageHandler<C>: Send + Sync {
    /// Handle one message. The result is returned to the dispatcher's caller
    /// unchanged.
    fn handle(&self, message: &ParsedMessage, context: &mut C) -> Result<()>;
}

impl<C, F> MessageHandler<C> for F
where
    F: Fn(&ParsedMessage, &mut C) -> Result<()> + Send + Sync,
{
    fn handle(&self, message: &ParsedMessage, context: &mut C) -> Result<()> {
        self(message, context)
    }
}

/// Table from command name to handler.
pub struct Dispatcher<C> {
    handlers: HashMap<String, Box<dyn MessageHandler<C>>>,
    fallback: Option<Box<dyn MessageHandler<C>>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    /// An empty table with no fallback.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Register `handler` for `command`, replacing any previous one.
    pub fn register<H>(&mut self, command: impl Into<String>, handler: H)
    where
        H: MessageHandler<C> + 'static,
    {
        self.handlers.insert(command.into(), Box::new(handler));
    }

    /// Handler used when no specific one is registered.
    pub fn set_fallback<H>(&mut self, handler: H)
    where
        H: MessageHandler<C> + 'static,
    {
        self.fallback = Some(Box::new(handler));
    }

    /// Whether `command` has a specific handler.
    pub fn is_registered(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Route `message` by its command. Lookup is case-sensitive.
    pub fn dispatch(&self, message: &ParsedMessage, context: &mut C) -> Result<()> {
        let handler = self
            .handlers
            .get(message.command.as_str())
            .or(self.fallback.as_ref())
            .ok_or_else(|| SessionError::NoHandler(message.command.clone()))?;

        handler.handle(message, context)
    }

    /// Parse `line` and dispatch it.
    pub fn parse_and_dispatch(&self, line: &str, context: &mut C) -> Result<()> {
        let message = ParsedMessage::parse(line)?;
        self.dispatch(&message, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Seen {
        calls: Vec<String>,
    }

    fn record(tag: &'static str) -> impl Fn(&ParsedMessage, &mut Seen) -> Result<()> {
        move |msg, seen| {
            seen.calls.push(format!("{}:{}", tag, msg.command));
            Ok(())
        }
    }

    #[test]
    fn test_routes_to_registered_handler() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("PING", record("ping"));
        dispatcher.set_fallback(record("fallback"));

        let mut seen = Seen::default();
        dispatcher.parse_and_dispatch("PING :x", &mut seen).unwrap();
        dispatcher.parse_and_dispatch("ping :x", &mut seen).unwrap();

        assert_eq!(seen.calls, vec!["ping:PING", "fallback:ping"]);
    }

    #[test]
    fn test_no_handler_without_fallback() {
        let dispatcher: Dispatcher<Seen> = Dispatcher::new();
        let mut seen = Seen::default();

        let err = dispatcher
            .parse_and_dispatch(":server 001 nick :hi", &mut seen)
            .unwrap_err();
        assert!(matches!(err, SessionError::NoHandler(ref c) if c == "001"));
    }

    #[test]
    fn test_handler_errors_propagate() {
        let mut dispatcher: Dispatcher<Seen> = Dispatcher::new();
        dispatcher.set_fallback(|_: &ParsedMessage, _: &mut Seen| -> Result<()> {
            Err(SessionError::ProtocolViolation("nope".into()))
        });

        let mut seen = Seen::default();
        let err = dispatcher.parse_and_dispatch("FOO", &mut seen).unwrap_err();
        assert!(matches!(err, SessionError::ProtocolViolation(_)));
    }

    #[test]
    fn test_parse_errors_surface() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_fallback(record("fallback"));

        let mut seen = Seen::default();
        let err = dispatcher.parse_and_dispatch(":only-source", &mut seen).unwrap_err();
        assert!(matches!(err, SessionError::Parse(_)));
        assert!(seen.calls.is_empty());
    }

    #[test]
    fn test_trait_object_handler() {
        struct Counter;
        impl MessageHandler<Seen> for Counter {
            fn handle(&self, msg: &ParsedMessage, seen: &mut Seen) -> Result<()> {
                seen.calls.push(msg.params.len().to_string());
                Ok(())
            }
        }

        let mut dispatcher = Dispatcher::new();
        dispatcher.register("MODE", Counter);
        assert!(dispatcher.is_registered("MODE"));

        let mut seen = Seen::default();
        dispatcher
            .parse_and_dispatch(":SomeOp MODE #channel +oo SomeUser :AnotherUser", &mut seen)
            .unwrap();
        assert_eq!(seen.calls, vec!["4"]);
    }
}
