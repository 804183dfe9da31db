//! Default handlers installed on every session.

use chrono::Local;
use tracing::debug;

use super::{ConversationKey, SessionContext};
use crate::caps::NegotiationHost;
use crate::command::Command;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SessionError};
use crate::event::{IncomingMessage, SessionEvent};
use crate::message::ParsedMessage;

pub(super) fn install(dispatcher: &mut Dispatcher<SessionContext>) {
    dispatcher.register("CAP", handle_cap);
    dispatcher.register("PING", handle_ping);
    dispatcher.register("PRIVMSG", handle_chat);
    dispatcher.register("NOTICE", handle_chat);
    super::sasl::install(dispatcher);
    dispatcher.set_fallback(handle_unknown);
}

fn handle_cap(msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    let SessionContext { caps, core } = ctx;
    caps.handle_message(&msg.params, core)
}

fn handle_ping(msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    let token = msg.param(0).map(str::to_owned);
    ctx.core.send(Command::PONG(token));
    Ok(())
}

/// `PRIVMSG` and `NOTICE`.
fn handle_chat(msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    let [target, text] = msg.params.as_slice() else {
        return Err(SessionError::ProtocolViolation(format!(
            "{} with {} parameters",
            msg.command,
            msg.params.len()
        )));
    };
    let Some(source) = msg.source.as_deref() else {
        return Err(SessionError::ProtocolViolation(format!(
            "{} without a source",
            msg.command
        )));
    };

    let core = &mut ctx.core;

    let (contact, new_contact) = core.roster.contact_mut(source);
    contact.messages += 1;
    if new_contact {
        core.emit(SessionEvent::ContactAdded(source.to_owned()));
    }

    let key = ConversationKey::for_message(source, target);
    let (conversation, new_conversation) = core.roster.conversation_mut(&key);
    conversation.messages += 1;
    if new_conversation {
        core.emit(SessionEvent::ConversationCreated(key.clone()));
    }

    let id = msg
        .tag("msgid")
        .filter(|id| !id.is_empty())
        .map(str::to_owned);

    core.emit(SessionEvent::MessageReceived(IncomingMessage {
        conversation: key,
        author: source.to_owned(),
        contents: text.clone(),
        timestamp: Local::now(),
        notify: msg.command == "NOTICE",
        id,
    }));
    Ok(())
}

fn handle_unknown(msg: &ParsedMessage, _ctx: &mut SessionContext) -> Result<()> {
    debug!(
        command = %msg.command,
        source = msg.source.as_deref().unwrap_or(""),
        params = ?msg.params,
        "unhandled message"
    );
    Ok(())
}
