//! SASL exchange driven over `AUTHENTICATE` and the 900-908 numerics.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>

use tracing::{debug, info, warn};

use super::{SessionContext, SessionCore};
use crate::caps::{Capabilities, Capability, NegotiationHost};
use crate::command::Command;
use crate::dispatch::Dispatcher;
use crate::error::{MechanismError, Result, SessionError};
use crate::event::SessionEvent;
use crate::message::ParsedMessage;
use crate::sasl::{decode_base64, encode_response, MechanismContext, SaslMechanism, SaslState, SASL_CHUNK_SIZE};

const RPL_LOGGEDIN: &str = "900";
const RPL_LOGGEDOUT: &str = "901";
const ERR_NICKLOCKED: &str = "902";
const RPL_SASLSUCCESS: &str = "903";
const ERR_SASLFAIL: &str = "904";
const ERR_SASLTOOLONG: &str = "905";
const ERR_SASLABORTED: &str = "906";
const ERR_SASLALREADY: &str = "907";
const RPL_SASLMECHS: &str = "908";

/// SASL state for one connection, created when `sasl` is acknowledged.
#[derive(Debug)]
pub struct SaslSession {
    mechanisms: MechanismContext,
    state: SaslState,
    server_in_buffer: String,
}

impl SaslSession {
    fn new(mechanisms: MechanismContext) -> Self {
        Self {
            mechanisms,
            state: SaslState::NotStarted,
            server_in_buffer: String::new(),
        }
    }

    /// Progress of the exchange.
    pub fn state(&self) -> &SaslState {
        &self.state
    }

    /// Mechanism currently being tried.
    pub fn mechanism(&self) -> Option<&SaslMechanism> {
        self.mechanisms.current()
    }

    pub(super) fn set_state(&mut self, state: SaslState) {
        self.state = state;
    }

    /// Give up on the current mechanism and pick the next one.
    fn attempt(&mut self) -> Result<SaslMechanism> {
        if let Some(failed) = self.mechanisms.current() {
            info!(mechanism = %failed, "SASL '{}' mechanism failed", failed);
        }

        self.state = SaslState::MechanismSelection;
        let Some(mechanism) = self.mechanisms.next() else {
            let reason = "No valid SASL mechanisms found";
            self.state = SaslState::Failed(reason.to_owned());
            return Err(SessionError::AuthenticationImpossible(reason.to_owned()));
        };

        info!(mechanism = %mechanism, "trying SASL '{}' mechanism", mechanism);
        self.server_in_buffer.clear();
        self.state = SaslState::Exchanging(mechanism.clone());
        Ok(mechanism)
    }

    /// Add one `AUTHENTICATE` argument to the buffer. Returns the decoded
    /// server message once it is complete.
    fn feed(&mut self, payload: &str) -> std::result::Result<Option<Vec<u8>>, MechanismError> {
        if payload != "+" {
            self.server_in_buffer.push_str(payload);
            if payload.len() >= SASL_CHUNK_SIZE {
                return Ok(None);
            }
        }

        let decoded = decode_base64(&self.server_in_buffer);
        self.server_in_buffer.clear();
        decoded.map(Some).map_err(|_| MechanismError::InvalidEncoding)
    }
}

impl SessionCore {
    /// `sasl` was acknowledged: hold negotiation open and try the first
    /// mechanism.
    pub(super) fn begin_sasl(&mut self, caps: &mut Capabilities) -> Result<()> {
        caps.add_wait();

        let allowed = self
            .config
            .sasl_mechanisms()
            .map(str::to_owned)
            .or_else(|| caps.lookup(Capability::Sasl.as_ref()).flatten().map(str::to_owned));

        let mut mechanisms = MechanismContext::new(self.config.sasl_username())
            .with_allowed(allowed.as_deref())
            .with_tls(self.config.use_tls)
            .with_allow_clear_text(self.config.plain_sasl_in_clear);
        if let Some(password) = self.config.password() {
            mechanisms = mechanisms.with_password(password);
        }

        self.sasl = Some(SaslSession::new(mechanisms));
        self.attempt_sasl()
    }

    fn attempt_sasl(&mut self) -> Result<()> {
        let sasl = self.sasl_mut(ERR_SASLFAIL)?;
        let mechanism = sasl.attempt()?;
        self.send(Command::AUTHENTICATE(mechanism.as_str().to_owned()));
        Ok(())
    }

    fn sasl_mut(&mut self, numeric: &str) -> Result<&mut SaslSession> {
        self.sasl.as_mut().ok_or_else(|| {
            SessionError::ProtocolViolation(format!(
                "{} received with no SASL data present",
                numeric_name(numeric)
            ))
        })
    }
}

fn numeric_name(numeric: &str) -> &str {
    match numeric {
        RPL_LOGGEDIN => "RPL_LOGGEDIN",
        RPL_LOGGEDOUT => "RPL_LOGGEDOUT",
        ERR_NICKLOCKED => "ERR_NICKLOCKED",
        RPL_SASLSUCCESS => "RPL_SASLSUCCESS",
        ERR_SASLFAIL => "ERR_SASLFAIL",
        ERR_SASLTOOLONG => "ERR_SASLTOOLONG",
        ERR_SASLABORTED => "ERR_SASLABORTED",
        ERR_SASLALREADY => "ERR_SASLALREADY",
        RPL_SASLMECHS => "RPL_SASLMECHS",
        other => other,
    }
}

pub(super) fn install(dispatcher: &mut Dispatcher<SessionContext>) {
    dispatcher.register("AUTHENTICATE", handle_authenticate);
    dispatcher.register(RPL_LOGGEDIN, handle_logged_in);
    dispatcher.register(RPL_LOGGEDOUT, handle_logged_out);
    dispatcher.register(ERR_NICKLOCKED, handle_nick_locked);
    dispatcher.register(RPL_SASLSUCCESS, handle_success);
    dispatcher.register(ERR_SASLFAIL, handle_fail);
    dispatcher.register(ERR_SASLTOOLONG, handle_too_long);
    dispatcher.register(ERR_SASLABORTED, handle_aborted);
    dispatcher.register(ERR_SASLALREADY, handle_already);
    dispatcher.register(RPL_SASLMECHS, handle_mechanisms);
}

fn handle_authenticate(msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    let [payload] = msg.params.as_slice() else {
        return Err(SessionError::ProtocolViolation(format!(
            "AUTHENTICATE with {} parameters",
            msg.params.len()
        )));
    };

    let core = &mut ctx.core;
    let sasl = core.sasl.as_mut().ok_or_else(|| {
        SessionError::ProtocolViolation("AUTHENTICATE received with no SASL data present".into())
    })?;
    if !matches!(sasl.state, SaslState::Exchanging(_)) {
        return Err(SessionError::ProtocolViolation(
            "AUTHENTICATE received outside of an exchange".into(),
        ));
    }

    let Some(input) = sasl.feed(payload)? else {
        return Ok(());
    };
    let output = sasl.mechanisms.step(&input)?;

    for chunk in encode_response(&output) {
        core.send(Command::AUTHENTICATE(chunk));
    }
    Ok(())
}

fn handle_logged_in(msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    ctx.core.sasl_mut(RPL_LOGGEDIN)?;
    info!(
        account = msg.param(2).unwrap_or(""),
        "logged in"
    );
    Ok(())
}

fn handle_logged_out(_msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    ctx.core.sasl_mut(RPL_LOGGEDOUT)?;
    warn!("Server sent SASL logged out");
    Ok(())
}

fn handle_nick_locked(msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    let sasl = ctx.core.sasl_mut(ERR_NICKLOCKED)?;
    let reason = format!("Nick name is locked: {}", msg.params.join(" "));
    sasl.state = SaslState::Failed(reason.clone());
    Err(SessionError::AuthenticationImpossible(reason))
}

fn handle_success(_msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    let SessionContext { caps, core } = ctx;
    let sasl = core.sasl_mut(RPL_SASLSUCCESS)?;
    if sasl.state.is_success() {
        warn!("duplicate RPL_SASLSUCCESS ignored");
        return Ok(());
    }

    let mechanism = sasl
        .mechanism()
        .cloned()
        .unwrap_or_else(|| SaslMechanism::Unknown(String::new()));
    sasl.state = SaslState::Succeeded;
    info!(
        mechanism = %mechanism,
        "successfully authenticated with SASL '{}' mechanism.", mechanism
    );

    core.emit(SessionEvent::SaslSucceeded(mechanism));
    caps.remove_wait(core);
    Ok(())
}

fn handle_fail(_msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    ctx.core.attempt_sasl()
}

fn handle_too_long(_msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    ctx.core.sasl_mut(ERR_SASLTOOLONG)?;
    debug!("server reported SASL message too long");
    Ok(())
}

fn handle_aborted(_msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    ctx.core.sasl_mut(ERR_SASLABORTED)?;
    warn!("The server claims we aborted SASL authentication.");
    Ok(())
}

fn handle_already(_msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    ctx.core.sasl_mut(ERR_SASLALREADY)?;
    warn!("server reports we already authenticated with SASL");
    Ok(())
}

fn handle_mechanisms(msg: &ParsedMessage, ctx: &mut SessionContext) -> Result<()> {
    ctx.core.sasl_mut(RPL_SASLMECHS)?;
    debug!(
        mechanisms = msg.param(1).unwrap_or(""),
        "server SASL mechanisms"
    );
    Ok(())
}
