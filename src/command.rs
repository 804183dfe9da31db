//! Outgoing client commands.
//!
//! Every line the engine writes is built from a [`Command`] so the wire
//! format lives in one place.

use std::fmt::{self, Write};

use crate::caps::NegotiationVersion;

/// `CAP` subcommands sent by a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapSubCommand {
    /// List the server's capabilities.
    LS,
    /// List the capabilities enabled on this connection.
    LIST,
    /// Request capabilities.
    REQ,
    /// End negotiation.
    END,
}

impl CapSubCommand {
    /// The subcommand as it appears on the wire.
    pub fn to_str(self) -> &'static str {
        match self {
            Self::LS => "LS",
            Self::LIST => "LIST",
            Self::REQ => "REQ",
            Self::END => "END",
        }
    }
}

/// A command this client can send.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// `CAP LS [version]`
    CapLs(Option<NegotiationVersion>),
    /// `CAP REQ :capabilities`
    CapReq(String),
    /// `CAP LIST`
    CapList,
    /// `CAP END`
    CapEnd,
    /// `PASS password`
    PASS(String),
    /// `USER ident 0 * :realname`
    USER(String, String),
    /// `NICK nickname`
    NICK(String),
    /// `PING token`
    PING(String),
    /// `PONG [token]`
    PONG(Option<String>),
    /// `PRIVMSG target :text`
    PRIVMSG(String, String),
    /// `AUTHENTICATE mechanism|payload|+`
    AUTHENTICATE(String),
    /// `QUIT [:message]`
    QUIT(Option<String>),
    /// `JOIN channel`
    JOIN(String),
    /// Any other command. The last argument gets a `:` only when it needs one.
    Raw(String, Vec<String>),
}

/// Write a command with arguments directly to a formatter.
/// The last argument is treated as trailing and gets a `:` prefix if needed.
fn write_cmd(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;

    let Some((trailing, middle_params)) = args.split_last() else {
        return Ok(());
    };

    for param in middle_params {
        f.write_char(' ')?;
        f.write_str(param)?;
    }

    f.write_char(' ')?;
    if crate::message::needs_colon_prefix(trailing) {
        f.write_char(':')?;
    }
    f.write_str(trailing)
}

/// Write a command with a freeform (always colon-prefixed) trailing argument.
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    match args.split_last() {
        Some((suffix, middle)) => {
            f.write_str(cmd)?;
            for arg in middle {
                f.write_char(' ')?;
                f.write_str(arg)?;
            }
            f.write_str(" :")?;
            f.write_str(suffix)
        }
        None => f.write_str(cmd),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CapLs(Some(v)) => {
                write_cmd(f, "CAP", &[CapSubCommand::LS.to_str(), &v.version().to_string()])
            }
            Command::CapLs(None) => write_cmd(f, "CAP", &[CapSubCommand::LS.to_str()]),
            Command::CapReq(caps) => {
                write_cmd_freeform(f, "CAP", &[CapSubCommand::REQ.to_str(), caps])
            }
            Command::CapList => write_cmd(f, "CAP", &[CapSubCommand::LIST.to_str()]),
            Command::CapEnd => write_cmd(f, "CAP", &[CapSubCommand::END.to_str()]),
            Command::PASS(p) => write_cmd(f, "PASS", &[p]),
            Command::USER(ident, real) => write_cmd_freeform(f, "USER", &[ident, "0", "*", real]),
            Command::NICK(n) => write_cmd(f, "NICK", &[n]),
            Command::PING(t) => write_cmd(f, "PING", &[t]),
            Command::PONG(Some(t)) => write_cmd(f, "PONG", &[t]),
            Command::PONG(None) => write_cmd(f, "PONG", &[]),
            Command::PRIVMSG(t, m) => write_cmd_freeform(f, "PRIVMSG", &[t, m]),
            Command::AUTHENTICATE(d) => write_cmd(f, "AUTHENTICATE", &[d]),
            Command::QUIT(Some(m)) => write_cmd_freeform(f, "QUIT", &[m]),
            Command::QUIT(None) => write_cmd(f, "QUIT", &[]),
            Command::JOIN(c) => write_cmd(f, "JOIN", &[c]),
            Command::Raw(cmd, args) => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                write_cmd(f, cmd, &args)
            }
        }
    }
}
