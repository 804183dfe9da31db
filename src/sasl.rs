//! SASL mechanisms for IRC.
//!
//! This module holds the payload encoders and the [`MechanismContext`] that
//! picks which mechanism to try next and runs its challenge/response steps.
//! The `AUTHENTICATE` exchange itself is driven by the session.
//!
//! # Supported Mechanisms
//!
//! - **EXTERNAL**: Certificate-based authentication, only offered over TLS
//! - **SCRAM-SHA-256**: Challenge-response authentication (RFC 7677), with the `scram` feature
//! - **PLAIN**: Simple username/password authentication (RFC 4616), only over
//!   TLS unless clear text is explicitly allowed
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>
//! - RFC 7677 (SCRAM-SHA-256): <https://tools.ietf.org/html/rfc7677>
//!
//! # Example
//!
//! ```
//! use ircv3_engine::sasl::{MechanismContext, SaslMechanism};
//!
//! let mut ctx = MechanismContext::new("alice")
//!     .with_password("hunter2")
//!     .with_tls(true)
//!     .with_allowed(Some("PLAIN"));
//!
//! assert_eq!(ctx.next(), Some(SaslMechanism::Plain));
//! let payload = ctx.step(b"").unwrap();
//! assert_eq!(payload, b"\0alice\0hunter2");
//! assert_eq!(ctx.next(), None);
//! ```

#[cfg(feature = "scram")]
mod scram;

#[cfg(feature = "scram")]
pub use self::scram::ScramClient;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::MechanismError;

/// Maximum length of a single SASL message chunk (400 bytes).
///
/// Payloads that exceed this length are split into multiple
/// AUTHENTICATE commands.
pub const SASL_CHUNK_SIZE: usize = 400;

/// SASL authentication mechanisms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SaslMechanism {
    /// PLAIN mechanism (RFC 4616) - simple username/password.
    Plain,
    /// EXTERNAL mechanism - uses TLS client certificate.
    External,
    /// SCRAM-SHA-256 mechanism (RFC 7677).
    ScramSha256,
    /// Unknown or unsupported mechanism.
    Unknown(String),
}

impl SaslMechanism {
    /// Parse a mechanism name string.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "EXTERNAL" => Self::External,
            "SCRAM-SHA-256" => Self::ScramSha256,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Returns the canonical name of this mechanism.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::Unknown(s) => s,
        }
    }

    /// Whether this build can run the mechanism.
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Plain | Self::External => true,
            Self::ScramSha256 => cfg!(feature = "scram"),
            Self::Unknown(_) => false,
        }
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preference order used by [`MechanismContext::next`].
const PRIORITY: [SaslMechanism; 3] = [
    SaslMechanism::External,
    SaslMechanism::ScramSha256,
    SaslMechanism::Plain,
];

/// Parse a mechanism list such as the `sasl=` capability value or an
/// `RPL_SASLMECHS` (908) parameter. Commas and whitespace both separate.
pub fn parse_mechanisms(list: &str) -> Vec<SaslMechanism> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(SaslMechanism::parse)
        .collect()
}

/// Raw PLAIN payload: `authzid NUL authcid NUL password`.
pub fn plain_payload(authzid: &str, authcid: &str, password: &str) -> Vec<u8> {
    format!("{}\0{}\0{}", authzid, authcid, password).into_bytes()
}

/// Encode credentials for the PLAIN mechanism with an empty authzid.
///
/// ```
/// use ircv3_engine::sasl::encode_plain;
///
/// assert_eq!(encode_plain("testuser", "testpass"), "AHRlc3R1c2VyAHRlc3RwYXNz");
/// ```
pub fn encode_plain(username: &str, password: &str) -> String {
    BASE64.encode(plain_payload("", username, password))
}

/// Encode a client payload as `AUTHENTICATE` arguments.
///
/// Empty output becomes a single `+`. Longer output is split into
/// [`SASL_CHUNK_SIZE`] pieces, and a final `+` follows when the last piece
/// is exactly full.
pub fn encode_response(payload: &[u8]) -> Vec<String> {
    if payload.is_empty() {
        return vec!["+".to_owned()];
    }

    let encoded = BASE64.encode(payload);
    let mut chunks: Vec<String> = chunk_response(&encoded).map(str::to_owned).collect();
    if encoded.len() % SASL_CHUNK_SIZE == 0 {
        chunks.push("+".to_owned());
    }
    chunks
}

/// Split an encoded SASL response into chunks for transmission.
pub fn chunk_response(encoded: &str) -> impl Iterator<Item = &str> {
    let mut rest = encoded;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        // Base64 is ASCII so any byte offset is a char boundary.
        let at = rest.len().min(SASL_CHUNK_SIZE);
        let (chunk, tail) = rest.split_at(at);
        rest = tail;
        Some(chunk)
    })
}

/// Decode a base64-encoded SASL challenge. `+` decodes to nothing.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if encoded == "+" {
        return Ok(Vec::new());
    }
    BASE64.decode(encoded)
}

/// Progress of SASL authentication on one connection.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SaslState {
    /// The `sasl` capability hasn't been acknowledged.
    #[default]
    NotStarted,
    /// Choosing the next mechanism.
    MechanismSelection,
    /// `AUTHENTICATE <mechanism>` sent; exchanging payloads.
    Exchanging(SaslMechanism),
    /// Server sent `RPL_SASLSUCCESS`.
    Succeeded,
    /// No mechanism can succeed.
    Failed(String),
}

impl SaslState {
    /// Check if authentication is complete (success or failure).
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// Check if authentication succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[derive(Debug)]
enum ActiveMechanism {
    Plain { sent: bool },
    External { sent: bool },
    #[cfg(feature = "scram")]
    Scram(Box<ScramClient>),
}

/// Chooses mechanisms and runs their steps.
///
/// Each mechanism is tried at most once, in the order EXTERNAL,
/// SCRAM-SHA-256, PLAIN, restricted to the allow-list when one is set.
#[derive(Debug)]
pub struct MechanismContext {
    allowed: Vec<SaslMechanism>,
    tried: Vec<SaslMechanism>,
    current: Option<SaslMechanism>,
    active: Option<ActiveMechanism>,
    username: String,
    password: Option<String>,
    tls: bool,
    allow_clear_text: bool,
}

impl MechanismContext {
    /// Context for `username` with no password, no TLS, and no allow-list.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            allowed: Vec::new(),
            tried: Vec::new(),
            current: None,
            active: None,
            username: username.into(),
            password: None,
            tls: false,
            allow_clear_text: false,
        }
    }

    /// Restrict to the mechanisms in `list`. `None` or an empty list allows
    /// everything.
    pub fn with_allowed(mut self, list: Option<&str>) -> Self {
        self.allowed = list.map(parse_mechanisms).unwrap_or_default();
        self
    }

    /// Password for PLAIN and SCRAM.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Whether the connection is encrypted.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Allow PLAIN over an unencrypted connection.
    pub fn with_allow_clear_text(mut self, allow: bool) -> Self {
        self.allow_clear_text = allow;
        self
    }

    /// The mechanism currently being tried.
    pub fn current(&self) -> Option<&SaslMechanism> {
        self.current.as_ref()
    }

    /// Identity this context authenticates as.
    pub fn username(&self) -> &str {
        &self.username
    }

    fn is_allowed(&self, mechanism: &SaslMechanism) -> bool {
        self.allowed.is_empty() || self.allowed.contains(mechanism)
    }

    fn is_possible(&self, mechanism: &SaslMechanism) -> bool {
        let has_password = self.password.as_deref().is_some_and(|p| !p.is_empty());
        match mechanism {
            SaslMechanism::External => self.tls,
            SaslMechanism::ScramSha256 => mechanism.is_supported() && has_password,
            SaslMechanism::Plain => has_password && (self.tls || self.allow_clear_text),
            SaslMechanism::Unknown(_) => false,
        }
    }

    /// Move to the next usable mechanism, or `None` when all are spent.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<SaslMechanism> {
        self.current = None;
        self.active = None;

        let mechanism = PRIORITY
            .iter()
            .find(|m| !self.tried.contains(m) && self.is_allowed(m) && self.is_possible(m))?
            .clone();

        let active = match mechanism {
            SaslMechanism::External => ActiveMechanism::External { sent: false },
            #[cfg(feature = "scram")]
            SaslMechanism::ScramSha256 => {
                let password = self.password.as_deref().unwrap_or_default();
                match ScramClient::new(&self.username, password) {
                    Ok(client) => ActiveMechanism::Scram(Box::new(client)),
                    Err(e) => {
                        tracing::warn!(error = %e, "unable to start SCRAM-SHA-256");
                        self.tried.push(mechanism);
                        return self.next();
                    }
                }
            }
            _ => ActiveMechanism::Plain { sent: false },
        };

        self.tried.push(mechanism.clone());
        self.current = Some(mechanism.clone());
        self.active = Some(active);
        Some(mechanism)
    }

    /// Feed one decoded server message to the current mechanism and return
    /// the raw client response. An empty response is sent as `+`.
    #[cfg_attr(not(feature = "scram"), allow(unused_variables))]
    pub fn step(&mut self, input: &[u8]) -> Result<Vec<u8>, MechanismError> {
        match self.active.as_mut() {
            None => Err(MechanismError::NoMechanism),
            Some(ActiveMechanism::Plain { sent }) => {
                if *sent {
                    return Err(MechanismError::UnexpectedChallenge("PLAIN"));
                }
                *sent = true;
                let password = self.password.as_deref().unwrap_or_default();
                Ok(plain_payload("", &self.username, password))
            }
            Some(ActiveMechanism::External { sent }) => {
                if *sent {
                    return Err(MechanismError::UnexpectedChallenge("EXTERNAL"));
                }
                *sent = true;
                Ok(Vec::new())
            }
            #[cfg(feature = "scram")]
            Some(ActiveMechanism::Scram(client)) => client.step(input),
        }
    }
}
