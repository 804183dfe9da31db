//! Account configuration for one IRC connection.

use crate::error::SessionError;

/// Default port for TLS connections.
pub const DEFAULT_TLS_PORT: u16 = 6697;
/// Default port for plaintext connections.
pub const DEFAULT_PLAIN_PORT: u16 = 6667;

/// Settings and credentials the session reads while registering.
///
/// Empty strings are treated the same as unset values.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct AccountConfig {
    /// Nickname to register with.
    pub nick: String,
    /// Server host name.
    pub server: String,
    /// Port override. Defaults depend on `use_tls`.
    pub port: Option<u16>,
    /// Connect with TLS.
    pub use_tls: bool,
    /// Sent with `PASS` when set.
    pub server_password: Option<String>,
    /// `USER` ident. Defaults to the nick.
    pub ident: Option<String>,
    /// `USER` real name. Defaults to the nick.
    pub real_name: Option<String>,
    /// SASL authentication identity. Defaults to the nick.
    pub sasl_login_name: Option<String>,
    /// Allowed SASL mechanisms, space or comma separated. Defaults to what
    /// the server advertises.
    pub sasl_mechanisms: Option<String>,
    /// Allow PLAIN over a connection without TLS.
    pub plain_sasl_in_clear: bool,
    /// Authenticate with SASL when the server offers it.
    pub require_password: bool,
    /// Account password used for SASL.
    pub password: Option<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            nick: String::new(),
            server: String::new(),
            port: None,
            use_tls: true,
            server_password: None,
            ident: None,
            real_name: None,
            sasl_login_name: None,
            sasl_mechanisms: None,
            plain_sasl_in_clear: false,
            require_password: false,
            password: None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl AccountConfig {
    /// Config for `nick` on `server` with defaults everywhere else.
    pub fn new(nick: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            server: server.into(),
            ..Self::default()
        }
    }

    /// Parse an account name of the form `nick@server`.
    pub fn from_account(account: &str) -> Result<Self, SessionError> {
        match account.split_once('@') {
            Some((nick, server)) if !nick.is_empty() && !server.is_empty() => {
                Ok(Self::new(nick, server))
            }
            _ => Err(SessionError::InvalidConfig(format!(
                "account name {:?} must have the form nick@server",
                account
            ))),
        }
    }

    /// Set an explicit port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enable or disable TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Set the server password sent with `PASS`.
    pub fn with_server_password(mut self, password: impl Into<String>) -> Self {
        self.server_password = Some(password.into());
        self
    }

    /// Set the `USER` ident.
    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = Some(ident.into());
        self
    }

    /// Set the `USER` real name.
    pub fn with_real_name(mut self, real_name: impl Into<String>) -> Self {
        self.real_name = Some(real_name.into());
        self
    }

    /// Set the SASL login name.
    pub fn with_sasl_login_name(mut self, login: impl Into<String>) -> Self {
        self.sasl_login_name = Some(login.into());
        self
    }

    /// Restrict SASL to these mechanisms.
    pub fn with_sasl_mechanisms(mut self, mechanisms: impl Into<String>) -> Self {
        self.sasl_mechanisms = Some(mechanisms.into());
        self
    }

    /// Allow PLAIN without TLS.
    pub fn with_plain_sasl_in_clear(mut self, allow: bool) -> Self {
        self.plain_sasl_in_clear = allow;
        self
    }

    /// Set the account password and turn on SASL.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self.require_password = true;
        self
    }

    /// The configured port, or the default for the TLS setting.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_tls {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PLAIN_PORT
        })
    }

    /// Server password, if one is set.
    pub fn server_password(&self) -> Option<&str> {
        non_empty(&self.server_password)
    }

    /// Ident for `USER`.
    pub fn ident(&self) -> &str {
        non_empty(&self.ident).unwrap_or(&self.nick)
    }

    /// Real name for `USER`.
    pub fn real_name(&self) -> &str {
        non_empty(&self.real_name).unwrap_or(&self.nick)
    }

    /// Identity to authenticate as.
    pub fn sasl_username(&self) -> &str {
        non_empty(&self.sasl_login_name).unwrap_or(&self.nick)
    }

    /// Explicit mechanism allow-list, if any.
    pub fn sasl_mechanisms(&self) -> Option<&str> {
        non_empty(&self.sasl_mechanisms)
    }

    /// Account password, if any.
    pub fn password(&self) -> Option<&str> {
        non_empty(&self.password)
    }
}
