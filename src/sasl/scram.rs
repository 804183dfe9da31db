//! SCRAM-SHA-256 SASL mechanism (RFC 7677).
//!
//! # SCRAM Protocol Flow
//!
//! 1. Client sends `client-first-message`: `n,,n=user,r=nonce`
//! 2. Server sends `server-first-message`: `r=nonce+server,s=salt,i=iterations`
//! 3. Client sends `client-final-message`: `c=biws,r=nonce+server,p=proof`
//! 4. Server sends `server-final-message`: `v=verifier`
//!
//! Channel binding is not used, so the GS2 header is always `n,,`.
//!
//! # Reference
//! - RFC 5802: <https://tools.ietf.org/html/rfc5802>
//! - RFC 7677: <https://tools.ietf.org/html/rfc7677>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::MechanismError;

type HmacSha256 = Hmac<Sha256>;

const NONCE_BYTES: usize = 18;
const GS2_HEADER: &str = "n,,";
/// `base64("n,,")`
const CHANNEL_BINDING: &str = "biws";

/// SCRAM-SHA-256 client state machine.
///
/// Each call to [`step`](Self::step) consumes one decoded server message and
/// returns the next raw client message.
#[derive(Clone, Debug)]
pub struct ScramClient {
    username: String,
    password: String,
    client_nonce: String,
    state: ScramState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ScramState {
    Initial,
    ClientFirstSent {
        client_first_bare: String,
    },
    ClientFinalSent {
        server_key: Vec<u8>,
        auth_message: String,
    },
    Complete,
}

impl ScramClient {
    /// Create a client with a fresh random nonce.
    pub fn new(username: &str, password: &str) -> Result<Self, MechanismError> {
        let mut raw = [0u8; NONCE_BYTES];
        getrandom::getrandom(&mut raw).map_err(|_| MechanismError::Rng)?;
        Ok(Self::with_nonce(username, password, BASE64.encode(raw)))
    }

    fn with_nonce(username: &str, password: &str, client_nonce: String) -> Self {
        Self {
            username: username.to_owned(),
            password: password.to_owned(),
            client_nonce,
            state: ScramState::Initial,
        }
    }

    /// Whether the server signature has been verified.
    pub fn is_complete(&self) -> bool {
        self.state == ScramState::Complete
    }

    /// Run one step of the exchange.
    pub fn step(&mut self, input: &[u8]) -> Result<Vec<u8>, MechanismError> {
        match std::mem::replace(&mut self.state, ScramState::Complete) {
            ScramState::Initial => {
                let client_first_bare =
                    format!("n={},r={}", escape_username(&self.username), self.client_nonce);
                let message = format!("{}{}", GS2_HEADER, client_first_bare);
                self.state = ScramState::ClientFirstSent { client_first_bare };
                Ok(message.into_bytes())
            }
            ScramState::ClientFirstSent { client_first_bare } => {
                let server_first = as_text(input)?;
                let (message, server_key, auth_message) =
                    self.client_final(&client_first_bare, server_first)?;
                self.state = ScramState::ClientFinalSent {
                    server_key,
                    auth_message,
                };
                Ok(message.into_bytes())
            }
            ScramState::ClientFinalSent {
                server_key,
                auth_message,
            } => {
                verify_server_final(as_text(input)?, &server_key, &auth_message)?;
                Ok(Vec::new())
            }
            ScramState::Complete => Err(MechanismError::UnexpectedChallenge("SCRAM-SHA-256")),
        }
    }

    fn client_final(
        &self,
        client_first_bare: &str,
        server_first: &str,
    ) -> Result<(String, Vec<u8>, String), MechanismError> {
        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for attr in server_first.split(',') {
            match attr.split_once('=') {
                Some(("e", reason)) => return Err(MechanismError::Rejected(reason.to_owned())),
                Some(("r", value)) => nonce = Some(value),
                Some(("s", value)) => salt = Some(value),
                Some(("i", value)) => iterations = Some(value),
                _ => {}
            }
        }

        let nonce = nonce.ok_or(MechanismError::MissingNonce)?;
        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(MechanismError::NonceMismatch);
        }
        let salt = BASE64
            .decode(salt.ok_or(MechanismError::MissingSalt)?)
            .map_err(|_| MechanismError::InvalidEncoding)?;
        let iterations: u32 = iterations
            .ok_or(MechanismError::MissingIterations)?
            .parse()
            .map_err(|_| MechanismError::InvalidIterations)?;
        if iterations == 0 {
            return Err(MechanismError::InvalidIterations);
        }

        let mut salted = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.password.as_bytes(), &salt, iterations, &mut salted);

        let client_key = hmac(&salted, b"Client Key")?;
        let stored_key = Sha256::digest(&client_key);
        let server_key = hmac(&salted, b"Server Key")?;

        let without_proof = format!("c={},r={}", CHANNEL_BINDING, nonce);
        let auth_message = format!("{},{},{}", client_first_bare, server_first, without_proof);

        let client_signature = hmac(&stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        let message = format!("{},p={}", without_proof, BASE64.encode(proof));
        Ok((message, server_key, auth_message))
    }
}

fn verify_server_final(
    server_final: &str,
    server_key: &[u8],
    auth_message: &str,
) -> Result<(), MechanismError> {
    for attr in server_final.split(',') {
        match attr.split_once('=') {
            Some(("e", reason)) => return Err(MechanismError::Rejected(reason.to_owned())),
            Some(("v", value)) => {
                let signature = BASE64
                    .decode(value)
                    .map_err(|_| MechanismError::InvalidEncoding)?;
                let mut mac = <HmacSha256 as Mac>::new_from_slice(server_key)
                    .map_err(|_| MechanismError::Crypto)?;
                Mac::update(&mut mac, auth_message.as_bytes());
                return mac
                    .verify_slice(&signature)
                    .map_err(|_| MechanismError::ServerVerificationFailed);
            }
            _ => {}
        }
    }
    Err(MechanismError::ServerVerificationFailed)
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, MechanismError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| MechanismError::Crypto)?;
    Mac::update(&mut mac, data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn as_text(input: &[u8]) -> Result<&str, MechanismError> {
    std::str::from_utf8(input).map_err(|_| MechanismError::InvalidEncoding)
}

/// `saslname` escaping from RFC 5802.
fn escape_username(username: &str) -> String {
    username.replace('=', "=3D").replace(',', "=2C")
}
