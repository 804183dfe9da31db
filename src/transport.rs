//! Framed TCP and TLS transports.

mod codec;
mod error;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

pub use self::codec::LineCodec;
pub use self::error::TransportReadError;

use crate::error::{ProtocolError, SessionError};

/// Longest accepted incoming line, excluding the line ending.
pub const MAX_IRC_LINE_LEN: usize = 8191;

/// A line-framed connection to the server.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub enum Transport {
    /// Plain TCP.
    Tcp {
        /// Framed stream.
        framed: Framed<TcpStream, LineCodec>,
    },
    /// TLS over TCP.
    Tls {
        /// Framed stream.
        framed: Framed<TlsStream<TcpStream>, LineCodec>,
    },
}

impl Transport {
    /// Open a connection to `host:port`, with TLS when `use_tls` is set.
    pub async fn connect(host: &str, port: u16, use_tls: bool) -> Result<Self, SessionError> {
        debug!(host, port, tls = use_tls, "connecting");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| SessionError::network("connecting", e))?;

        if !use_tls {
            return Ok(Self::tcp(stream));
        }

        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|_| ProtocolError::InvalidServerName(host.to_owned()))?;
        let tls = tls_connector()
            .connect(server_name, stream)
            .await
            .map_err(|e| SessionError::network("negotiating TLS", e))?;
        Ok(Self::tls(tls))
    }

    /// Wrap a connected TCP stream.
    pub fn tcp(stream: TcpStream) -> Self {
        if let Err(e) = enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        Self::Tcp {
            framed: Framed::new(stream, LineCodec::new()),
        }
    }

    /// Wrap an established TLS stream.
    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        if let Err(e) = enable_keepalive(stream.get_ref().0) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        Self::Tls {
            framed: Framed::new(stream, LineCodec::new()),
        }
    }

    /// Whether the connection is encrypted.
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls { .. })
    }

    /// Next line, or `None` at end of stream.
    pub async fn read_line(&mut self) -> Result<Option<String>, TransportReadError> {
        macro_rules! read_framed {
            ($framed:expr) => {
                match $framed.next().await {
                    Some(Ok(line)) => Ok(Some(line)),
                    Some(Err(e)) => Err(TransportReadError::from(e)),
                    None => Ok(None),
                }
            };
        }

        match self {
            Transport::Tcp { framed } => read_framed!(framed),
            Transport::Tls { framed } => read_framed!(framed),
        }
    }

    /// Write and flush one line. CRLF is appended.
    pub async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        match self {
            Transport::Tcp { framed } => framed.send(line).await,
            Transport::Tls { framed } => framed.send(line).await,
        }
    }

    /// Flush pending writes and shut the stream down.
    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        match self {
            Transport::Tcp { framed } => SinkExt::<&str>::close(framed).await,
            Transport::Tls { framed } => SinkExt::<&str>::close(framed).await,
        }
    }
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    use socket2::{SockRef, TcpKeepalive};

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)
}

/// TLS connector trusting the webpki root certificates.
fn tls_connector() -> TlsConnector {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
