//! Async connection driver.
//!
//! [`Connection::connect`] spawns one task per connection. The task owns the
//! [`Transport`] and the [`Session`], handles lines in arrival order, and
//! writes queued lines through a single framed sink. The handle talks to it
//! over channels.
//!
//! ```no_run
//! use ircv3_engine::{AccountConfig, Connection, SessionEvent};
//!
//! # async fn run() -> ircv3_engine::error::Result<()> {
//! let config = AccountConfig::new("alice", "irc.libera.chat").with_password("hunter2");
//! let mut connection = Connection::connect(config);
//!
//! while let Some(event) = connection.next_event().await {
//!     if let SessionEvent::RegistrationComplete = event {
//!         connection.privmsg("#rust", "hello").await?;
//!         break;
//!     }
//! }
//! connection.disconnect(Some("bye")).await
//! # }
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::command::Command;
use crate::config::AccountConfig;
use crate::error::{ProtocolError, Result, SessionError};
use crate::event::SessionEvent;
use crate::session::Session;
use crate::transport::Transport;

/// How long [`Connection::disconnect`] waits for `QUIT` to be written
/// before cancelling the task.
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

const REQUEST_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Request {
    Send(Command),
    Quit(Option<String>),
}

/// Handle to a running connection.
#[derive(Debug)]
pub struct Connection {
    requests: mpsc::Sender<Request>,
    events: mpsc::Receiver<SessionEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
}

impl Connection {
    /// Start connecting in a background task and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: AccountConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(config, cancel.clone(), request_rx, event_tx));

        Self {
            requests: request_tx,
            events: event_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Queue a command for the server.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.requests
            .send(Request::Send(command))
            .await
            .map_err(|_| SessionError::ConnectionLost("connection task has stopped".into()))
    }

    /// Send a `PRIVMSG`.
    pub async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.send(Command::PRIVMSG(target.to_owned(), text.to_owned()))
            .await
    }

    /// Next event, or `None` once the task has stopped and every event has
    /// been received.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Token that stops the connection immediately when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send `QUIT`, flush pending writes, and close the stream. Falls back
    /// to cancelling the task after [`DISCONNECT_GRACE`].
    ///
    /// Returns the error that ended the connection, if it ended with one
    /// before the disconnect.
    pub async fn disconnect(mut self, reason: Option<&str>) -> Result<()> {
        let deadline = Instant::now() + DISCONNECT_GRACE;
        let quit = self.requests.send(Request::Quit(reason.map(str::to_owned)));
        if tokio::time::timeout_at(deadline, quit).await.is_err() {
            debug!("request queue full, QUIT not queued");
        }

        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        let joined = match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                debug!("disconnect grace period elapsed, cancelling");
                self.cancel.cancel();
                task.await
            }
        };

        match joined {
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(result) => result,
            Err(e) => Err(SessionError::ConnectionLost(format!(
                "connection task failed: {}",
                e
            ))),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Connection task body.
async fn run(
    config: AccountConfig,
    cancel: CancellationToken,
    mut requests: mpsc::Receiver<Request>,
    events: mpsc::Sender<SessionEvent>,
) -> Result<()> {
    let host = config.server.clone();
    let port = config.effective_port();
    let use_tls = config.use_tls;
    let mut session = Session::new(config);

    let result = match establish(&host, port, use_tls, &cancel, &mut requests).await {
        Ok(Some((mut transport, early))) => {
            info!(host = %host, port, tls = transport.is_tls(), "connected");
            session.start();
            for command in early {
                session.send(command);
            }
            let result = drive(&mut session, &mut transport, &cancel, &mut requests, &events).await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                closed = transport.close() => {
                    if let Err(e) = closed {
                        debug!(error = %e, "error while closing stream");
                    }
                }
            }
            result
        }
        Ok(None) => Err(SessionError::Cancelled),
        Err(e) => Err(e),
    };

    match &result {
        Err(e) if !e.is_cancelled() => session.fail(e),
        _ => {
            info!(host = %host, "disconnected");
            session.mark_disconnected(None);
        }
    }
    forward_events(&mut session, &cancel, &events).await;

    result
}

/// Open the transport. `None` means the connection was cancelled or quit
/// before it was established. Commands queued meanwhile are returned.
async fn establish(
    host: &str,
    port: u16,
    use_tls: bool,
    cancel: &CancellationToken,
    requests: &mut mpsc::Receiver<Request>,
) -> Result<Option<(Transport, Vec<Command>)>> {
    let connect = Transport::connect(host, port, use_tls);
    tokio::pin!(connect);
    let mut early = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            request = requests.recv() => match request {
                Some(Request::Send(command)) => early.push(command),
                Some(Request::Quit(_)) | None => return Ok(None),
            },
            transport = &mut connect => return Ok(Some((transport?, early))),
        }
    }
}

/// Read, dispatch, and write until the connection ends.
async fn drive(
    session: &mut Session,
    transport: &mut Transport,
    cancel: &CancellationToken,
    requests: &mut mpsc::Receiver<Request>,
    events: &mpsc::Sender<SessionEvent>,
) -> Result<()> {
    loop {
        flush(session, transport, cancel).await?;
        forward_events(session, cancel, events).await;

        tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            request = requests.recv() => match request {
                Some(Request::Send(command)) => session.send(command),
                Some(Request::Quit(reason)) => return quit(session, transport, cancel, reason).await,
                None => return quit(session, transport, cancel, None).await,
            },
            line = transport.read_line() => match line? {
                Some(line) => {
                    trace!(line = %line, "received");
                    if let Err(e) = session.handle_line(&line) {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        warn!(error = %e, "failed to handle line");
                    }
                }
                None => {
                    return Err(SessionError::ConnectionLost(
                        "server closed the connection".into(),
                    ))
                }
            },
        }
    }
}

async fn quit(
    session: &mut Session,
    transport: &mut Transport,
    cancel: &CancellationToken,
    reason: Option<String>,
) -> Result<()> {
    session.send(Command::QUIT(reason));
    flush(session, transport, cancel).await
}

/// Write every queued line, giving up when `cancel` fires.
async fn flush(
    session: &mut Session,
    transport: &mut Transport,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        written = write_queued(session, transport) => written,
    }
}

/// A failed write drops the rest of the queue.
async fn write_queued(session: &mut Session, transport: &mut Transport) -> Result<()> {
    let lines: Vec<String> = session.drain_outgoing().collect();
    for line in lines {
        trace!(command = line.split(' ').next().unwrap_or(""), "sending");
        if let Err(e) = transport.write_line(&line).await {
            session.clear_outgoing();
            return Err(match e {
                ProtocolError::Io(e) => SessionError::network("writing to server", e),
                other => SessionError::Transport(other),
            });
        }
    }
    Ok(())
}

/// Hand queued events to the application. Blocks while the channel is full
/// until `cancel` fires; after that, events that don't fit are dropped.
async fn forward_events(
    session: &mut Session,
    cancel: &CancellationToken,
    events: &mpsc::Sender<SessionEvent>,
) {
    let pending: Vec<SessionEvent> = session.drain_events().collect();
    for event in pending {
        if cancel.is_cancelled() {
            match events.try_send(event) {
                Err(TrySendError::Closed(_)) => break,
                Err(TrySendError::Full(_)) => trace!("event channel full, dropping event"),
                Ok(()) => {}
            }
            continue;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => trace!("cancelled while forwarding events"),
            sent = events.send(event) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}
