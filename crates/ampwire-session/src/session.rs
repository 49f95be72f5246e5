use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use ampwire_frame::{DeviceCodec, Direction, Payload};
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::{Result, SessionError};

/// Lifecycle of a device connection.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> (Closing | Faulted) -> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Faulted,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closing => "closing",
            SessionState::Faulted => "faulted",
        }
    }
}

/// Timeouts applied to a single session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Limit for the TCP connect.
    pub connect_timeout: Duration,
    /// Limit for writing and flushing one frame.
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(2),
        }
    }
}

/// Feedback payloads decoded from a session's inbound stream.
pub type FeedbackSender = mpsc::UnboundedSender<Payload>;

/// One TCP connection to the amplifier.
///
/// Inbound bytes are decoded on a dedicated task, independent of writes.
/// Feedback frames go to the channel given to [`DeviceSession::open`]. When
/// the connection breaks the session moves to `Faulted`; the owner observes
/// that through [`DeviceSession::state`] or [`DeviceSession::subscribe`] and
/// decides whether to reconnect. A session never reconnects itself.
pub struct DeviceSession {
    id: u64,
    addr: SocketAddr,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionState>>,
    writer: Mutex<Option<FramedWrite<OwnedWriteHalf, DeviceCodec>>>,
    reader: OnceLock<AbortHandle>,
}

impl DeviceSession {
    /// Create a disconnected session for `addr`.
    pub fn new(id: u64, addr: SocketAddr, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            id,
            addr,
            config,
            state: Arc::new(state),
            writer: Mutex::new(None),
            reader: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Observe state transitions, including faults raised by the reader.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Connect and start the inbound reader.
    ///
    /// A session is opened at most once, from `Disconnected`; anything else
    /// fails with `NotConnected` without touching the socket.
    pub async fn open(&self, feedback: FeedbackSender) -> Result<()> {
        if self.reader.get().is_some() {
            return Err(SessionError::NotConnected);
        }
        let started = self.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(SessionError::NotConnected);
        }

        tracing::debug!(session = self.id, addr = %self.addr, "connecting to device");
        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(self.addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.state.send_replace(SessionState::Faulted);
                return Err(SessionError::Connect {
                    addr: self.addr,
                    source,
                });
            }
            Err(_) => {
                self.state.send_replace(SessionState::Faulted);
                return Err(SessionError::ConnectTimeout {
                    addr: self.addr,
                    timeout: self.config.connect_timeout,
                });
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(session = self.id, error = %err, "failed to set TCP_NODELAY");
        }

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(FramedWrite::new(write_half, DeviceCodec::new()));

        let handle = tokio::spawn(read_loop(
            self.id,
            FramedRead::new(read_half, DeviceCodec::new()),
            Arc::clone(&self.state),
            feedback,
        ));
        let _ = self.reader.set(handle.abort_handle());

        let connected = self.state.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = SessionState::Connected;
                true
            } else {
                false
            }
        });
        if !connected {
            // Closed while the connect was in flight.
            handle.abort();
            self.writer.lock().await.take();
            return Err(SessionError::NotConnected);
        }

        tracing::info!(session = self.id, addr = %self.addr, "connected to device");
        Ok(())
    }

    /// Write one framed payload.
    pub async fn send(&self, payload: Payload) -> Result<()> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::NotConnected)?;

        tracing::trace!(
            session = self.id,
            code = payload.code_name(),
            value = payload.value,
            "writing frame"
        );
        match timeout(self.config.write_timeout, writer.send(payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.fault("write failed");
                Err(SessionError::Write(err))
            }
            Err(_) => {
                self.fault("write timed out");
                Err(SessionError::WriteTimeout(self.config.write_timeout))
            }
        }
    }

    /// Force-close from any state. Ends in `Disconnected`.
    pub async fn close(&self) {
        let previous = self.state.send_replace(SessionState::Closing);
        if let Some(reader) = self.reader.get() {
            reader.abort();
        }
        if let Some(writer) = self.writer.lock().await.take() {
            let mut half = writer.into_inner();
            if let Err(err) = half.shutdown().await {
                tracing::debug!(session = self.id, error = %err, "shutdown after close failed");
            }
        }
        self.state.send_replace(SessionState::Disconnected);
        if previous != SessionState::Disconnected {
            tracing::debug!(session = self.id, from = previous.name(), "session closed");
        }
    }

    fn fault(&self, reason: &str) {
        if mark_faulted(&self.state) {
            tracing::warn!(session = self.id, addr = %self.addr, reason, "device session faulted");
        }
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get() {
            reader.abort();
        }
    }
}

fn mark_faulted(state: &watch::Sender<SessionState>) -> bool {
    state.send_if_modified(|state| {
        if *state == SessionState::Connected {
            *state = SessionState::Faulted;
            true
        } else {
            false
        }
    })
}

async fn read_loop(
    id: u64,
    mut frames: FramedRead<OwnedReadHalf, DeviceCodec>,
    state: Arc<watch::Sender<SessionState>>,
    feedback: FeedbackSender,
) {
    while let Some(item) = frames.next().await {
        match item {
            Ok(Ok(frame)) => match frame.payload.direction {
                Direction::Feedback => {
                    tracing::debug!(
                        session = id,
                        code = frame.payload.code_name(),
                        value = frame.payload.value,
                        status = frame.payload.status,
                        "device feedback"
                    );
                    if feedback.send(frame.payload).is_err() {
                        tracing::debug!(session = id, "feedback receiver dropped");
                    }
                }
                Direction::Command => {
                    tracing::trace!(
                        session = id,
                        code = frame.payload.code,
                        "ignoring inbound command frame"
                    );
                }
            },
            Ok(Err(err)) => {
                tracing::warn!(session = id, error = %err, "discarding malformed device frame");
            }
            Err(err) => {
                if mark_faulted(&state) {
                    tracing::warn!(session = id, error = %err, "device read failed");
                }
                return;
            }
        }
    }

    if mark_faulted(&state) {
        tracing::info!(session = id, "device closed the connection");
    }
}
