use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ampwire_frame::Payload;
use tokio::sync::{mpsc, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::error::{Result, SessionError};
use crate::session::{DeviceSession, SessionConfig};
use crate::settings::{DeviceContext, DEFAULT_PORT};

/// Connection pool behavior.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Device TCP port.
    pub port: u16,
    /// Longest wait for another dispatch to release the connection.
    pub acquire_timeout: Duration,
    /// Timeouts for each session the pool opens.
    pub session: SessionConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            acquire_timeout: Duration::from_secs(10),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Default)]
struct Slot {
    session: Option<Arc<DeviceSession>>,
    /// Bumped whenever the pooled connection is invalidated wholesale.
    epoch: u64,
}

/// Single-connection pool for the amplifier.
///
/// There is one physical device and one socket. Acquirers queue on a FIFO
/// gate so only one dispatch writes at a time and frames never interleave.
/// The session is opened lazily with the settings current at connect time.
pub struct ConnectionPool {
    context: DeviceContext,
    config: PoolConfig,
    gate: Arc<AsyncMutex<()>>,
    slot: Mutex<Slot>,
    next_session_id: AtomicU64,
    feedback: mpsc::UnboundedSender<Payload>,
}

impl ConnectionPool {
    /// Create a pool and the receiver for feedback from its sessions.
    pub fn new(
        context: DeviceContext,
        config: PoolConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Payload>) {
        let (feedback, feedback_rx) = mpsc::unbounded_channel();
        let pool = Arc::new(Self {
            context,
            config,
            gate: Arc::new(AsyncMutex::new(())),
            slot: Mutex::new(Slot::default()),
            next_session_id: AtomicU64::new(1),
            feedback,
        });
        (pool, feedback_rx)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Exclusive use of the connected session.
    ///
    /// Reuses the pooled session if it is still connected, otherwise makes one
    /// connect attempt with the current settings. If the pool is invalidated
    /// while that connect is in flight, the new session is discarded and the
    /// connect is repeated against the latest settings.
    pub async fn acquire(&self) -> Result<PooledSession> {
        let permit = timeout(self.config.acquire_timeout, Arc::clone(&self.gate).lock_owned())
            .await
            .map_err(|_| SessionError::AcquireTimeout(self.config.acquire_timeout))?;

        loop {
            let (current, epoch) = {
                let slot = self.lock_slot();
                (slot.session.clone(), slot.epoch)
            };

            if let Some(session) = current {
                if session.is_connected() {
                    return Ok(PooledSession {
                        session,
                        _permit: permit,
                    });
                }
                tracing::debug!(
                    session = session.id(),
                    state = session.state().name(),
                    "evicting device session"
                );
                self.discard(&session);
                session.close().await;
            }

            let addr = self.context.settings().socket_addr(self.config.port)?;
            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
            let session = Arc::new(DeviceSession::new(id, addr, self.config.session.clone()));
            session.open(self.feedback.clone()).await?;

            let stored = {
                let mut slot = self.lock_slot();
                if slot.epoch == epoch {
                    slot.session = Some(Arc::clone(&session));
                    true
                } else {
                    false
                }
            };
            if stored {
                return Ok(PooledSession {
                    session,
                    _permit: permit,
                });
            }

            tracing::info!(session = id, "settings changed during connect, reconnecting");
            session.close().await;
        }
    }

    /// Return a session to the pool. Dropping the lease does the same.
    pub fn release(&self, lease: PooledSession) {
        drop(lease);
    }

    /// Force-close and discard `session`, whatever its state.
    pub async fn invalidate(&self, session: &DeviceSession) {
        self.discard(session);
        session.close().await;
        tracing::debug!(session = session.id(), "device session invalidated");
    }

    /// Close the pooled session so the next acquire reconnects with fresh
    /// settings. Does not wait for in-flight dispatches.
    pub async fn invalidate_current(&self) {
        let taken = {
            let mut slot = self.lock_slot();
            slot.epoch += 1;
            slot.session.take()
        };
        if let Some(session) = taken {
            tracing::info!(session = session.id(), "invalidating device connection");
            session.close().await;
        }
    }

    /// Close the pooled session at teardown.
    pub async fn shutdown(&self) {
        let taken = self.lock_slot().session.take();
        if let Some(session) = taken {
            session.close().await;
        }
    }

    /// The pooled session, if any.
    pub fn current(&self) -> Option<Arc<DeviceSession>> {
        self.lock_slot().session.clone()
    }

    /// Number of connect attempts made so far.
    pub fn connect_attempts(&self) -> u64 {
        self.next_session_id.load(Ordering::Relaxed) - 1
    }

    fn discard(&self, session: &DeviceSession) {
        let mut slot = self.lock_slot();
        if slot
            .session
            .as_deref()
            .is_some_and(|pooled| std::ptr::eq(pooled, session))
        {
            slot.session = None;
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("current", &self.current())
            .finish()
    }
}

/// Exclusive lease on the pooled session. Released on drop.
pub struct PooledSession {
    session: Arc<DeviceSession>,
    _permit: OwnedMutexGuard<()>,
}

impl PooledSession {
    pub fn session(&self) -> &Arc<DeviceSession> {
        &self.session
    }
}

impl Deref for PooledSession {
    type Target = DeviceSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("session", &self.session)
            .finish()
    }
}
