//! A bounded reservoir of reusable [`SessionHandle`]s, per spec §4.5.
//!
//! Grounded in `spanner/src/session.rs`'s `SessionPool`/`Sessions`/
//! `ManagedSession` triad: state (idle queue, waiters, in-use count) is kept
//! behind one lock so a release and an acquire can never race each other
//! into an inconsistent view, waiters are woken via a one-shot channel
//! pushed onto a queue, and a leased session is returned to the caller
//! wrapped in an RAII guard. Trimmed relative to the teacher: no
//! min/max-idle shrinking and no background health-check task — spec's
//! `SessionPool` has no idle-timeout concept, only `max_sessions` /
//! `acquire_timeout` / discard-on-release (see DESIGN.md).

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::session::SessionHandle;
use crate::transport::Transport;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session pool is closed")]
    PoolClosed,
    #[error("acquire timed out waiting for a free session")]
    AcquireTimeout,
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReleaseMode {
    Return,
    Discard,
}

#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Hard cap on concurrently leased + idle sessions.
    pub max_sessions: usize,
    /// Bound on how long `acquire` may block for a free session.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_sessions: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

struct Inner {
    /// Idle sessions kept as a stack: push/pop at the same end gives LIFO
    /// reuse (spec §4.5: "LIFO reuse is preferable to keep recently-
    /// validated sessions warm").
    idle: Vec<SessionHandle>,
    waiters: VecDeque<oneshot::Sender<()>>,
    leased: usize,
    closed: bool,
}

impl Inner {
    fn num_opened(&self) -> usize {
        self.leased + self.idle.len()
    }

    fn take_waiter(&mut self) -> Option<oneshot::Sender<()>> {
        while let Some(w) = self.waiters.pop_front() {
            if !w.is_closed() {
                return Some(w);
            }
        }
        None
    }
}

#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<Mutex<Inner>>,
    transport: Arc<dyn Transport>,
    config: PoolConfig,
}

impl SessionPool {
    pub fn new(transport: Arc<dyn Transport>, config: PoolConfig) -> Self {
        SessionPool {
            inner: Arc::new(Mutex::new(Inner {
                idle: Vec::new(),
                waiters: VecDeque::new(),
                leased: 0,
                closed: false,
            })),
            transport,
            config,
        }
    }

    pub fn num_opened(&self) -> usize {
        self.inner.lock().num_opened()
    }

    /// `acquire` semantics per spec §4.5:
    /// 1. fail fast if closed,
    /// 2. reuse an idle session if one exists,
    /// 3. else create a new one if under capacity,
    /// 4. else block up to `acquire_timeout` for a release.
    pub async fn acquire(&self) -> Result<ManagedSession, SessionError> {
        loop {
            let action = {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return Err(SessionError::PoolClosed);
                }
                if let Some(session) = inner.idle.pop() {
                    inner.leased += 1;
                    return Ok(ManagedSession::new(self.clone(), session));
                }
                if inner.leased + inner.idle.len() < self.config.max_sessions {
                    inner.leased += 1;
                    Action::Create
                } else {
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push_back(tx);
                    Action::Wait(rx)
                }
            };

            match action {
                Action::Create => {
                    return match self.transport.start_session().await {
                        Ok(token) => Ok(ManagedSession::new(
                            self.clone(),
                            SessionHandle::new(token, self.transport.clone()),
                        )),
                        Err(e) => {
                            // Creation failed: give back the reservation.
                            self.inner.lock().leased -= 1;
                            Err(SessionError::Transport(e))
                        }
                    };
                }
                Action::Wait(rx) => {
                    if timeout(self.config.acquire_timeout, rx).await.is_err() {
                        tracing::warn!("session pool acquire timed out");
                        return Err(SessionError::AcquireTimeout);
                    }
                    // Notified: an idle session (or capacity) should be
                    // available now; loop back to take it.
                }
            }
        }
    }

    /// `release(session, mode)` per spec §4.5: a returned session goes back
    /// onto the idle stack; a discarded one is ended best-effort and its
    /// lease slot is freed.
    pub async fn release(&self, mut managed: ManagedSession, mode: ReleaseMode) {
        let session = managed.session.take().expect("session already released");
        self.release_handle(session, mode).await;
    }

    async fn release_handle(&self, session: SessionHandle, mode: ReleaseMode) {
        let closed = self.inner.lock().closed;
        if closed || mode == ReleaseMode::Discard {
            session.end_session().await;
            let mut inner = self.inner.lock();
            inner.leased -= 1;
            let waiter = inner.take_waiter();
            drop(inner);
            if let Some(w) = waiter {
                let _ = w.send(());
            }
        } else {
            let mut inner = self.inner.lock();
            inner.leased -= 1;
            inner.idle.push(session);
            let waiter = inner.take_waiter();
            drop(inner);
            if let Some(w) = waiter {
                let _ = w.send(());
            }
        }
    }

    /// Marks the pool closed, drains the idle queue (best-effort
    /// `end_session` on each), and fails all future `acquire` calls
    /// immediately. In-flight leases discard on release.
    pub async fn close(&self) {
        let idle = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.idle)
        };
        for session in idle {
            session.end_session().await;
        }
    }
}

enum Action {
    Create,
    Wait(oneshot::Receiver<()>),
}

/// RAII guard around a leased [`SessionHandle`]. The normal lifecycle is an
/// explicit `SessionPool::release` call once the caller knows the right
/// disposition; `Drop` is a safety net for the case where the guard is
/// dropped without that call (e.g. the holding future was cancelled) — it
/// discards the session rather than leaking the lease slot, mirroring the
/// teacher's `ManagedSession::drop` recycling (`spanner/src/session.rs`).
pub struct ManagedSession {
    pool: SessionPool,
    session: Option<SessionHandle>,
}

impl ManagedSession {
    fn new(pool: SessionPool, session: SessionHandle) -> Self {
        ManagedSession {
            pool,
            session: Some(session),
        }
    }
}

impl Deref for ManagedSession {
    type Target = SessionHandle;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref().expect("session already released")
    }
}

impl DerefMut for ManagedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut().expect("session already released")
    }
}

impl Drop for ManagedSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.release_handle(session, ReleaseMode::Discard).await;
            });
        }
    }
}
