//! Connection pooling
//!
//! The pool owns all shared mutable state (idle slots, active count, wait
//! queue) behind a single mutex; sessions themselves are moved in and out
//! whole and are never aliased. Idle slots are reused most-recently-released
//! first; waiters are served strictly first-come-first-served and each waits
//! with its own queue timeout.

use crate::session::Session;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};

/// Builds new authenticated sessions for the pool.
///
/// The production implementation walks the endpoint trial sequence,
/// negotiates TLS and authentication, and returns an open [`Session`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// Build one new session
    async fn connect(&self) -> Result<Session>;
}

/// Pooling behavior knobs
#[derive(Debug, Clone)]
pub struct PoolingConfig {
    /// Whether pooling is enabled at all
    pub enabled: bool,
    /// Maximum number of concurrently existing sessions
    pub max_size: usize,
    /// Idle time after which a parked session is discarded on the next
    /// lease attempt. `Duration::ZERO` means sessions never go stale.
    pub max_idle_time: Duration,
    /// How long a caller waits for a session when the pool is saturated.
    /// `Duration::ZERO` means wait indefinitely.
    pub queue_timeout: Duration,
    /// Whether a reused session keeps its prepared-statement table across
    /// the release/lease cycle (server-side session variables are always
    /// cleared)
    pub retain_prepared_statements: bool,
}

impl Default for PoolingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 25,
            max_idle_time: Duration::ZERO,
            queue_timeout: Duration::ZERO,
            retain_prepared_statements: true,
        }
    }
}

impl PoolingConfig {
    /// Pooling disabled: every `get_session` builds a fresh session
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the maximum pool size
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the idle timeout
    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    /// Set the wait-queue timeout
    pub fn with_queue_timeout(mut self, queue_timeout: Duration) -> Self {
        self.queue_timeout = queue_timeout;
        self
    }

    /// Keep or clear the prepared-statement table across release/reuse
    pub fn with_retain_prepared_statements(mut self, retain: bool) -> Self {
        self.retain_prepared_statements = retain;
        self
    }
}

/// A parked session with its release timestamp
struct IdleSlot {
    session: Session,
    released_at: Instant,
}

/// A caller suspended on a saturated pool
struct Waiter {
    id: u64,
    tx: oneshot::Sender<Result<Session>>,
}

/// Pool-owned mutable state; only touched under the mutex
struct PoolInner {
    /// Idle slots, most recently released last (popped LIFO)
    idle: Vec<IdleSlot>,
    /// Sessions currently leased out
    active: usize,
    /// Suspended callers, oldest first
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
    closed: bool,
}

/// Bounded session pool with lease/release semantics
pub struct ConnectionPool {
    inner: Mutex<PoolInner>,
    connector: Arc<dyn Connector>,
    config: PoolingConfig,
}

enum LeaseAction {
    Discard(Session),
    Recycle(Session),
    Build,
    Wait(u64, oneshot::Receiver<Result<Session>>),
}

impl ConnectionPool {
    /// Create a pool over the given connector
    pub fn new(config: PoolingConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                idle: Vec::new(),
                active: 0,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
                closed: false,
            }),
            connector,
            config,
        }
    }

    /// Pooling configuration
    pub fn config(&self) -> &PoolingConfig {
        &self.config
    }

    /// Number of idle sessions
    pub async fn idle_count(&self) -> usize {
        self.inner.lock().await.idle.len()
    }

    /// Number of leased-out sessions
    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.active
    }

    /// Lease a session.
    ///
    /// Preference order: the most recently released idle slot (discarding
    /// stale ones), then a newly built session if below `max_size`, then the
    /// wait queue. A waiter fails with [`Error::PoolTimeout`] once its queue
    /// timeout elapses.
    pub async fn lease(&self) -> Result<Session> {
        loop {
            let action = {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    return Err(Error::PoolClosed);
                }
                if let Some(slot) = inner.idle.pop() {
                    if self.is_stale(&slot) {
                        LeaseAction::Discard(slot.session)
                    } else {
                        inner.active += 1;
                        LeaseAction::Recycle(slot.session)
                    }
                } else if inner.active + inner.idle.len() < self.config.max_size {
                    inner.active += 1;
                    LeaseAction::Build
                } else {
                    let id = inner.next_waiter_id;
                    inner.next_waiter_id += 1;
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push_back(Waiter { id, tx });
                    LeaseAction::Wait(id, rx)
                }
            };

            match action {
                LeaseAction::Discard(session) => {
                    // Stale slot: drop it and look again.
                    crate::metrics::counters::pool_idle_evicted();
                    tracing::debug!(session = session.id(), "discarding stale idle session");
                    let _ = session.close().await;
                }
                LeaseAction::Recycle(session) => {
                    return match self.refurbish(session).await {
                        Ok(session) => {
                            crate::metrics::counters::pool_lease("reused");
                            Ok(session)
                        }
                        Err(e) => {
                            self.free_capacity().await;
                            Err(e)
                        }
                    };
                }
                LeaseAction::Build => {
                    return match self.connector.connect().await {
                        Ok(session) => {
                            crate::metrics::counters::pool_lease("created");
                            Ok(session)
                        }
                        Err(e) => {
                            self.free_capacity().await;
                            Err(e)
                        }
                    };
                }
                LeaseAction::Wait(id, rx) => return self.wait(id, rx).await,
            }
        }
    }

    /// Return a leased session.
    ///
    /// The freed session is offered to the oldest waiter first and only
    /// parked in the idle set when nobody is waiting. A session whose
    /// transport died while leased (or idle) is rebuilt transparently before
    /// hand-off.
    pub async fn release(&self, session: Session) {
        let mut session = session;
        loop {
            let waiter = {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    drop(inner);
                    // Pool already closed: abandon server-side state, just
                    // tear the transport down.
                    let _ = session.close().await;
                    return;
                }
                match inner.waiters.pop_front() {
                    Some(waiter) => waiter,
                    None => {
                        inner.active = inner.active.saturating_sub(1);
                        match session.mark_idle() {
                            Ok(()) => inner.idle.push(IdleSlot {
                                session,
                                released_at: Instant::now(),
                            }),
                            Err(_) => {
                                // Session died while leased; nothing to park.
                            }
                        }
                        return;
                    }
                }
            };

            match self.refurbish(session).await {
                Ok(ready) => match waiter.tx.send(Ok(ready)) {
                    Ok(()) => return,
                    // The waiter vanished (cancelled); recover the session
                    // and try the next one.
                    Err(sent_back) => match sent_back {
                        Ok(recovered) => session = recovered,
                        Err(_) => return,
                    },
                },
                Err(e) => {
                    // Rebuild failed: the capacity slot is gone with it.
                    self.free_capacity().await;
                    let _ = waiter.tx.send(Err(e));
                    return;
                }
            }
        }
    }

    /// Permanently remove a leased session from the pool.
    ///
    /// Used when a holder decides its session is beyond reuse (fatal
    /// statement error, explicit close). The freed capacity goes to the
    /// oldest waiter.
    pub async fn discard(&self, session: Session) {
        let _ = session.close().await;
        self.free_capacity().await;
    }

    /// Close the pool: reject all waiters, then close every idle session.
    ///
    /// Server-side session state is abandoned, not gracefully reset.
    /// Sessions still leased out are closed when they come back.
    pub async fn close(&self) {
        let (waiters, idle) = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return;
            }
            inner.closed = true;
            (
                std::mem::take(&mut inner.waiters),
                std::mem::take(&mut inner.idle),
            )
        };

        for waiter in waiters {
            let _ = waiter.tx.send(Err(Error::PoolClosed));
        }
        for slot in idle {
            let _ = slot.session.close().await;
        }
        tracing::debug!("connection pool closed");
    }

    fn is_stale(&self, slot: &IdleSlot) -> bool {
        !self.config.max_idle_time.is_zero()
            && slot.released_at.elapsed() > self.config.max_idle_time
    }

    /// Reset a parked or freed session for its next holder, rebuilding it if
    /// the transport turns out to be dead.
    async fn refurbish(&self, mut session: Session) -> Result<Session> {
        match session.reset(self.config.retain_prepared_statements).await {
            Ok(()) => {
                if !session.is_open() {
                    session.mark_open()?;
                }
                Ok(session)
            }
            Err(e) => {
                tracing::debug!(
                    session = session.id(),
                    error = %e,
                    "session transport unusable, rebuilding"
                );
                let _ = session.close().await;
                let session = self.connector.connect().await?;
                crate::metrics::counters::pool_lease("rebuilt");
                Ok(session)
            }
        }
    }

    /// Release one capacity slot and hand it to a waiter if one is queued
    async fn free_capacity(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.active = inner.active.saturating_sub(1);
        }
        self.rebalance().await;
    }

    /// Build a session for the oldest waiter when capacity frees up without
    /// a session to hand over (a discard, a failed rebuild).
    async fn rebalance(&self) {
        let waiter = {
            let mut inner = self.inner.lock().await;
            if inner.closed
                || inner.waiters.is_empty()
                || inner.active + inner.idle.len() >= self.config.max_size
            {
                return;
            }
            inner.active += 1;
            inner.waiters.pop_front()
        };
        let Some(waiter) = waiter else { return };

        match self.connector.connect().await {
            Ok(session) => {
                crate::metrics::counters::pool_lease("created");
                if let Err(sent_back) = waiter.tx.send(Ok(session)) {
                    // The waiter vanished while the session was being built.
                    if let Ok(mut session) = sent_back {
                        let mut inner = self.inner.lock().await;
                        inner.active = inner.active.saturating_sub(1);
                        if !inner.closed && session.mark_idle().is_ok() {
                            inner.idle.push(IdleSlot {
                                session,
                                released_at: Instant::now(),
                            });
                        } else {
                            drop(inner);
                            let _ = session.close().await;
                        }
                    }
                }
            }
            Err(e) => {
                // The capacity was reserved for this waiter and the build
                // failed; settle it with the connection error rather than
                // leaving it to time out against capacity that no longer
                // exists.
                {
                    let mut inner = self.inner.lock().await;
                    inner.active = inner.active.saturating_sub(1);
                }
                let _ = waiter.tx.send(Err(e));
            }
        }
    }

    async fn wait(&self, id: u64, mut rx: oneshot::Receiver<Result<Session>>) -> Result<Session> {
        let queue_timeout = self.config.queue_timeout;
        let enqueued = Instant::now();

        let settled = if queue_timeout.is_zero() {
            (&mut rx).await
        } else {
            tokio::select! {
                settled = &mut rx => settled,
                _ = tokio::time::sleep(queue_timeout) => {
                    let timed_out = {
                        let mut inner = self.inner.lock().await;
                        match inner.waiters.iter().position(|w| w.id == id) {
                            Some(pos) => {
                                inner.waiters.remove(pos);
                                true
                            }
                            None => false,
                        }
                    };
                    if timed_out {
                        crate::metrics::counters::pool_wait_timeout();
                        return Err(Error::PoolTimeout {
                            timeout_ms: queue_timeout.as_millis() as u64,
                        });
                    }
                    // A release settled this entry just as the timer fired;
                    // the sender is committed, so the result is imminent.
                    (&mut rx).await
                }
            }
        };

        crate::metrics::histograms::pool_wait_duration(enqueued.elapsed().as_millis() as u64);
        match settled {
            Ok(result) => result,
            Err(_) => Err(Error::PoolClosed),
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .finish()
    }
}
