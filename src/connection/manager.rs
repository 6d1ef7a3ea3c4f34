//! The connection manager.
//!
//! # Responsibilities
//! - Own the single directory session and the connection state machine
//! - Route every bind, operation and health failure through one handler
//! - Schedule reconnects with exponential backoff and stop on auth failures
//! - Tear everything down exactly once on shutdown
//!
//! # Data Flow
//! ```text
//! execute()/connect() → acquire() ──Disconnected──→ connect_locked() → bind
//!                          │                              │
//!                          │ Connecting/Reconnecting      ├─ok──→ Connected → HealthMonitor
//!                          ▼                              │
//!                  wait on status watch                   └─err─→ handle_failure()
//!                                                                   │
//!                                     Authentication ←──classify──→ Transient
//!                                     terminal Failed               schedule_reconnect()
//!                                     + notification                → reconnect_after() → connect_locked()
//! ```
//!
//! # Design Decisions
//! - One async mutex serializes transitions, session use, timer bookkeeping
//!   and retry counters. Callers that find a connect in progress wait on the
//!   status watch instead of the lock.
//! - Background tasks hold a `Weak` handle and a timer token; a task whose
//!   token is no longer current does nothing.
//! - Spawned futures are boxed at named functions so the connect/fail/reconnect
//!   cycle does not recurse through opaque future types.

use futures_util::future::BoxFuture;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::connection::events::{
    AuthenticationFailure, ConnectionEvent, ConnectionStatus, FailureDetail, FailureOrigin,
    Notifier, RetriesExhausted,
};
use crate::connection::session::{DirectoryConnector, DirectorySession};
use crate::connection::state::ConnectionState;
use crate::error::{ConnectionError, ConnectionResult};
use crate::health::monitor::HealthMonitor;
use crate::lifecycle::{Shutdown, ShutdownSignal, TimerSlot};
use crate::observability::metrics;
use crate::resilience::backoff::RetryContext;
use crate::resilience::timeouts::with_deadline;

const EVENT_CAPACITY: usize = 64;

/// Manages one authenticated session to a directory server.
///
/// Dropping the manager triggers shutdown; call [`ConnectionManager::shutdown`]
/// to also unbind the live session.
pub struct ConnectionManager<C: DirectoryConnector> {
    pub(crate) shared: Arc<Shared<C>>,
}

pub(crate) struct Shared<C: DirectoryConnector> {
    pub(crate) config: ConnectionConfig,
    pub(crate) connector: C,
    pub(crate) inner: Mutex<Inner<C::Session>>,
    pub(crate) status: watch::Sender<ConnectionStatus>,
    pub(crate) events: broadcast::Sender<ConnectionEvent>,
    pub(crate) notifier: Notifier,
    pub(crate) shutdown: Shutdown,
}

/// Everything guarded by the manager lock.
pub(crate) struct Inner<S> {
    pub(crate) state: ConnectionState,
    pub(crate) session: Option<S>,
    pub(crate) session_id: Option<Uuid>,
    pub(crate) retry: RetryContext,
    /// Error returned to callers while in a terminal `Failed` state.
    pub(crate) terminal: Option<ConnectionError>,
    pub(crate) last_error: Option<String>,
    pub(crate) reconnect_timer: TimerSlot,
    pub(crate) health_timer: TimerSlot,
}

impl<S> Inner<S> {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: None,
            session_id: None,
            retry: RetryContext::new(),
            terminal: None,
            last_error: None,
            reconnect_timer: TimerSlot::new(),
            health_timer: TimerSlot::new(),
        }
    }
}

impl<C: DirectoryConnector> ConnectionManager<C> {
    pub fn new(config: ConnectionConfig, connector: C) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tracing::info!(
            url = %config.url(),
            bind_identity = %config.credentials.bind_identity,
            base_dn = %config.base_dn,
            max_retries = config.retry.max_retries,
            health_check_secs = config.health_check_interval.as_secs_f64(),
            "Connection manager created"
        );
        if !config.use_tls {
            tracing::warn!(server = %config.server, "TLS disabled; credentials are sent in clear text");
        }

        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                inner: Mutex::new(Inner::new()),
                status,
                events,
                notifier: Notifier::new(),
                shutdown: Shutdown::new(),
            }),
        }
    }

    /// Register the authentication-failure callback. Last registration wins.
    ///
    /// The callback runs on the manager's task with the manager lock held;
    /// it must not call back into the manager.
    pub fn on_authentication_failure<F>(&self, callback: F)
    where
        F: Fn(&AuthenticationFailure) + Send + Sync + 'static,
    {
        self.shared
            .notifier
            .set_auth_failure_handler(Arc::new(callback));
    }

    /// Register the retries-exhausted callback. Last registration wins.
    pub fn on_retries_exhausted<F>(&self, callback: F)
    where
        F: Fn(&RetriesExhausted) + Send + Sync + 'static,
    {
        self.shared
            .notifier
            .set_retries_exhausted_handler(Arc::new(callback));
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.status.borrow().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.status.borrow().last_error.clone()
    }

    /// Receiver that observes every published status snapshot.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Subscribe to connection events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_triggered()
    }

    /// Open the session if needed and wait until it is usable.
    ///
    /// Returns immediately when already connected. While a reconnect cycle
    /// is running this waits for its outcome.
    pub async fn connect(&self) -> ConnectionResult<()> {
        self.shared.acquire().await.map(drop)
    }

    /// Start a fresh connection cycle after a terminal failure.
    ///
    /// Clears the retry counter and the terminal error, then behaves like
    /// [`ConnectionManager::connect`]. Outside `Failed` this is `connect`.
    pub async fn restart(&self) -> ConnectionResult<()> {
        {
            let mut inner = self.shared.inner.lock().await;
            if self.shared.shutdown.is_triggered() {
                return Err(ConnectionError::ManagerClosed);
            }
            if inner.state == ConnectionState::Failed {
                tracing::info!(
                    previous = ?inner.terminal,
                    "Restarting connection cycle"
                );
                inner.terminal = None;
                inner.retry.reset();
                match self.shared.connect_locked(&mut inner).await {
                    Ok(()) | Err(ConnectionError::Transient { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        self.connect().await
    }

    /// Stop timers, unbind the session and move to `Disconnected`.
    ///
    /// Idempotent. Operations in flight observe `ManagerClosed`.
    pub async fn shutdown(&self) {
        let first = self.shared.shutdown.trigger();
        let mut inner = self.shared.inner.lock().await;

        let reconnect_pending = inner.reconnect_timer.cancel();
        let health_check_armed = inner.health_timer.is_armed();
        let released = self.shared.release_session(&mut inner).await;
        self.shared
            .transition(&mut inner, ConnectionState::Disconnected, None);

        if first {
            tracing::info!(
                reconnect_pending,
                health_check_armed,
                session_released = released,
                "Connection manager shut down"
            );
        } else {
            tracing::debug!("Connection manager already shut down");
        }
    }
}

impl<C: DirectoryConnector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        if self.shared.shutdown.trigger() {
            tracing::debug!("Connection manager dropped without explicit shutdown");
        }
    }
}

impl<C: DirectoryConnector> Shared<C> {
    fn publish_status(&self, inner: &Inner<C::Session>) {
        self.status.send_replace(ConnectionStatus {
            state: inner.state,
            retry_attempt: inner.retry.attempts(),
            last_error: inner.last_error.clone(),
            session_id: inner.session_id,
        });
    }

    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Apply a state change. Undefined transitions are refused and logged.
    pub(crate) fn transition(
        &self,
        inner: &mut Inner<C::Session>,
        next: ConnectionState,
        failure: Option<&FailureDetail>,
    ) {
        let prev = inner.state;
        if prev == next {
            return;
        }
        if !prev.can_transition_to(next) {
            tracing::error!(from = %prev, to = %next, "Refusing undefined state transition");
            return;
        }
        debug_assert_eq!(
            inner.session.is_some(),
            next == ConnectionState::Connected,
            "a session exists exactly while connected"
        );

        inner.state = next;
        match failure {
            Some(failure) => {
                inner.last_error = Some(failure.message.clone());
                tracing::warn!(
                    from = %prev,
                    to = %next,
                    kind = %failure.kind,
                    origin = %failure.origin,
                    error = %failure.message,
                    "Connection state changed"
                );
            }
            None => tracing::info!(from = %prev, to = %next, "Connection state changed"),
        }

        metrics::record_state(next);
        self.publish_status(inner);
        self.emit(ConnectionEvent::StateChanged {
            from: prev,
            to: next,
            failure: failure.cloned(),
        });
    }

    /// Wait until the session is usable and return the locked state.
    pub(crate) async fn acquire(
        self: &Arc<Self>,
    ) -> ConnectionResult<MutexGuard<'_, Inner<C::Session>>> {
        loop {
            let mut inner = self.inner.lock().await;
            if self.shutdown.is_triggered() {
                return Err(ConnectionError::ManagerClosed);
            }

            let state = inner.state;
            match state {
                ConnectionState::Connected => return Ok(inner),
                ConnectionState::Disconnected => {
                    let opened = self.connect_locked(&mut inner).await;
                    match opened {
                        Ok(()) => return Ok(inner),
                        // A reconnect is now scheduled; wait for it like everyone else.
                        Err(ConnectionError::Transient { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                ConnectionState::Failed => return Err(self.terminal_error(&inner)),
                ConnectionState::Connecting | ConnectionState::Reconnecting => {}
            }

            // Subscribe before unlocking so the next transition is not missed.
            let mut status = self.status.subscribe();
            drop(inner);

            let mut shutdown = self.shutdown.subscribe();
            tokio::select! {
                changed = status.changed() => {
                    if changed.is_err() {
                        return Err(ConnectionError::ManagerClosed);
                    }
                }
                _ = shutdown.recv() => return Err(ConnectionError::ManagerClosed),
            }
        }
    }

    fn terminal_error(&self, inner: &Inner<C::Session>) -> ConnectionError {
        inner.terminal.clone().unwrap_or_else(|| ConnectionError::Transient {
            message: inner
                .last_error
                .clone()
                .unwrap_or_else(|| "connection failed".to_string()),
        })
    }

    /// Bind a new session. Caller holds the lock.
    pub(crate) async fn connect_locked(
        self: &Arc<Self>,
        inner: &mut Inner<C::Session>,
    ) -> ConnectionResult<()> {
        if self.shutdown.is_triggered() {
            return Err(ConnectionError::ManagerClosed);
        }

        self.release_session(inner).await;
        self.transition(inner, ConnectionState::Connecting, None);
        tracing::debug!(
            url = %self.config.url(),
            bind_identity = %self.config.credentials.bind_identity,
            attempt = inner.retry.attempts(),
            "Binding to directory"
        );

        let mut shutdown = self.shutdown.subscribe();
        let bound = tokio::select! {
            result = with_deadline("bind", self.config.timeouts.bind, self.connector.bind(&self.config)) => result,
            _ = shutdown.recv() => return Err(ConnectionError::ManagerClosed),
        };

        match bound {
            Ok(session) => {
                let session_id = Uuid::new_v4();
                inner.session = Some(session);
                inner.session_id = Some(session_id);
                inner.retry.reset();
                inner.terminal = None;
                inner.last_error = None;
                self.transition(inner, ConnectionState::Connected, None);
                tracing::info!(
                    session_id = %session_id,
                    url = %self.config.url(),
                    "Directory session established"
                );
                self.arm_health(inner);
                Ok(())
            }
            Err(message) => Err(self.handle_failure(inner, FailureOrigin::Bind, message).await),
        }
    }

    /// Single failure path for bind, operation and health-check failures.
    ///
    /// Cleans up the session, enters `Failed`, then either ends the cycle
    /// (authentication, exhausted retries) or schedules a reconnect. The
    /// returned error is what the failing caller should see.
    pub(crate) async fn handle_failure(
        self: &Arc<Self>,
        inner: &mut Inner<C::Session>,
        origin: FailureOrigin,
        message: String,
    ) -> ConnectionError {
        let failure = FailureDetail::classify(origin, message);
        tracing::warn!(
            state = %inner.state,
            origin = %origin,
            kind = %failure.kind,
            marker = failure.marker(),
            error = %failure.message,
            "Directory failure"
        );
        metrics::record_failure(failure.kind, origin);

        self.release_session(inner).await;
        self.transition(inner, ConnectionState::Failed, Some(&failure));

        if failure.kind.is_retryable() {
            self.schedule_reconnect(inner, failure)
        } else {
            self.fail_authentication(inner, failure)
        }
    }

    fn fail_authentication(
        &self,
        inner: &mut Inner<C::Session>,
        failure: FailureDetail,
    ) -> ConnectionError {
        inner.reconnect_timer.cancel();
        let error = ConnectionError::Authentication {
            message: failure.message.clone(),
        };
        inner.terminal = Some(error.clone());

        tracing::error!(
            origin = %failure.origin,
            error = %failure.message,
            "Credentials rejected; reconnects stopped"
        );

        let notice = AuthenticationFailure {
            origin: failure.origin,
            message: failure.message,
        };
        self.emit(ConnectionEvent::AuthenticationFailed(notice.clone()));
        self.notifier.authentication_failed(&notice);
        error
    }

    fn schedule_reconnect(
        self: &Arc<Self>,
        inner: &mut Inner<C::Session>,
        failure: FailureDetail,
    ) -> ConnectionError {
        let policy = &self.config.retry;
        let Some(delay) = inner.retry.schedule(policy) else {
            let attempts = inner.retry.attempts();
            let error = ConnectionError::RetriesExhausted {
                attempts,
                last_error: failure.message.clone(),
            };
            inner.terminal = Some(error.clone());

            tracing::error!(
                attempts,
                max_retries = policy.max_retries,
                error = %failure.message,
                "Reconnect retries exhausted"
            );
            metrics::record_retries_exhausted();
            self.publish_status(inner);

            let notice = RetriesExhausted {
                attempts,
                last_error: failure.message,
            };
            self.emit(ConnectionEvent::RetriesExhausted(notice.clone()));
            self.notifier.retries_exhausted(&notice);
            return error;
        };

        let attempt = inner.retry.attempts();
        self.transition(inner, ConnectionState::Reconnecting, None);
        tracing::info!(
            attempt,
            max_retries = policy.max_retries,
            delay_secs = delay.as_secs_f64(),
            "Reconnect scheduled"
        );
        metrics::record_reconnect_scheduled();

        let token = inner.reconnect_timer.next_token();
        let handle = tokio::spawn(reconnect_after(
            Arc::downgrade(self),
            token,
            delay,
            self.shutdown.subscribe(),
        ));
        inner.reconnect_timer.arm(token, handle);

        self.emit(ConnectionEvent::ReconnectScheduled {
            attempt,
            max_retries: policy.max_retries,
            delay,
        });
        ConnectionError::Transient {
            message: failure.message,
        }
    }

    /// Stop health checks and unbind the session, if any.
    ///
    /// Unbind failures are logged and otherwise ignored. Returns whether a
    /// session was released.
    pub(crate) async fn release_session(&self, inner: &mut Inner<C::Session>) -> bool {
        inner.health_timer.cancel();
        let Some(mut session) = inner.session.take() else {
            return false;
        };
        let session_id = inner.session_id.take();

        match with_deadline("unbind", self.config.timeouts.operation, session.unbind()).await {
            Ok(()) => tracing::debug!(session_id = ?session_id, "Session released"),
            Err(e) => tracing::debug!(
                session_id = ?session_id,
                error = %e,
                "Unbind failed; dropping session"
            ),
        }
        true
    }

    fn arm_health(self: &Arc<Self>, inner: &mut Inner<C::Session>) {
        let interval = self.config.health_check_interval;
        if interval.is_zero() {
            tracing::debug!("Health checks disabled");
            return;
        }
        if tokio::time::Instant::now().checked_add(interval).is_none() {
            tracing::warn!(
                interval_secs = interval.as_secs_f64(),
                "Health check interval out of range; health checks disabled"
            );
            return;
        }

        let token = inner.health_timer.next_token();
        let monitor = HealthMonitor::new(Arc::downgrade(self), interval, token);
        let handle = tokio::spawn(monitor.run(self.shutdown.subscribe()));
        inner.health_timer.arm(token, handle);
    }
}

fn reconnect_after<C: DirectoryConnector>(
    manager: Weak<Shared<C>>,
    token: u64,
    delay: Duration,
    mut shutdown: ShutdownSignal,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => return,
        }

        let Some(shared) = manager.upgrade() else {
            return;
        };
        let mut inner = shared.inner.lock().await;
        if !inner.reconnect_timer.disarm(token) || inner.state != ConnectionState::Reconnecting {
            tracing::debug!(token, "Stale reconnect timer ignored");
            return;
        }

        // Failures are handled and logged inside; a new timer may be armed.
        let _ = shared.connect_locked(&mut inner).await;
    })
}
