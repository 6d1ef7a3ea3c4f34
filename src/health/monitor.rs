//! Periodic session probing.
//!
//! # Responsibilities
//! - Probe the live session every `health_check_interval`
//! - Hand a failed probe to the manager's failure path
//!
//! # Design Decisions
//! - One monitor per session. It is armed on entering `Connected` and
//!   cancelled whenever the session is released
//! - The first probe runs one full interval after connecting
//! - Probes run under the manager lock, so they never overlap an operation

use futures_util::future::BoxFuture;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::connection::events::FailureOrigin;
use crate::connection::manager::Shared;
use crate::connection::session::{DirectoryConnector, DirectorySession};
use crate::connection::state::ConnectionState;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Outcome of one probe, as seen by the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HealthVerdict {
    Healthy,
    /// The session is gone or replaced; the monitor exits.
    Stop,
}

pub(crate) struct HealthMonitor<C: DirectoryConnector> {
    manager: Weak<Shared<C>>,
    interval: Duration,
    token: u64,
}

impl<C: DirectoryConnector> HealthMonitor<C> {
    pub(crate) fn new(manager: Weak<Shared<C>>, interval: Duration, token: u64) -> Self {
        Self {
            manager,
            interval,
            token,
        }
    }

    pub(crate) fn run(self, mut shutdown: ShutdownSignal) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tracing::debug!(
                interval_secs = self.interval.as_secs_f64(),
                token = self.token,
                "Health monitor started"
            );

            let Some(first) = Instant::now().checked_add(self.interval) else {
                tracing::warn!(
                    interval_secs = self.interval.as_secs_f64(),
                    token = self.token,
                    "Health check interval out of range; health checks disabled"
                );
                return;
            };
            let mut ticker = time::interval_at(first, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(shared) = self.manager.upgrade() else {
                            break;
                        };
                        if shared.health_check(self.token).await == HealthVerdict::Stop {
                            break;
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }

            tracing::debug!(token = self.token, "Health monitor stopped");
        })
    }
}

impl<C: DirectoryConnector> Shared<C> {
    /// Probe the session owned by the monitor holding `token`.
    pub(crate) async fn health_check(self: &Arc<Self>, token: u64) -> HealthVerdict {
        let mut inner = self.inner.lock().await;
        if !inner.health_timer.is_current(token) || inner.state != ConnectionState::Connected {
            return HealthVerdict::Stop;
        }
        let Some(session) = inner.session.as_mut() else {
            return HealthVerdict::Stop;
        };

        let mut shutdown = self.shutdown.subscribe();
        let probe = tokio::select! {
            result = with_deadline("health probe", self.config.timeouts.operation, session.probe(&self.config.base_dn)) => result,
            _ = shutdown.recv() => return HealthVerdict::Stop,
        };

        match probe {
            Ok(()) => {
                metrics::record_health_probe(true);
                tracing::debug!(session_id = ?inner.session_id, "Health probe succeeded");
                HealthVerdict::Healthy
            }
            Err(message) => {
                metrics::record_health_probe(false);
                // Release our own slot first; the failure path cancels whatever is armed.
                inner.health_timer.disarm(token);
                self.handle_failure(&mut inner, FailureOrigin::HealthCheck, message)
                    .await;
                HealthVerdict::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, Credentials};
    use crate::connection::manager::ConnectionManager;
    use crate::connection::session::DirectoryError;
    use crate::lifecycle::Shutdown;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Probes {
        count: AtomicU32,
        fail_after: u32,
    }

    struct Connector(Arc<Probes>);
    struct Session(Arc<Probes>);

    #[async_trait]
    impl DirectoryConnector for Connector {
        type Session = Session;

        async fn bind(&self, _config: &ConnectionConfig) -> Result<Session, DirectoryError> {
            Ok(Session(self.0.clone()))
        }
    }

    #[async_trait]
    impl DirectorySession for Session {
        async fn probe(&mut self, _base_dn: &str) -> Result<(), DirectoryError> {
            let n = self.0.count.fetch_add(1, Ordering::SeqCst) + 1;
            if n > self.0.fail_after {
                Err(DirectoryError::new("Can't contact LDAP server"))
            } else {
                Ok(())
            }
        }

        async fn unbind(&mut self) -> Result<(), DirectoryError> {
            Ok(())
        }
    }

    fn config(interval: Duration) -> ConnectionConfig {
        ConnectionConfig::new(
            "ldap.example.com",
            "dc=example,dc=com",
            Credentials::new("cn=svc,dc=example,dc=com", "secret"),
        )
        .with_health_check_interval(interval)
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_follow_interval() {
        let probes = Arc::new(Probes {
            fail_after: u32::MAX,
            ..Default::default()
        });
        let manager = ConnectionManager::new(config(Duration::from_secs(30)), Connector(probes.clone()));
        manager.connect().await.unwrap();
        assert!(manager.shared.inner.lock().await.health_timer.is_armed());

        time::sleep(Duration::from_secs(29)).await;
        assert_eq!(probes.count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(62)).await;
        assert_eq!(probes.count.load(Ordering::SeqCst), 3);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_starts_reconnect() {
        let probes = Arc::new(Probes {
            fail_after: 1,
            ..Default::default()
        });
        let manager = ConnectionManager::new(config(Duration::from_secs(10)), Connector(probes.clone()));
        let mut status = manager.watch_status();
        manager.connect().await.unwrap();

        status
            .wait_for(|s| s.state == ConnectionState::Reconnecting)
            .await
            .unwrap();
        assert_eq!(probes.count.load(Ordering::SeqCst), 2);
        assert_eq!(manager.last_error().as_deref(), Some("Can't contact LDAP server"));

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_disables_probing() {
        let probes = Arc::new(Probes::default());
        let manager = ConnectionManager::new(config(Duration::ZERO), Connector(probes.clone()));
        manager.connect().await.unwrap();

        time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(probes.count.load(Ordering::SeqCst), 0);
        assert_eq!(manager.state(), ConnectionState::Connected);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_interval_stops_monitor() {
        let shutdown = Shutdown::new();
        let monitor = HealthMonitor::<Connector>::new(Weak::new(), Duration::MAX, 1);

        let finished = time::timeout(Duration::from_secs(1), monitor.run(shutdown.subscribe())).await;
        assert!(finished.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_keeps_session_connected() {
        let probes = Arc::new(Probes::default());
        let manager = ConnectionManager::new(config(Duration::MAX), Connector(probes.clone()));
        manager.connect().await.unwrap();

        time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(probes.count.load(Ordering::SeqCst), 0);
        assert_eq!(manager.state(), ConnectionState::Connected);

        assert!(!manager.shared.inner.lock().await.health_timer.is_armed());

        manager.shutdown().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
