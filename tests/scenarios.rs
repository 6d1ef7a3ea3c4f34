//! End-to-end reconnect scenarios against the scripted directory.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

use dirsession::{ConnectionError, ConnectionManager, ConnectionState};

mod common;
use common::{
    config, drain, read_base, scheduled_delays, secs, transitions, Counter, MockDirectory, Step,
    INVALID_CREDENTIALS, UNREACHABLE,
};

#[tokio::test(start_paused = true)]
async fn test_rejected_credentials_on_first_connect() {
    let directory = MockDirectory::new();
    directory.set_bind_fallback(Step::fail(INVALID_CREDENTIALS));

    let manager = ConnectionManager::new(config(5, 1, 60), directory.connector());
    let auth_failures = Counter::default();
    let exhausted = Counter::default();
    let a = auth_failures.clone();
    manager.on_authentication_failure(move |_| a.hit());
    let e = exhausted.clone();
    manager.on_retries_exhausted(move |_| e.hit());
    let mut events = manager.subscribe();

    let err = manager.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Authentication { .. }));

    time::sleep(Duration::from_secs(300)).await;

    assert_eq!(directory.binds(), 1);
    assert_eq!(auth_failures.get(), 1);
    assert_eq!(exhausted.get(), 0);
    assert_eq!(manager.state(), ConnectionState::Failed);

    let events = drain(&mut events);
    assert!(scheduled_delays(&events).is_empty());
    assert_eq!(
        transitions(&events),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Failed),
        ]
    );

    // The terminal error sticks without new bind attempts.
    let err = manager.execute(read_base).await.unwrap_err();
    assert_eq!(err, ConnectionError::Authentication { message: INVALID_CREDENTIALS.to_string() });
    assert_eq!(directory.binds(), 1);
    assert_eq!(auth_failures.get(), 1);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_back_off_then_recover() {
    let directory = MockDirectory::new();
    directory.script_binds([
        Step::fail(UNREACHABLE),
        Step::fail(UNREACHABLE),
        Step::fail(UNREACHABLE),
        Step::Ok,
    ]);

    let manager = ConnectionManager::new(config(5, 1, 60), directory.connector());
    let mut events = manager.subscribe();
    let start = Instant::now();

    manager.connect().await.unwrap();

    let events = drain(&mut events);
    assert_eq!(scheduled_delays(&events), secs(&[1, 2, 4]));
    assert_eq!(directory.bind_offsets(start), secs(&[0, 1, 3, 7]));

    let status = manager.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.retry_attempt, 0);
    assert!(status.session_id.is_some());
    assert_eq!(status.last_error, None);

    assert_eq!(manager.execute(read_base).await.unwrap(), "entry:dc=example,dc=com");
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_delays_are_capped() {
    let directory = MockDirectory::new();
    directory.script_binds([
        Step::fail(UNREACHABLE),
        Step::fail(UNREACHABLE),
        Step::fail(UNREACHABLE),
        Step::fail(UNREACHABLE),
        Step::Ok,
    ]);

    let manager = ConnectionManager::new(config(5, 2, 5), directory.connector());
    let mut events = manager.subscribe();

    manager.connect().await.unwrap();
    assert_eq!(scheduled_delays(&drain(&mut events)), secs(&[2, 4, 5, 5]));

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_health_failure_then_hanging_server_exhausts_retries() {
    let directory = MockDirectory::new();
    directory.script_binds([Step::Ok]);
    directory.set_bind_fallback(Step::Hang);
    directory.set_probe_fallback(Step::Hang);

    let manager = ConnectionManager::new(
        config(5, 1, 60).with_health_check_interval(Duration::from_secs(30)),
        directory.connector(),
    );
    let auth_failures = Counter::default();
    let exhausted = Counter::default();
    let a = auth_failures.clone();
    manager.on_authentication_failure(move |_| a.hit());
    let e = exhausted.clone();
    manager.on_retries_exhausted(move |_| e.hit());
    let mut events = manager.subscribe();

    manager.connect().await.unwrap();
    // Probe at 30s times out at 35s, then five 5s bind timeouts separated
    // by 1+2+4+8+16s.
    time::sleep(Duration::from_secs(200)).await;

    let events = drain(&mut events);
    assert_eq!(scheduled_delays(&events), secs(&[1, 2, 4, 8, 16]));
    assert_eq!(exhausted.get(), 1);
    assert_eq!(auth_failures.get(), 0);
    assert_eq!(directory.probes(), 1);
    assert_eq!(directory.binds(), 6);
    assert_eq!(directory.unbinds(), 1);
    assert_eq!(manager.state(), ConnectionState::Failed);
    assert_eq!(manager.status().retry_attempt, 5);

    let err = manager.execute(read_base).await.unwrap_err();
    assert_eq!(
        err,
        ConnectionError::RetriesExhausted {
            attempts: 5,
            last_error: "bind timed out after 5.0s".to_string(),
        }
    );
    assert_eq!(directory.binds(), 6);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_reconnect() {
    let directory = MockDirectory::new();
    directory.script_ops([Step::fail("Server is unavailable")]);

    let manager = Arc::new(ConnectionManager::new(config(5, 1, 60), directory.connector()));
    manager.connect().await.unwrap();
    let mut events = manager.subscribe();

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.execute(read_base).await }
    });
    let second = tokio::spawn({
        let manager = manager.clone();
        async move { manager.execute(read_base).await }
    });

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());

    assert_eq!(directory.binds(), 2);
    assert_eq!(directory.ops(), 3);
    assert_eq!(directory.overlaps(), 0);
    assert_eq!(scheduled_delays(&drain(&mut events)), secs(&[1]));

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_exhaustion() {
    let directory = MockDirectory::new();
    directory.script_binds([Step::Ok]);
    directory.set_bind_fallback(Step::fail(UNREACHABLE));
    directory.script_ops([Step::fail("connection reset by peer")]);

    let manager = Arc::new(ConnectionManager::new(config(2, 1, 60), directory.connector()));
    let exhausted = Counter::default();
    let e = exhausted.clone();
    manager.on_retries_exhausted(move |_| e.hit());
    manager.connect().await.unwrap();

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.execute(read_base).await }
    });
    let second = tokio::spawn({
        let manager = manager.clone();
        async move { manager.execute(read_base).await }
    });

    let expected = ConnectionError::RetriesExhausted {
        attempts: 2,
        last_error: UNREACHABLE.to_string(),
    };
    assert_eq!(first.await.unwrap().unwrap_err(), expected);
    assert_eq!(second.await.unwrap().unwrap_err(), expected);
    assert_eq!(exhausted.get(), 1);
    assert_eq!(directory.binds(), 3);
    assert_eq!(directory.overlaps(), 0);

    manager.shutdown().await;
}
