//! Shared utilities for integration tests: a scripted directory server.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use dirsession::config::{ConnectionConfig, Credentials, RetryPolicy, Timeouts};
use dirsession::{
    ConnectionEvent, ConnectionState, DirectoryConnector, DirectoryError, DirectorySession,
};

pub const INVALID_CREDENTIALS: &str =
    "LDAP operation result: rc=49 (invalidCredentials), text: 80090308: LdapErr: DSID-0C09044E, data 52e";
pub const UNREACHABLE: &str = "Can't contact LDAP server";

/// Scripted outcome of one bind, probe or operation.
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    Fail(String),
    /// Never completes; only a timeout or shutdown ends it.
    Hang,
}

impl Step {
    pub fn fail(message: &str) -> Self {
        Step::Fail(message.to_string())
    }
}

struct Script {
    queue: VecDeque<Step>,
    fallback: Step,
}

impl Script {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: Step::Ok,
        }
    }

    fn next(&mut self) -> Step {
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// In-memory directory server whose answers are scripted per call.
pub struct MockDirectory {
    binds: Mutex<Script>,
    probes: Mutex<Script>,
    ops: Mutex<Script>,
    bind_count: AtomicU32,
    unbind_count: AtomicU32,
    probe_count: AtomicU32,
    op_count: AtomicU32,
    bind_times: Mutex<Vec<Instant>>,
    in_use: AtomicBool,
    overlaps: AtomicU32,
}

impl MockDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            binds: Mutex::new(Script::new()),
            probes: Mutex::new(Script::new()),
            ops: Mutex::new(Script::new()),
            bind_count: AtomicU32::new(0),
            unbind_count: AtomicU32::new(0),
            probe_count: AtomicU32::new(0),
            op_count: AtomicU32::new(0),
            bind_times: Mutex::new(Vec::new()),
            in_use: AtomicBool::new(false),
            overlaps: AtomicU32::new(0),
        })
    }

    pub fn connector(self: &Arc<Self>) -> MockConnector {
        MockConnector(self.clone())
    }

    pub fn script_binds(&self, steps: impl IntoIterator<Item = Step>) {
        self.binds.lock().unwrap().queue.extend(steps);
    }

    pub fn set_bind_fallback(&self, step: Step) {
        self.binds.lock().unwrap().fallback = step;
    }

    pub fn script_probes(&self, steps: impl IntoIterator<Item = Step>) {
        self.probes.lock().unwrap().queue.extend(steps);
    }

    pub fn set_probe_fallback(&self, step: Step) {
        self.probes.lock().unwrap().fallback = step;
    }

    pub fn script_ops(&self, steps: impl IntoIterator<Item = Step>) {
        self.ops.lock().unwrap().queue.extend(steps);
    }

    pub fn binds(&self) -> u32 {
        self.bind_count.load(Ordering::SeqCst)
    }

    pub fn unbinds(&self) -> u32 {
        self.unbind_count.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> u32 {
        self.probe_count.load(Ordering::SeqCst)
    }

    pub fn ops(&self) -> u32 {
        self.op_count.load(Ordering::SeqCst)
    }

    /// Operations that started while another was still running.
    pub fn overlaps(&self) -> u32 {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Bind start times relative to `start`.
    pub fn bind_offsets(&self, start: Instant) -> Vec<Duration> {
        self.bind_times
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start))
            .collect()
    }

    fn next_bind(&self) -> Step {
        self.binds.lock().unwrap().next()
    }

    fn next_probe(&self) -> Step {
        self.probes.lock().unwrap().next()
    }

    fn next_op(&self) -> Step {
        self.ops.lock().unwrap().next()
    }
}

pub struct MockConnector(Arc<MockDirectory>);

#[async_trait]
impl DirectoryConnector for MockConnector {
    type Session = MockSession;

    async fn bind(&self, _config: &ConnectionConfig) -> Result<MockSession, DirectoryError> {
        let directory = self.0.clone();
        directory.bind_count.fetch_add(1, Ordering::SeqCst);
        directory.bind_times.lock().unwrap().push(Instant::now());

        let step = directory.next_bind();
        match step {
            Step::Ok => Ok(MockSession { directory }),
            Step::Fail(message) => Err(DirectoryError::new(message)),
            Step::Hang => std::future::pending().await,
        }
    }
}

pub struct MockSession {
    directory: Arc<MockDirectory>,
}

impl MockSession {
    /// A directory read that takes a little simulated time.
    pub async fn lookup(&mut self, dn: &str) -> Result<String, DirectoryError> {
        let directory = self.directory.clone();
        if directory.in_use.swap(true, Ordering::SeqCst) {
            directory.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        directory.op_count.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        directory.in_use.store(false, Ordering::SeqCst);

        let step = directory.next_op();
        match step {
            Step::Ok => Ok(format!("entry:{}", dn)),
            Step::Fail(message) => Err(DirectoryError::new(message)),
            Step::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl DirectorySession for MockSession {
    async fn probe(&mut self, _base_dn: &str) -> Result<(), DirectoryError> {
        self.directory.probe_count.fetch_add(1, Ordering::SeqCst);
        let step = self.directory.next_probe();
        match step {
            Step::Ok => Ok(()),
            Step::Fail(message) => Err(DirectoryError::new(message)),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        self.directory.unbind_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connection settings with whole-second delays, 5s timeouts and health
/// checks disabled.
pub fn config(max_retries: u32, initial_secs: u64, max_secs: u64) -> ConnectionConfig {
    ConnectionConfig::new(
        "ldap.example.com",
        "dc=example,dc=com",
        Credentials::new("cn=svc,dc=example,dc=com", "secret"),
    )
    .with_retry(RetryPolicy {
        max_retries,
        initial_delay: Duration::from_secs(initial_secs),
        max_delay: Duration::from_secs(max_secs),
        jitter: false,
    })
    .with_timeouts(Timeouts {
        bind: Duration::from_secs(5),
        operation: Duration::from_secs(5),
    })
    .with_health_check_interval(Duration::ZERO)
}

/// Operation used by most tests: read the base entry.
pub fn read_base(session: &mut MockSession) -> BoxFuture<'_, Result<String, DirectoryError>> {
    Box::pin(session.lookup("dc=example,dc=com"))
}

/// Everything currently buffered on `events`.
pub fn drain(events: &mut broadcast::Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn transitions(events: &[ConnectionEvent]) -> Vec<(ConnectionState, ConnectionState)> {
    events
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::StateChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

pub fn scheduled_delays(events: &[ConnectionEvent]) -> Vec<Duration> {
    events
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::ReconnectScheduled { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect()
}

pub fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|s| Duration::from_secs(*s)).collect()
}

/// Counts callback invocations.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicU32>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}
