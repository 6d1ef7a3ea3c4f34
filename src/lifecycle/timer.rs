//! One-shot and periodic timer bookkeeping.
//!
//! A `TimerSlot` holds at most one armed background task. Each arm gets a
//! fresh token; a task that wakes up checks its token against the slot so a
//! cancelled or replaced timer never acts.

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Option<(u64, JoinHandle<()>)>,
    last_token: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the token for the next `arm`.
    pub fn next_token(&mut self) -> u64 {
        self.last_token += 1;
        self.last_token
    }

    /// Arm `handle` under `token`, cancelling whatever was armed before.
    pub fn arm(&mut self, token: u64, handle: JoinHandle<()>) {
        self.cancel();
        self.armed = Some((token, handle));
    }

    /// Abort the armed task, if any. Returns whether something was armed.
    ///
    /// Must not be called from the armed task itself; use `disarm` there.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Release the slot from inside the task that owns `token`, without
    /// aborting it. Returns `false` if the slot no longer belongs to `token`.
    pub fn disarm(&mut self, token: u64) -> bool {
        if self.is_current(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_current(&self, token: u64) -> bool {
        matches!(self.armed, Some((armed, _)) if armed == token)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}
