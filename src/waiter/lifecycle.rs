//! Coordinator lifecycle and in-flight accounting.
//!
//! ```text
//! Running ──shutdown()──► Draining ──all waits done / drain timeout──► Stopped
//! ```
//!
//! Admission and the state check happen under the same lock, so a wait can
//! never slip in after draining has started.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{ExecutionError, WaitResult};

/// Externally visible coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    /// Accepting new waits.
    Running,
    /// Shutdown began; existing waits may still resolve.
    Draining,
    /// Terminal.
    Stopped,
}

#[derive(Debug)]
struct Inner {
    state: WaiterState,
    in_flight: usize,
}

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub(crate) struct Lifecycle {
    owner: u64,
    inner: Mutex<Inner>,
    idle: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(Inner {
                state: WaiterState::Running,
                in_flight: 0,
            }),
            idle: Condvar::new(),
        }
    }

    /// Identifies the owning coordinator within this process.
    pub(crate) const fn owner(&self) -> u64 {
        self.owner
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a new wait, or reject it once shutdown has begun.
    pub(crate) fn admit(&self) -> WaitResult<()> {
        let mut inner = self.lock();
        if inner.state != WaiterState::Running {
            return Err(ExecutionError::ShuttingDown.into());
        }
        inner.in_flight += 1;
        Ok(())
    }

    /// A wait completed (matched, expired, cancelled or abandoned).
    pub(crate) fn finish(&self) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if inner.in_flight == 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn state(&self) -> WaiterState {
        self.lock().state
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Leave `Running`. Returns true if this call made the transition.
    pub(crate) fn begin_drain(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == WaiterState::Running {
            inner.state = WaiterState::Draining;
            true
        } else {
            false
        }
    }

    /// Wait up to `timeout` for in-flight waits to complete, then stop.
    /// Returns whether everything drained.
    pub(crate) fn await_drain(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (mut inner, _) = self
            .idle
            .wait_timeout_while(inner, timeout, |i| i.in_flight > 0)
            .unwrap_or_else(PoisonError::into_inner);
        inner.state = WaiterState::Stopped;
        inner.in_flight == 0
    }
}
