//! Fixed-size expiry worker pool.
//!
//! Arming a wait sends its [`Timer`] over one FIFO channel. Whichever worker
//! receives it owns the deadline and keeps it in a local heap. Workers sleep in
//! `recv_timeout` until their earliest deadline or the next timer, so a wait
//! never occupies a worker and a short wait is never stuck behind a long one.
//!
//! Closing the channel lets each worker expire what it still holds on
//! schedule, then exit.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::config::EventWaiterConfig;
use crate::error::{ExecutionError, WaitResult};

use super::task::{Expiry, PendingWait};

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Deadline for one wait. Holds the task weakly: a wait that completed and
/// was released by its caller is not kept alive until its deadline.
pub(crate) struct Timer {
    deadline: Instant,
    task: Weak<dyn PendingWait>,
}

impl Timer {
    pub(crate) fn new(task: &Arc<dyn PendingWait>) -> Self {
        Self {
            deadline: task.deadline(),
            task: Arc::downgrade(task),
        }
    }

    fn is_live(&self) -> bool {
        self.task.upgrade().is_some_and(|task| !task.is_settled())
    }

    fn fire(&self) {
        let Some(task) = self.task.upgrade() else {
            return;
        };
        let wait_id = task.id();
        if panic::catch_unwind(AssertUnwindSafe(|| task.expire(Expiry::TimedOut))).is_err() {
            error!(%wait_id, "wait expiry panicked");
        }
    }
}

impl Eq for Timer {}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest deadline is on top.
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) enum Job {
    Arm(Timer),
}

pub(crate) struct WorkerPool {
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    pub(crate) fn start(cfg: &EventWaiterConfig) -> WaitResult<Self> {
        let size = cfg.workers_clamped();
        let (tx, rx) = unbounded::<Job>();

        let mut handles = Vec::with_capacity(size);
        for idx in 0..size {
            let rx: Receiver<Job> = rx.clone();
            let spawned = thread::Builder::new()
                .name(cfg.thread_name(idx))
                .spawn(move || worker_loop(&rx));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Dropping `tx` disconnects the workers already started.
                    return Err(ExecutionError::WorkerSpawn {
                        message: e.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            size,
        })
    }

    /// Queue a job. Hands the job back if the pool is closed.
    pub(crate) fn submit(&self, job: Job) -> Result<(), Job> {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => tx.send(job).map_err(|e| e.into_inner()),
            None => Err(job),
        }
    }

    /// Stop accepting jobs. Armed timers still fire.
    pub(crate) fn close(&self) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(tx);
    }

    /// Join workers after `close`. Skipped on a worker thread, which would
    /// otherwise wait on itself.
    pub(crate) fn join(&self) {
        if ON_WORKER.with(Cell::get) {
            return;
        }
        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            let _ = handle.join();
        }
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }
}

fn fire_due(timers: &mut BinaryHeap<Timer>) {
    let now = Instant::now();
    while timers.peek().is_some_and(|next| next.deadline <= now) {
        if let Some(timer) = timers.pop() {
            timer.fire();
        }
    }
}

fn worker_loop(rx: &Receiver<Job>) {
    ON_WORKER.with(|w| w.set(true));
    let mut timers = BinaryHeap::new();

    loop {
        fire_due(&mut timers);
        let received = match timers.peek() {
            Some(next) => rx.recv_timeout(next.deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(Job::Arm(timer)) => timers.push(timer),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    while let Some(timer) = timers.pop() {
        if timer.is_live() {
            thread::sleep(timer.deadline.saturating_duration_since(Instant::now()));
            timer.fire();
        }
    }
    debug!("expiry worker exiting");
}
