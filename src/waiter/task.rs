//! Per-wait state machine.
//!
//! A [`WaitTask`] leaves `Pending` exactly once. Whichever of match, expiry or
//! cancellation takes the task lock first wins and completes the wait: it
//! unregisters the task, resolves the handle and releases the in-flight slot.
//! The others observe a settled slot and do nothing.
//!
//! ```text
//! Pending ──match claim──► Matching ──transform──► Resolved(Matched | Err)
//!    │
//!    ├──deadline──► Resolved(TimedOut)
//!    ├──cancel────► Resolved(Cancelled)
//!    └──pool gone─► Resolved(Err(Disconnected))
//! ```
//!
//! Callbacks run with the task lock released so they may re-enter the
//! coordinator.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::{CallbackStage, ExecutionError, WaitResult};
use crate::kind::{EventKind, WaitId};

use super::handle::WaitOutcome;
use super::lifecycle::Lifecycle;
use super::registry::WaiterRegistry;

pub(crate) type Condition<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
pub(crate) type Transform<E, R> = Box<dyn FnOnce(&E) -> R + Send>;
pub(crate) type Reply<R> = oneshot::Sender<WaitResult<WaitOutcome<R>>>;

thread_local! {
    /// Owners of the callbacks running on this thread, innermost last.
    static ACTIVE_CALLBACKS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// True while the current thread is running a wait condition or transform
/// belonging to the coordinator identified by `owner`.
pub(crate) fn in_callback_of(owner: u64) -> bool {
    ACTIVE_CALLBACKS.with(|active| active.borrow().contains(&owner))
}

struct CallbackScope;

impl CallbackScope {
    fn enter(owner: u64) -> Self {
        ACTIVE_CALLBACKS.with(|active| active.borrow_mut().push(owner));
        Self
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        ACTIVE_CALLBACKS.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

/// Why a still-pending task is being expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// Deadline reached.
    TimedOut,
    /// The task could not be armed (pool closed).
    Abandoned,
}

/// Where a completed task reports back to.
pub(crate) struct Tracking {
    registry: Weak<WaiterRegistry>,
    lifecycle: Arc<Lifecycle>,
}

impl Tracking {
    pub(crate) fn new(registry: &Arc<WaiterRegistry>, lifecycle: &Arc<Lifecycle>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            lifecycle: Arc::clone(lifecycle),
        }
    }
}

enum Slot<E, R> {
    Pending(Transform<E, R>),
    Matching,
    Resolved,
}

impl<E, R> Slot<E, R> {
    const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

struct TaskState<E, R> {
    slot: Slot<E, R>,
    reply: Option<Reply<R>>,
}

/// Type-erased view of a wait task, as stored in the registry and armed in
/// the expiry workers.
pub(crate) trait PendingWait: Send + Sync {
    fn id(&self) -> WaitId;

    fn kind(&self) -> EventKind;

    fn deadline(&self) -> Instant;

    /// Evaluate the condition and, on success, claim the task and run the
    /// transform. Returns true if this call matched the task.
    fn try_match(&self, event: &dyn Any) -> bool;

    /// True once the task has left `Pending`.
    fn is_settled(&self) -> bool;

    /// Complete a pending task as cancelled. Returns true if this call won.
    fn cancel(&self) -> bool;

    /// Complete a pending task per `expiry`. A task already claimed by a
    /// match is left to the matcher. Returns true if this call won.
    fn expire(&self, expiry: Expiry) -> bool;
}

pub(crate) struct WaitTask<E, R> {
    id: WaitId,
    deadline: Instant,
    condition: Condition<E>,
    state: Mutex<TaskState<E, R>>,
    tracking: Tracking,
}

impl<E: Any, R: Send + 'static> WaitTask<E, R> {
    pub(crate) fn new(
        condition: Condition<E>,
        on_match: Transform<E, R>,
        reply: Reply<R>,
        deadline: Instant,
        tracking: Tracking,
    ) -> Self {
        Self {
            id: WaitId::new(),
            deadline,
            condition,
            state: Mutex::new(TaskState {
                slot: Slot::Pending(on_match),
                reply: Some(reply),
            }),
            tracking,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskState<E, R>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn owner(&self) -> u64 {
        self.tracking.lifecycle.owner()
    }

    /// Unregister, resolve the handle, release the in-flight slot.
    fn complete(&self, reply: Option<Reply<R>>, outcome: WaitResult<WaitOutcome<R>>) {
        if let Some(registry) = self.tracking.registry.upgrade() {
            registry.remove(self.kind(), self.id);
        }

        let label = match &outcome {
            Ok(outcome) => outcome.as_label(),
            Err(err) => err.as_label(),
        };
        debug!(wait_id = %self.id, kind = %self.kind(), outcome = label, "wait resolved");

        if let Some(reply) = reply {
            if reply.send(outcome).is_err() {
                debug!(wait_id = %self.id, "wait handle dropped before resolution");
            }
        }
        self.tracking.lifecycle.finish();
    }

    /// Complete the task with `outcome` if it is still pending.
    fn resolve_pending(&self, outcome: WaitResult<WaitOutcome<R>>) -> bool {
        let (unused, reply) = {
            let mut state = self.lock();
            if !state.slot.is_pending() {
                return false;
            }
            let unused = std::mem::replace(&mut state.slot, Slot::Resolved);
            (unused, state.reply.take())
        };
        // The transform may own caller state; drop it with the lock released.
        drop(unused);
        self.complete(reply, outcome);
        true
    }

    fn claim_and_transform(&self, event: &E) -> bool {
        let transform = {
            let mut state = self.lock();
            match std::mem::replace(&mut state.slot, Slot::Matching) {
                Slot::Pending(transform) => transform,
                other => {
                    state.slot = other;
                    return false;
                }
            }
        };

        let produced = {
            let _scope = CallbackScope::enter(self.owner());
            panic::catch_unwind(AssertUnwindSafe(|| transform(event)))
        };

        let matched = produced.is_ok();
        let outcome = match produced {
            Ok(value) => Ok(WaitOutcome::Matched(value)),
            Err(_) => {
                error!(wait_id = %self.id, kind = %self.kind(), "wait transform panicked");
                Err(ExecutionError::CallbackPanicked {
                    wait_id: self.id,
                    stage: CallbackStage::Transform,
                }
                .into())
            }
        };

        let reply = {
            let mut state = self.lock();
            state.slot = Slot::Resolved;
            state.reply.take()
        };
        self.complete(reply, outcome);
        matched
    }
}

impl<E: Any, R: Send + 'static> PendingWait for WaitTask<E, R> {
    fn id(&self) -> WaitId {
        self.id
    }

    fn kind(&self) -> EventKind {
        EventKind::of::<E>()
    }

    fn deadline(&self) -> Instant {
        self.deadline
    }

    fn try_match(&self, event: &dyn Any) -> bool {
        let Some(event) = event.downcast_ref::<E>() else {
            return false;
        };
        if self.is_settled() {
            return false;
        }

        let verdict = {
            let _scope = CallbackScope::enter(self.owner());
            panic::catch_unwind(AssertUnwindSafe(|| (self.condition)(event)))
        };

        match verdict {
            Ok(false) => false,
            Ok(true) => self.claim_and_transform(event),
            Err(_) => {
                error!(wait_id = %self.id, kind = %self.kind(), "wait condition panicked");
                self.resolve_pending(Err(ExecutionError::CallbackPanicked {
                    wait_id: self.id,
                    stage: CallbackStage::Condition,
                }
                .into()));
                false
            }
        }
    }

    fn is_settled(&self) -> bool {
        !self.lock().slot.is_pending()
    }

    fn cancel(&self) -> bool {
        self.resolve_pending(Ok(WaitOutcome::Cancelled))
    }

    fn expire(&self, expiry: Expiry) -> bool {
        let outcome = match expiry {
            Expiry::TimedOut => Ok(WaitOutcome::TimedOut),
            Expiry::Abandoned => Err(ExecutionError::Disconnected {
                path: "waiter_pool".to_string(),
            }
            .into()),
        };
        self.resolve_pending(outcome)
    }
}
