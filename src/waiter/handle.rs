//! Result handles for registered waits.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::{ExecutionError, WaitError, WaitResult};
use crate::kind::{EventKind, WaitId};

use super::task::PendingWait;

/// How a wait ended.
///
/// `TimedOut` is the explicit "no result" value: a wait that expires is not an
/// error, so callers must check the variant before using a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<R> {
    /// A dispatched event satisfied the condition; carries the transform output.
    Matched(R),
    /// The timeout elapsed with no matching event.
    TimedOut,
    /// The wait was cancelled through [`WaitHandle::cancel`].
    Cancelled,
}

impl<R> WaitOutcome<R> {
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The matched result, if any.
    #[must_use]
    pub fn into_matched(self) -> Option<R> {
        match self {
            Self::Matched(r) => Some(r),
            Self::TimedOut | Self::Cancelled => None,
        }
    }

    /// Map the matched result, keeping sentinels as they are.
    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> WaitOutcome<U> {
        match self {
            Self::Matched(r) => WaitOutcome::Matched(f(r)),
            Self::TimedOut => WaitOutcome::TimedOut,
            Self::Cancelled => WaitOutcome::Cancelled,
        }
    }

    /// Returns a short stable label (snake_case) for logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Single-assignment handle returned by `wait_for`.
///
/// Await it from async code, or call [`WaitHandle::wait`] from a plain thread.
/// It resolves exactly once.
pub struct WaitHandle<R> {
    task: Arc<dyn PendingWait>,
    rx: oneshot::Receiver<WaitResult<WaitOutcome<R>>>,
}

fn disconnected() -> WaitError {
    ExecutionError::Disconnected {
        path: "wait_handle".to_string(),
    }
    .into()
}

impl<R> WaitHandle<R> {
    pub(crate) fn new(task: Arc<dyn PendingWait>, rx: oneshot::Receiver<WaitResult<WaitOutcome<R>>>) -> Self {
        Self { task, rx }
    }

    /// Identifier of the underlying wait.
    #[must_use]
    pub fn id(&self) -> WaitId {
        self.task.id()
    }

    /// Event kind this handle waits on.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.task.kind()
    }

    /// Cancel the wait. Treated exactly like an early timeout: the task is
    /// removed and the handle resolves with [`WaitOutcome::Cancelled`].
    ///
    /// Returns false if the wait had already matched, expired or been cancelled.
    pub fn cancel(&self) -> bool {
        self.task.cancel()
    }

    /// Block the current thread until the wait resolves.
    ///
    /// Must not be called from within an async runtime; `.await` the handle there.
    pub fn wait(self) -> WaitResult<WaitOutcome<R>> {
        self.rx.blocking_recv().map_err(|_| disconnected())?
    }

    /// Non-blocking check. Returns `None` while the wait is unresolved.
    ///
    /// The outcome is handed out once; later calls report a disconnect.
    pub fn try_outcome(&mut self) -> Option<WaitResult<WaitOutcome<R>>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(disconnected())),
        }
    }
}

impl<R> Future for WaitHandle<R> {
    type Output = WaitResult<WaitOutcome<R>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|res| match res {
            Ok(outcome) => outcome,
            Err(_) => Err(disconnected()),
        })
    }
}

impl<R> fmt::Debug for WaitHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle")
            .field("id", &self.task.id())
            .field("kind", &self.task.kind())
            .finish_non_exhaustive()
    }
}
