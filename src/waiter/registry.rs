//! Waiter registry: active wait tasks bucketed by event kind.
//!
//! Dispatch works on a snapshot of one bucket taken under the read lock, so
//! callbacks run with no registry lock held and waits registered during a
//! dispatch pass are not considered by that pass. Double matching is prevented
//! by each task's own claim, not by removal order. A task unregisters itself
//! when it completes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::kind::{EventKind, WaitId};

use super::task::PendingWait;

type Bucket = Vec<Arc<dyn PendingWait>>;

#[derive(Default)]
pub(crate) struct WaiterRegistry {
    buckets: RwLock<HashMap<EventKind, Bucket>>,
}

impl WaiterRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EventKind, Bucket>> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EventKind, Bucket>> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, task: Arc<dyn PendingWait>) {
        let kind = task.kind();
        self.write().entry(kind).or_default().push(task);
    }

    /// Offer `event` to every task registered under `kind`.
    ///
    /// Returns the number of tasks this call matched.
    pub(crate) fn dispatch(&self, kind: EventKind, event: &dyn Any) -> usize {
        let snapshot: Bucket = match self.read().get(&kind) {
            Some(bucket) => bucket.clone(),
            None => return 0,
        };

        let matched = snapshot.iter().filter(|task| task.try_match(event)).count();
        trace!(%kind, candidates = snapshot.len(), matched, "dispatched event");
        matched
    }

    /// Remove a task. Idempotent.
    pub(crate) fn remove(&self, kind: EventKind, id: WaitId) -> bool {
        let mut buckets = self.write();
        let Some(bucket) = buckets.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|t| t.id() == id) else {
            return false;
        };
        bucket.swap_remove(pos);
        if bucket.is_empty() {
            buckets.remove(&kind);
        }
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub(crate) fn len_for(&self, kind: EventKind) -> usize {
        self.read().get(&kind).map_or(0, Vec::len)
    }

    pub(crate) fn contains(&self, kind: EventKind, id: WaitId) -> bool {
        self.read()
            .get(&kind)
            .is_some_and(|bucket| bucket.iter().any(|t| t.id() == id))
    }

    /// Number of kinds with at least one registered task.
    pub(crate) fn kinds(&self) -> usize {
        self.read().len()
    }
}
