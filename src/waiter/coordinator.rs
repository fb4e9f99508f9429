//! Public coordinator: owns the registry, the expiry pool and the lifecycle.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::EventWaiterConfig;
use crate::error::WaitResult;
use crate::kind::EventKind;

use super::handle::WaitHandle;
use super::lifecycle::WaiterState;
use super::scheduler::WaitScheduler;
use super::task::in_callback_of;

/// Waits for events matching a condition, with a timeout.
///
/// The event source calls [`EventWaiter::dispatch`] for every event it sees.
/// Callers register waits with [`EventWaiter::wait_for`] and await the
/// returned handle. Each wait resolves exactly once, with the transformed
/// event or with [`crate::WaitOutcome::TimedOut`].
///
/// Dropping the waiter stops it without waiting for in-flight waits; they
/// still resolve on their own deadlines.
pub struct EventWaiter {
    cfg: EventWaiterConfig,
    scheduler: WaitScheduler,
}

impl EventWaiter {
    /// Start a waiter and its expiry workers.
    pub fn new(cfg: EventWaiterConfig) -> WaitResult<Self> {
        let scheduler = WaitScheduler::start(&cfg)?;
        info!(identifier = %cfg.identifier, workers = scheduler.pool().size(), "event waiter started");
        Ok(Self { cfg, scheduler })
    }

    /// Start a waiter with default sizing and the given thread-name identifier.
    pub fn named(identifier: impl Into<String>) -> WaitResult<Self> {
        Self::new(EventWaiterConfig::named(identifier))
    }

    /// Configuration this waiter was started with.
    #[must_use]
    pub fn config(&self) -> &EventWaiterConfig {
        &self.cfg
    }

    /// Wait for the next event of type `E` for which `condition` holds.
    ///
    /// On match, `on_match` runs once on the dispatching thread and its output
    /// resolves the handle. If nothing matches within `timeout` the handle
    /// resolves with [`crate::WaitOutcome::TimedOut`].
    ///
    /// # Errors
    /// - [`crate::ValidationError::NonPositiveTimeout`] for a zero timeout.
    /// - [`crate::ExecutionError::ShuttingDown`] once shutdown has begun.
    ///
    /// Nothing is registered when an error is returned.
    pub fn wait_for<E, R, C, T>(&self, condition: C, on_match: T, timeout: Duration) -> WaitResult<WaitHandle<R>>
    where
        E: Any,
        R: Send + 'static,
        C: Fn(&E) -> bool + Send + Sync + 'static,
        T: FnOnce(&E) -> R + Send + 'static,
    {
        self.scheduler.wait_for(condition, on_match, timeout)
    }

    /// Like [`EventWaiter::wait_for`], resolving with a clone of the event.
    pub fn wait_for_event<E, C>(&self, condition: C, timeout: Duration) -> WaitResult<WaitHandle<E>>
    where
        E: Any + Clone + Send,
        C: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.scheduler.wait_for::<E, E, C, _>(condition, E::clone, timeout)
    }

    /// Offer an event to every wait registered for its type.
    ///
    /// Returns how many waits it matched. Cheap when nothing waits on `E`.
    pub fn dispatch<E: Any>(&self, event: &E) -> usize {
        self.scheduler.registry().dispatch(EventKind::of::<E>(), event)
    }

    /// Offer a type-erased event. The kind is the value's runtime type.
    pub fn dispatch_any(&self, event: &dyn Any) -> usize {
        self.scheduler.registry().dispatch(EventKind::of_val(event), event)
    }

    /// Number of registered, unresolved waits.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.scheduler.registry().len()
    }

    /// Number of registered, unresolved waits for events of type `E`.
    #[must_use]
    pub fn pending_for<E: Any>(&self) -> usize {
        self.scheduler.registry().len_for(EventKind::of::<E>())
    }

    /// True when no waits are registered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.scheduler.registry().is_empty()
    }

    /// Whether the wait behind `handle` is still registered.
    #[must_use]
    pub fn is_registered<R>(&self, handle: &WaitHandle<R>) -> bool {
        self.scheduler.registry().contains(handle.kind(), handle.id())
    }

    /// Number of event kinds that currently have waiters.
    #[must_use]
    pub fn tracked_kinds(&self) -> usize {
        self.scheduler.registry().kinds()
    }

    /// Admitted waits that have not completed yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.scheduler.lifecycle().in_flight()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WaiterState {
        self.scheduler.lifecycle().state()
    }

    /// Stop accepting waits and wait up to `timeout` for in-flight ones to
    /// resolve. Returns true if all of them did.
    ///
    /// Safe to call more than once; later calls wait on the same drain. Called
    /// from inside a condition or transform of one of this waiter's waits it
    /// only begins draining and returns false, since blocking there would wait
    /// on itself.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let lifecycle = self.scheduler.lifecycle();
        if lifecycle.begin_drain() {
            info!(identifier = %self.cfg.identifier, in_flight = lifecycle.in_flight(), "event waiter draining");
        }

        if in_callback_of(lifecycle.owner()) {
            warn!(identifier = %self.cfg.identifier, "shutdown called from a wait callback; not blocking on drain");
            return false;
        }

        if !lifecycle.await_drain(timeout) {
            // Workers keep expiring the remaining waits on schedule.
            warn!(
                identifier = %self.cfg.identifier,
                in_flight = lifecycle.in_flight(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "event waiter drain timed out"
            );
            return false;
        }

        let pool = self.scheduler.pool();
        pool.close();
        pool.join();
        info!(identifier = %self.cfg.identifier, "event waiter stopped");
        true
    }
}

impl Drop for EventWaiter {
    fn drop(&mut self) {
        if self.state() != WaiterState::Stopped {
            self.shutdown(Duration::ZERO);
        }
    }
}

impl fmt::Debug for EventWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWaiter")
            .field("identifier", &self.cfg.identifier)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
