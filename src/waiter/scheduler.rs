//! Wait task scheduler.
//!
//! `wait_for` registers a task and arms a [`Timer`] for it in the expiry
//! pool. The deadline is fixed at registration. Whoever settles the task
//! first (a match, its timer, or `cancel`) completes it.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::debug;

use crate::config::EventWaiterConfig;
use crate::error::{ExecutionError, ValidationError, WaitResult};
use crate::kind::EventKind;

use super::handle::WaitHandle;
use super::lifecycle::Lifecycle;
use super::pool::{Job, Timer, WorkerPool};
use super::registry::WaiterRegistry;
use super::task::{Expiry, PendingWait, Tracking, WaitTask};

/// Cap for deadlines that would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

pub(crate) struct WaitScheduler {
    registry: Arc<WaiterRegistry>,
    lifecycle: Arc<Lifecycle>,
    pool: WorkerPool,
}

impl WaitScheduler {
    pub(crate) fn start(cfg: &EventWaiterConfig) -> WaitResult<Self> {
        Ok(Self {
            registry: Arc::new(WaiterRegistry::new()),
            lifecycle: Arc::new(Lifecycle::new()),
            pool: WorkerPool::start(cfg)?,
        })
    }

    pub(crate) fn registry(&self) -> &WaiterRegistry {
        &self.registry
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn wait_for<E, R, C, T>(&self, condition: C, on_match: T, timeout: Duration) -> WaitResult<WaitHandle<R>>
    where
        E: Any,
        R: Send + 'static,
        C: Fn(&E) -> bool + Send + Sync + 'static,
        T: FnOnce(&E) -> R + Send + 'static,
    {
        if timeout.is_zero() {
            return Err(ValidationError::NonPositiveTimeout.into());
        }
        self.lifecycle.admit()?;

        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);

        let (tx, rx) = oneshot::channel();
        let task: Arc<dyn PendingWait> = Arc::new(WaitTask::<E, R>::new(
            Box::new(condition),
            Box::new(on_match),
            tx,
            deadline,
            Tracking::new(&self.registry, &self.lifecycle),
        ));
        self.registry.register(Arc::clone(&task));

        if self.pool.submit(Job::Arm(Timer::new(&task))).is_err() {
            // Unregisters the task and frees its in-flight slot.
            task.expire(Expiry::Abandoned);
            return Err(ExecutionError::ShuttingDown.into());
        }

        debug!(
            wait_id = %task.id(),
            kind = %EventKind::of::<E>(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "registered wait"
        );
        Ok(WaitHandle::new(task, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waiter::handle::WaitOutcome;

    struct Tick(u32);

    fn scheduler(workers: usize) -> WaitScheduler {
        WaitScheduler::start(&EventWaiterConfig {
            workers,
            ..EventWaiterConfig::named("sched-test")
        })
        .unwrap()
    }

    #[test]
    fn zero_timeout_is_rejected_before_registration() {
        let s = scheduler(1);
        let err = s
            .wait_for(|_: &Tick| true, |t: &Tick| t.0, Duration::ZERO)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(s.registry().len(), 0);
        assert_eq!(s.lifecycle().in_flight(), 0);
    }

    #[test]
    fn closed_pool_rejects_and_leaves_nothing_behind() {
        let s = scheduler(1);
        s.pool().close();
        let err = s
            .wait_for(|_: &Tick| true, |t: &Tick| t.0, Duration::from_secs(1))
            .unwrap_err();
        assert!(err.is_shutdown());
        assert_eq!(s.registry().len(), 0);
        assert_eq!(s.lifecycle().in_flight(), 0);
    }

    #[test]
    fn short_wait_expires_on_time_behind_a_long_one() {
        // One worker owns both deadlines.
        let s = scheduler(1);
        let long = s
            .wait_for(|_: &Tick| false, |t: &Tick| t.0, Duration::from_secs(2))
            .unwrap();
        let start = Instant::now();
        let short = s
            .wait_for(|_: &Tick| false, |t: &Tick| t.0, Duration::from_millis(100))
            .unwrap();

        assert!(short.wait().unwrap().is_timed_out());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(300), "resolved late: {elapsed:?}");
        assert_eq!(s.registry().len(), 1);

        assert!(long.cancel());
        assert_eq!(s.registry().len(), 0);
        assert_eq!(s.lifecycle().in_flight(), 0);
    }

    #[test]
    fn many_waits_on_one_worker_expire_together() {
        let s = scheduler(1);
        let start = Instant::now();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                s.wait_for(|_: &Tick| false, |t: &Tick| t.0, Duration::from_millis(100))
                    .unwrap()
            })
            .collect();
        for h in handles {
            assert!(h.wait().unwrap().is_timed_out());
        }
        assert!(start.elapsed() < Duration::from_millis(300));
        assert_eq!(s.registry().len(), 0);
    }

    #[test]
    fn match_resolves_handle() {
        let s = scheduler(2);
        let h = s
            .wait_for(|t: &Tick| t.0 == 3, |t: &Tick| t.0 * 2, Duration::from_secs(5))
            .unwrap();
        assert_eq!(s.registry().dispatch(EventKind::of::<Tick>(), &Tick(1)), 0);
        assert_eq!(s.registry().dispatch(EventKind::of::<Tick>(), &Tick(3)), 1);
        assert_eq!(h.wait().unwrap(), WaitOutcome::Matched(6));
    }
}
