//! WAITER subsystem: predicate-based waits resolved by dispatched events.
//!
//! ```text
//! caller ──wait_for──► WaitScheduler ──register──► WaiterRegistry
//!                            │                          ▲
//!                            └──Timer──► WorkerPool      │ dispatch(kind, event)
//!                                          │             │
//!                                        expire     match / cancel
//!                                          └──────┬──────┘
//!                                     first settler completes
//!                                                 ▼
//!                                          WaitHandle<R>
//! ```

/// Public coordinator.
mod coordinator;
/// Result handles and outcomes.
mod handle;
/// Running / draining / stopped state machine.
mod lifecycle;
/// Expiry worker threads and their deadline heaps.
mod pool;
/// Per-kind task sets and matching.
mod registry;
/// `wait_for`: register and arm.
mod scheduler;
/// Per-wait state machine.
mod task;

pub use coordinator::EventWaiter;
pub use handle::{WaitHandle, WaitOutcome};
pub use lifecycle::WaiterState;
